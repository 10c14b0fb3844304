//! Warden core types and utilities

pub mod error;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(any(test, feature = "tests"))]
pub mod tests;

pub use error::{AuthError, LOGIN_FALLBACK_MESSAGE, Result};
pub use storage::{DurableStorage, FileStorage, MemoryStorage, REFRESH_TOKEN_KEY};
pub use token::{TokenClaims, TokenKind};
pub use types::{
    Credentials, ErrorBody, LoginResponse, RefreshRequest, RefreshResponse, SessionStatus, User,
};
