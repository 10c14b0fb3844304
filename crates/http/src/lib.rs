//! Warden client session layer
//!
//! Holds the short-lived access token in memory, keeps the refresh token in
//! durable storage and wires every outgoing call through a pipeline that
//! recovers from an expired access token with a single shared refresh.

pub mod config;
pub mod gateway;
pub mod pipeline;
pub mod refresh;
pub mod session;
pub mod token_store;
pub mod types;

pub use config::{BackendMode, ClientConfig, SimulatedConfig};
pub use gateway::{BackendGateway, SimulatedGateway, SimulatedUser};
#[cfg(feature = "remote")]
pub use gateway::{RemoteGateway, RemoteGatewayBuilder};
pub use pipeline::RequestPipeline;
pub use refresh::{RefreshCoordinator, RefreshPhase};
pub use session::{PROFILE_PATH, SessionContext, SessionController};
pub use token_store::TokenStore;
pub use types::{ApiRequest, ApiResponse, Method};

// Re-export commonly used types
pub use warden_core::{AuthError, Credentials, DurableStorage, Result, SessionStatus, User};
