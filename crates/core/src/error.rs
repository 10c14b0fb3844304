//! Error taxonomy shared by every session component

use thiserror::Error;

/// Result alias for session operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Fallback shown when a failed login carries no usable message
pub const LOGIN_FALLBACK_MESSAGE: &str = "An error occurred during login. Please try again.";

/// Typed failure of a gateway, storage or session operation.
///
/// The error is `Clone` because one refresh failure is delivered to every
/// caller queued behind it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Login rejected: unknown identity or wrong password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Refresh token is past its expiry (or missing)
    #[error("Refresh token expired: {0}")]
    TokenExpired(String),

    /// Refresh token is malformed or unknown to the backend
    #[error("Refresh token invalid: {0}")]
    TokenInvalid(String),

    /// Access token absent, malformed or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transport failure before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// Session was logged out while the operation was pending
    #[error("Session terminated")]
    SessionTerminated,

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Any other non-success status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Durable storage could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Map a non-success HTTP status on an authenticated call
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::Server { status, message },
        }
    }

    /// Whether the access token was rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Whether the refresh token was rejected
    pub fn is_refresh_rejected(&self) -> bool {
        matches!(self, Self::TokenExpired(_) | Self::TokenInvalid(_))
    }

    /// Message carried by the failure, usually the server's `{message}`
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::InvalidCredentials(m)
            | Self::TokenExpired(m)
            | Self::TokenInvalid(m)
            | Self::Unauthorized(m)
            | Self::Network(m)
            | Self::NotFound(m)
            | Self::BadRequest(m)
            | Self::Forbidden(m)
            | Self::Serialization(m)
            | Self::Storage(m)
            | Self::Configuration(m) => Some(m),
            Self::Server { message, .. } => Some(message),
            Self::SessionTerminated => None,
        }
    }

    /// Text to show a user after a failed login
    pub fn user_message(&self) -> String {
        match self.message() {
            Some(message) if !message.trim().is_empty() => message.to_string(),
            _ => LOGIN_FALLBACK_MESSAGE.to_string(),
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
