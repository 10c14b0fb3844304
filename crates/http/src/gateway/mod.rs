//! Backend gateways: the transport behind login, refresh and API calls

#[cfg(feature = "remote")]
pub mod remote;
pub mod simulated;

use crate::types::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use warden_core::{Credentials, LoginResponse, RefreshResponse, Result};

#[cfg(feature = "remote")]
pub use remote::{RemoteGateway, RemoteGatewayBuilder};
pub use simulated::{SimulatedGateway, SimulatedUser};

/// Transport performing the backend operations a session needs.
///
/// Every failure comes back as a typed [`warden_core::AuthError`]; an
/// implementation never panics on a bad response.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Exchange credentials for both tokens. Fails `InvalidCredentials` on
    /// identity mismatch.
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse>;

    /// Obtain a new access token. Fails `TokenExpired`/`TokenInvalid` when the
    /// refresh token is malformed, unknown or past expiry.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse>;

    /// Perform an API call carrying `request.bearer` as its credential. Fails
    /// `Unauthorized` when that token is absent, malformed or expired.
    async fn call(&self, request: &ApiRequest) -> Result<ApiResponse>;

    /// Tell the backend the refresh token is no longer in use
    async fn logout(&self, refresh_token: &str) -> Result<()>;

    /// Short label for logs
    fn kind(&self) -> &'static str;
}
