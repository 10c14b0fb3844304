//! Session controller: login, logout and the authenticated entry points

use super::SessionContext;
use crate::gateway::BackendGateway;
use crate::pipeline::RequestPipeline;
use crate::refresh::RefreshCoordinator;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use warden_core::{AuthError, Credentials, DurableStorage, Result, SessionStatus, User};

/// Path of the current-user profile route
pub const PROFILE_PATH: &str = "/me";

/// Owns one session and everything wired to it
pub struct SessionController {
    gateway: Arc<dyn BackendGateway>,
    context: Arc<SessionContext>,
    coordinator: RefreshCoordinator,
    pipeline: RequestPipeline,
}

impl SessionController {
    /// Open a session over `storage`, talking to `gateway`
    pub async fn start(
        gateway: Arc<dyn BackendGateway>,
        storage: Arc<dyn DurableStorage>,
    ) -> Result<Self> {
        let context = Arc::new(SessionContext::open(storage).await?);
        let coordinator = RefreshCoordinator::new(gateway.clone(), context.clone());
        let pipeline = RequestPipeline::new(gateway.clone(), context.clone(), coordinator.clone());

        info!(backend = gateway.kind(), status = ?context.status(), "Session controller started");
        Ok(Self {
            gateway,
            context,
            coordinator,
            pipeline,
        })
    }

    /// Exchange credentials for tokens.
    ///
    /// On failure the error is returned as-is and stored tokens are untouched.
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<User> {
        let response = match self.gateway.login(credentials).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Login failed");
                return Err(e);
            }
        };
        self.context.establish(response).await
    }

    /// Clear the session unconditionally.
    ///
    /// Queued callers are rejected with `SessionTerminated`; a failing
    /// server-side logout is logged and otherwise ignored.
    pub async fn logout(&self) {
        let refresh_token = match self.context.storage().load_refresh_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read refresh token during logout");
                None
            }
        };

        // No episode may start until the persisted refresh token is gone.
        self.coordinator.begin_teardown();
        self.context.terminate().await;
        self.coordinator.end_teardown();

        if let Some(token) = refresh_token
            && let Err(e) = self.gateway.logout(&token).await
        {
            warn!(error = %e, "Server-side logout failed; local session already cleared");
        }
    }

    /// Cached profile from the last login or profile fetch
    pub fn current_user(&self) -> Option<User> {
        self.context.profile()
    }

    /// `GET /me` through the pipeline, refreshing the cached profile.
    ///
    /// Fails with `SessionTerminated` if the session was logged out or
    /// replaced while the call was in flight; the cache is left alone.
    pub async fn fetch_profile(&self) -> Result<User> {
        let generation = self.context.generation();
        let user: User = self.pipeline.get_json(PROFILE_PATH).await?;
        if self.context.generation() != generation {
            debug!("Session changed during profile fetch, discarding result");
            return Err(AuthError::SessionTerminated);
        }
        self.context.set_profile(user.clone());
        Ok(user)
    }

    /// Route guard: a persisted refresh token is required (but not enough)
    /// to show protected views
    pub async fn has_persisted_session(&self) -> bool {
        match self.context.storage().load_refresh_token().await {
            Ok(token) => token.is_some(),
            Err(e) => {
                warn!(error = %e, "Could not read refresh token");
                false
            }
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.context.status()
    }

    /// Status changes, including forced logout after a failed refresh
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.context.subscribe()
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn gateway(&self) -> &Arc<dyn BackendGateway> {
        &self.gateway
    }
}
