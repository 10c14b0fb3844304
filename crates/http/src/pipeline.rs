//! Request pipeline: fixed-order stages around every authenticated call
//!
//! 1. `attach_token`: bearer credential from the token store, if any
//! 2. `dispatch`: hand the request to the gateway
//! 3. `handle_unauthorized`: on the first `Unauthorized`, mark the request
//!    retried, obtain a token from the refresh coordinator and dispatch once
//!    more. Everything else passes through untouched.

use crate::gateway::BackendGateway;
use crate::refresh::RefreshCoordinator;
use crate::session::SessionContext;
use crate::types::{ApiRequest, ApiResponse};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument};
use warden_core::Result;

#[derive(Clone)]
pub struct RequestPipeline {
    gateway: Arc<dyn BackendGateway>,
    context: Arc<SessionContext>,
    coordinator: RefreshCoordinator,
}

impl RequestPipeline {
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        context: Arc<SessionContext>,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            gateway,
            context,
            coordinator,
        }
    }

    /// Run a request through every stage
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut request = self.attach_token(request);
        let outcome = self.dispatch(&request).await;
        self.handle_unauthorized(&mut request, outcome).await
    }

    /// `GET path`, deserializing the body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    fn attach_token(&self, mut request: ApiRequest) -> ApiRequest {
        request.bearer = self.context.tokens().get();
        if request.bearer.is_none() {
            debug!("No access token, sending unauthenticated");
        }
        request
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.gateway.call(request).await
    }

    async fn handle_unauthorized(
        &self,
        request: &mut ApiRequest,
        outcome: Result<ApiResponse>,
    ) -> Result<ApiResponse> {
        match outcome {
            Err(err) if err.is_unauthorized() && !request.retried => {
                request.retried = true;
                debug!(error = %err, "Access token rejected, waiting for refresh");

                // A refresh failure has already torn the session down.
                let token = self
                    .coordinator
                    .acquire_token(request.bearer.as_deref())
                    .await?;

                request.bearer = Some(token);
                self.dispatch(request).await
            }
            other => other,
        }
    }
}
