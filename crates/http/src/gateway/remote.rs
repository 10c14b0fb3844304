//! HTTP gateway for a real backend

use super::BackendGateway;
use crate::types::{ApiRequest, ApiResponse, Method};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode, header};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use warden_core::{
    AuthError, Credentials, ErrorBody, LoginResponse, RefreshRequest, RefreshResponse, Result,
};

/// Which operation a response belongs to; decides how a 401 is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Login,
    Refresh,
    Logout,
    Call,
}

/// Gateway talking to `POST /login`, `POST /refresh`, `POST /logout` and
/// arbitrary authenticated routes under one base URL
#[derive(Clone, Debug)]
pub struct RemoteGateway {
    client: Client,
    base_url: String,
}

impl RemoteGateway {
    /// Create a new gateway with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new gateway builder
    pub fn builder() -> RemoteGatewayBuilder {
        RemoteGatewayBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        self.client.request(method, url)
    }

    /// Send a request and map the status into a typed outcome
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: Endpoint,
    ) -> Result<ApiResponse> {
        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if status.is_success() {
            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            };
            Ok(ApiResponse {
                status: status.as_u16(),
                body,
            })
        } else {
            let err = error_for(endpoint, status, &text);
            debug!(?endpoint, status = status.as_u16(), error = %err, "Backend rejected request");
            Err(err)
        }
    }
}

/// Extract the server's `{message}`, falling back to the raw body or status text
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorBody { message }) = serde_json::from_str::<ErrorBody>(body) {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| status.to_string(), str::to_string)
    } else {
        trimmed.to_string()
    }
}

fn error_for(endpoint: Endpoint, status: StatusCode, body: &str) -> AuthError {
    let message = error_message(status, body);
    match (endpoint, status) {
        (Endpoint::Login, StatusCode::UNAUTHORIZED) => AuthError::InvalidCredentials(message),
        (Endpoint::Refresh, StatusCode::UNAUTHORIZED) => {
            if message.to_lowercase().contains("expired") {
                AuthError::TokenExpired(message)
            } else {
                AuthError::TokenInvalid(message)
            }
        }
        _ => AuthError::from_status(status.as_u16(), message),
    }
}

#[async_trait]
impl BackendGateway for RemoteGateway {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let request = self.request(Method::Post, "/login").json(credentials);
        self.execute(request, Endpoint::Login).await?.json()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let request = self
            .request(Method::Post, "/refresh")
            .json(&RefreshRequest {
                token: refresh_token.to_string(),
            });
        self.execute(request, Endpoint::Refresh).await?.json()
    }

    async fn call(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut builder = self.request(request.method, &request.path);
        if let Some(authorization) = request.authorization() {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        self.execute(builder, Endpoint::Call).await
    }

    async fn logout(&self, refresh_token: &str) -> Result<()> {
        let request = self
            .request(Method::Post, "/logout")
            .json(&RefreshRequest {
                token: refresh_token.to_string(),
            });
        self.execute(request, Endpoint::Logout).await.map(|_| ())
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}

/// Builder for RemoteGateway
#[derive(Default)]
pub struct RemoteGatewayBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl RemoteGatewayBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the gateway
    pub fn build(self) -> Result<RemoteGateway> {
        let base_url = self
            .base_url
            .ok_or_else(|| AuthError::Configuration("base_url is required".into()))?;

        url::Url::parse(&base_url)
            .map_err(|e| AuthError::Configuration(format!("invalid base_url {base_url:?}: {e}")))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| concat!("warden/", env!("CARGO_PKG_VERSION")).to_string()),
        );

        let client = client_builder
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(RemoteGateway { client, base_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let result = RemoteGateway::builder().build();
        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }

    #[test]
    fn test_builder_rejects_relative_url() {
        let result = RemoteGateway::new("/api");
        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let gateway = RemoteGateway::new("http://localhost:8080/api/").unwrap();
        assert_eq!(gateway.base_url(), "http://localhost:8080/api");
    }

    #[test]
    fn test_refresh_401_classification() {
        assert!(matches!(
            error_for(Endpoint::Refresh, StatusCode::UNAUTHORIZED, r#"{"message":"Token expired"}"#),
            AuthError::TokenExpired(_)
        ));
        assert!(matches!(
            error_for(Endpoint::Refresh, StatusCode::UNAUTHORIZED, r#"{"message":"Invalid token"}"#),
            AuthError::TokenInvalid(_)
        ));
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(
            error_message(StatusCode::UNAUTHORIZED, r#"{"message":"Invalid credentials"}"#),
            "Invalid credentials"
        );
        assert_eq!(error_message(StatusCode::NOT_FOUND, "no such route"), "no such route");
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }

    #[test]
    fn test_login_and_call_401_mapping() {
        assert!(matches!(
            error_for(Endpoint::Login, StatusCode::UNAUTHORIZED, ""),
            AuthError::InvalidCredentials(_)
        ));
        assert!(matches!(
            error_for(Endpoint::Call, StatusCode::UNAUTHORIZED, ""),
            AuthError::Unauthorized(_)
        ));
        assert!(matches!(
            error_for(Endpoint::Logout, StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            AuthError::Server { status: 500, .. }
        ));
    }
}
