//! In-process backend used when no API base URL is configured
//!
//! Issues real three-segment tokens from a fixed user table and validates
//! them statelessly, so a refresh token written by one process is accepted
//! by the next.

use super::BackendGateway;
use crate::config::SimulatedConfig;
use crate::types::{ApiRequest, ApiResponse, Method};
use async_trait::async_trait;
use chrono::Duration as TokenTtl;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;
use warden_core::token::{self, TokenClaims};
use warden_core::{AuthError, Credentials, LoginResponse, RefreshResponse, Result, User};

const MSG_INVALID_CREDENTIALS: &str = "Invalid credentials";
const MSG_TOKEN_EXPIRED: &str = "Token expired";
const MSG_INVALID_TOKEN: &str = "Invalid token";

/// Account known to the simulated backend
#[derive(Debug, Clone)]
pub struct SimulatedUser {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
}

impl SimulatedUser {
    fn profile(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
        }
    }

    /// The two demo accounts
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                id: 1,
                email: "user@example.com".to_string(),
                password: "password123".to_string(),
                name: "John Doe".to_string(),
                role: "user".to_string(),
            },
            Self {
                id: 2,
                email: "admin@example.com".to_string(),
                password: "admin123".to_string(),
                name: "Jane Smith".to_string(),
                role: "admin".to_string(),
            },
        ]
    }
}

#[derive(Debug, Default)]
struct Counters {
    login: AtomicUsize,
    refresh: AtomicUsize,
    call: AtomicUsize,
    logout: AtomicUsize,
}

/// Simulated backend gateway
#[derive(Debug)]
pub struct SimulatedGateway {
    users: Vec<SimulatedUser>,
    config: SimulatedConfig,
    counters: Counters,
}

impl SimulatedGateway {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            users: SimulatedUser::defaults(),
            config,
            counters: Counters::default(),
        }
    }

    /// Zero latency, default TTLs
    pub fn instant() -> Self {
        Self::new(SimulatedConfig::instant())
    }

    /// Replace the user table
    pub fn with_users(mut self, users: Vec<SimulatedUser>) -> Self {
        self.users = users;
        self
    }

    pub fn config(&self) -> &SimulatedConfig {
        &self.config
    }

    pub fn login_count(&self) -> usize {
        self.counters.login.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.counters.refresh.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.counters.call.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> usize {
        self.counters.logout.load(Ordering::SeqCst)
    }

    /// Mint an access token for a known user, bypassing login
    pub fn issue_access_token(&self, user_id: u64, ttl: TokenTtl) -> Result<String> {
        let user = self
            .find_by_id(user_id)
            .ok_or_else(|| AuthError::NotFound(format!("user {user_id}")))?;
        token::encode(&TokenClaims::access(user.id, &user.email, &user.role, ttl))
    }

    /// Mint a refresh token for a known user, bypassing login
    pub fn issue_refresh_token(&self, user_id: u64, ttl: TokenTtl) -> Result<String> {
        let user = self
            .find_by_id(user_id)
            .ok_or_else(|| AuthError::NotFound(format!("user {user_id}")))?;
        token::encode(&TokenClaims::refresh(user.id, ttl))
    }

    fn find_by_id(&self, id: u64) -> Option<&SimulatedUser> {
        self.users.iter().find(|u| u.id == id)
    }

    fn access_ttl(&self) -> TokenTtl {
        TokenTtl::seconds(self.config.access_ttl_secs)
    }

    fn refresh_ttl(&self) -> TokenTtl {
        TokenTtl::seconds(self.config.refresh_ttl_secs)
    }

    /// Resolve the caller of an authenticated call
    fn authenticate(&self, bearer: Option<&str>) -> Result<&SimulatedUser> {
        let Some(bearer) = bearer else {
            return Err(AuthError::Unauthorized(MSG_TOKEN_EXPIRED.to_string()));
        };
        let claims = token::validate(bearer)
            .map_err(|_| AuthError::Unauthorized(MSG_TOKEN_EXPIRED.to_string()))?;
        if claims.is_refresh() {
            return Err(AuthError::Unauthorized(MSG_INVALID_TOKEN.to_string()));
        }
        self.find_by_id(claims.user_id)
            .ok_or_else(|| AuthError::Unauthorized(MSG_INVALID_TOKEN.to_string()))
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

async fn delay(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl BackendGateway for SimulatedGateway {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        self.counters.login.fetch_add(1, Ordering::SeqCst);
        delay(self.config.login_latency_ms).await;

        let user = self
            .users
            .iter()
            .find(|u| u.email == credentials.email && u.password == credentials.password)
            .ok_or_else(|| AuthError::InvalidCredentials(MSG_INVALID_CREDENTIALS.to_string()))?;

        let access_token = token::encode(&TokenClaims::access(
            user.id,
            &user.email,
            &user.role,
            self.access_ttl(),
        ))?;
        let refresh_token = token::encode(&TokenClaims::refresh(user.id, self.refresh_ttl()))?;

        debug!(user_id = user.id, "Simulated login succeeded");
        Ok(LoginResponse {
            access_token,
            refresh_token,
            user: user.profile(),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        self.counters.refresh.fetch_add(1, Ordering::SeqCst);
        delay(self.config.refresh_latency_ms).await;

        let claims = token::validate(refresh_token)
            .map_err(|_| AuthError::TokenExpired(MSG_TOKEN_EXPIRED.to_string()))?;
        if !claims.is_refresh() {
            return Err(AuthError::TokenInvalid(MSG_INVALID_TOKEN.to_string()));
        }
        let user = self
            .find_by_id(claims.user_id)
            .ok_or_else(|| AuthError::TokenInvalid(MSG_INVALID_TOKEN.to_string()))?;

        let access_token = token::encode(&TokenClaims::access(
            user.id,
            &user.email,
            &user.role,
            self.access_ttl(),
        ))?;

        debug!(user_id = user.id, "Simulated refresh issued a new access token");
        Ok(RefreshResponse { access_token })
    }

    async fn call(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.counters.call.fetch_add(1, Ordering::SeqCst);
        delay(self.config.call_latency_ms).await;

        let user = self.authenticate(request.bearer.as_deref())?;

        match (request.method, request.path.as_str()) {
            (Method::Get, "/me") => Ok(ApiResponse::ok(serde_json::to_value(user.profile())?)),
            (method, path) => Err(AuthError::NotFound(format!("{method} {path}"))),
        }
    }

    async fn logout(&self, _refresh_token: &str) -> Result<()> {
        self.counters.logout.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "simulated"
    }
}
