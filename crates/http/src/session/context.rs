//! Session context: the single owner of a session's credentials and status
//!
//! Created at application start, reset on logout or forced logout, and
//! shared by the coordinator, the pipeline and the controller.

use crate::token_store::TokenStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{info, warn};
use warden_core::{DurableStorage, LoginResponse, Result, SessionStatus, User};

pub struct SessionContext {
    tokens: TokenStore,
    storage: Arc<dyn DurableStorage>,
    profile: Mutex<Option<User>>,
    status: watch::Sender<SessionStatus>,
    // Bumped on every establish/reset; lets late async results detect that
    // the session they started in is gone.
    generation: AtomicU64,
}

impl SessionContext {
    /// Create a context; the initial status follows the persisted refresh token
    pub async fn open(storage: Arc<dyn DurableStorage>) -> Result<Self> {
        let persisted = storage.load_refresh_token().await?.is_some();
        let initial = if persisted {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        };
        Ok(Self::with_status(storage, initial))
    }

    fn with_status(storage: Arc<dyn DurableStorage>, status: SessionStatus) -> Self {
        let (status, _) = watch::channel(status);
        Self {
            tokens: TokenStore::new(),
            storage,
            profile: Mutex::new(None),
            status,
            generation: AtomicU64::new(0),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn storage(&self) -> &Arc<dyn DurableStorage> {
        &self.storage
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn profile(&self) -> Option<User> {
        self.profile
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_profile(&self, user: User) {
        *self.profile.lock().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    /// Install the tokens of a successful login.
    ///
    /// The refresh token is persisted first; if that fails nothing in memory
    /// changes.
    pub async fn establish(&self, login: LoginResponse) -> Result<User> {
        self.storage.store_refresh_token(&login.refresh_token).await?;

        self.tokens.set(login.access_token);
        self.set_profile(login.user.clone());
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.status.send_replace(SessionStatus::Authenticated);

        info!(user_id = login.user.id, role = %login.user.role, "Session established");
        Ok(login.user)
    }

    /// Drop every in-memory credential and flip the status. Synchronous so
    /// no suspension point separates the token clear from the status change.
    pub fn reset(&self) {
        self.tokens.clear();
        *self.profile.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.status.send_replace(SessionStatus::Unauthenticated);
    }

    /// Remove the persisted refresh token; failures are logged, not raised
    pub async fn clear_persisted(&self) {
        if let Err(e) = self.storage.clear_refresh_token().await {
            warn!(error = %e, "Failed to remove persisted refresh token");
        }
    }

    /// Reset memory and durable state
    pub async fn terminate(&self) {
        self.reset();
        self.clear_persisted().await;
        info!("Session terminated");
    }
}
