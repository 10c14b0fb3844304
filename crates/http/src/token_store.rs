//! Memory-only holder of the current access token

use std::sync::{Arc, Mutex, PoisonError};
use warden_core::TokenClaims;
use warden_core::token;

/// Current access token. Cloning yields a handle to the same slot.
#[derive(Clone, Debug, Default)]
pub struct TokenStore {
    current: Arc<Mutex<Option<String>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current token
    pub fn set(&self, token: impl Into<String>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Current token, or `None` when absent
    pub fn get(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_empty(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Decoded payload of the held token; `None` when absent or opaque
    pub fn claims(&self) -> Option<TokenClaims> {
        self.get().and_then(|t| token::decode(&t).ok())
    }
}
