//! Single-flight refresh coordinator
//!
//! State machine: `Idle -> Refreshing -> Idle`. The first caller that needs a
//! new access token flips the state to `Refreshing` and launches the one
//! refresh call; callers arriving while it is in flight queue a oneshot
//! sender and wait for its result. A failed refresh stays `Refreshing` until
//! the persisted refresh token is removed, and logout parks the coordinator
//! in `Terminating` while it clears durable state.
//!
//! The state lives behind a std mutex that is never held across an `.await`,
//! so the flip to `Refreshing` happens before the refresh call's first
//! suspension point.

use crate::gateway::BackendGateway;
use crate::session::SessionContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use warden_core::{AuthError, Result};

type Waiter = oneshot::Sender<Result<String>>;

enum RefreshState {
    Idle,
    Refreshing {
        episode: u64,
        generation: u64,
        waiters: Vec<Waiter>,
    },
    /// Logout is removing durable state; no episode may start
    Terminating,
}

impl RefreshState {
    /// Generation recorded by `episode`, if it is still the live one
    fn live_generation(&self, episode: u64) -> Option<u64> {
        match self {
            Self::Refreshing {
                episode: current,
                generation,
                ..
            } if *current == episode => Some(*generation),
            _ => None,
        }
    }
}

/// Observable phase of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
    Terminating,
}

/// Serializes refresh attempts for one session. Cloning yields a handle to
/// the same coordinator.
#[derive(Clone)]
pub struct RefreshCoordinator {
    gateway: Arc<dyn BackendGateway>,
    context: Arc<SessionContext>,
    state: Arc<Mutex<RefreshState>>,
    episodes: Arc<AtomicU64>,
}

impl RefreshCoordinator {
    pub fn new(gateway: Arc<dyn BackendGateway>, context: Arc<SessionContext>) -> Self {
        Self {
            gateway,
            context,
            state: Arc::new(Mutex::new(RefreshState::Idle)),
            episodes: Arc::new(AtomicU64::new(0)),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> RefreshPhase {
        match *self.lock_state() {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::Refreshing { .. } => RefreshPhase::Refreshing,
            RefreshState::Terminating => RefreshPhase::Terminating,
        }
    }

    /// Callers currently waiting on the in-flight refresh
    pub fn pending(&self) -> usize {
        match &*self.lock_state() {
            RefreshState::Refreshing { waiters, .. } => waiters.len(),
            RefreshState::Idle | RefreshState::Terminating => 0,
        }
    }

    /// Number of refresh episodes started so far
    pub fn episodes(&self) -> u64 {
        self.episodes.load(Ordering::SeqCst)
    }

    /// Obtain an access token that supersedes `rejected`, the token a failed
    /// call carried (`None` if it went out unauthenticated).
    ///
    /// Joins the in-flight refresh if there is one. If the token store
    /// already holds a different token, another caller finished a refresh
    /// after `rejected` was attached and that token is returned directly.
    /// Fails with `SessionTerminated` while a logout is in progress.
    pub async fn acquire_token(&self, rejected: Option<&str>) -> Result<String> {
        let receiver = {
            let mut state = self.lock_state();
            let (sender, receiver) = oneshot::channel();

            match &mut *state {
                RefreshState::Terminating => {
                    debug!("Logout in progress, not refreshing");
                    return Err(AuthError::SessionTerminated);
                }
                RefreshState::Refreshing { episode, waiters, .. } => {
                    waiters.push(sender);
                    debug!(episode = *episode, queued = waiters.len(), "Joined in-flight refresh");
                }
                RefreshState::Idle => {
                    if let Some(current) = self.context.tokens().get()
                        && rejected != Some(current.as_str())
                    {
                        debug!("Access token already replaced, skipping refresh");
                        return Ok(current);
                    }

                    let episode = self.episodes.fetch_add(1, Ordering::SeqCst) + 1;
                    *state = RefreshState::Refreshing {
                        episode,
                        generation: self.context.generation(),
                        waiters: vec![sender],
                    };
                    debug!(episode, "Starting refresh");

                    // Runs detached so a dropped caller cannot strand the queue.
                    let driver = self.clone();
                    tokio::spawn(async move { driver.drive(episode).await });
                }
            }
            receiver
        };

        receiver.await.unwrap_or(Err(AuthError::SessionTerminated))
    }

    /// Reject every queued caller with `SessionTerminated` and return to
    /// `Idle`. The in-flight refresh, if any, finds its episode gone and
    /// discards its result.
    pub fn cancel_pending(&self) -> usize {
        self.reject_all(RefreshState::Idle)
    }

    /// Like [`cancel_pending`](Self::cancel_pending), but refuse new
    /// episodes until [`end_teardown`](Self::end_teardown). Durable state
    /// is removed in between, so nothing can refresh with a token that is
    /// about to disappear.
    pub fn begin_teardown(&self) -> usize {
        self.reject_all(RefreshState::Terminating)
    }

    /// Accept refresh episodes again
    pub fn end_teardown(&self) {
        let mut state = self.lock_state();
        if matches!(*state, RefreshState::Terminating) {
            *state = RefreshState::Idle;
        }
    }

    fn reject_all(&self, next: RefreshState) -> usize {
        let waiters = match std::mem::replace(&mut *self.lock_state(), next) {
            RefreshState::Refreshing { waiters, .. } => waiters,
            RefreshState::Idle | RefreshState::Terminating => Vec::new(),
        };
        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(Err(AuthError::SessionTerminated));
        }
        if count > 0 {
            info!(count, "Cancelled callers waiting on refresh");
        }
        count
    }

    async fn drive(&self, episode: u64) {
        let outcome = match self.context.storage().load_refresh_token().await {
            Ok(Some(refresh_token)) => self
                .gateway
                .refresh(&refresh_token)
                .await
                .map(|response| response.access_token),
            Ok(None) => Err(AuthError::TokenInvalid(
                "No refresh token available".to_string(),
            )),
            Err(e) => Err(e),
        };

        let outcome = {
            let state = self.lock_state();
            let Some(generation) = state.live_generation(episode) else {
                debug!(episode, "Refresh episode was cancelled, discarding result");
                return;
            };

            // A login or logout happened meanwhile: this result belongs to a
            // session that no longer exists.
            let outcome = if generation == self.context.generation() {
                outcome
            } else {
                Err(AuthError::SessionTerminated)
            };

            match &outcome {
                Ok(token) => self.context.tokens().set(token.clone()),
                Err(AuthError::SessionTerminated) => {}
                Err(_) => self.context.reset(),
            }
            outcome
        };

        if let Err(e) = &outcome
            && *e != AuthError::SessionTerminated
        {
            warn!(episode, error = %e, "Refresh failed, forcing logout");
            // Still `Refreshing`: late callers queue behind this episode
            // instead of retrying the rejected refresh token.
            self.context.clear_persisted().await;
        }

        let waiters = {
            let mut state = self.lock_state();
            if state.live_generation(episode).is_none() {
                debug!(episode, "Refresh episode was cancelled during teardown");
                return;
            }
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters, .. } => waiters,
                RefreshState::Idle | RefreshState::Terminating => Vec::new(),
            }
        };

        match &outcome {
            Ok(_) => info!(episode, waiters = waiters.len(), "Access token refreshed"),
            Err(AuthError::SessionTerminated) => {
                debug!(episode, "Refresh outlived its session");
            }
            Err(_) => debug!(episode, waiters = waiters.len(), "Rejected callers after failed refresh"),
        }

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}
