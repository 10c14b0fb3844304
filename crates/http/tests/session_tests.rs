//! End-to-end session flows against the simulated backend

use async_trait::async_trait;
use chrono::Duration as TokenTtl;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use warden_core::{
    AuthError, Credentials, DurableStorage, FileStorage, MemoryStorage, Result, SessionStatus,
};
use warden_http::{
    ApiRequest, RefreshPhase, SessionController, SimulatedConfig, SimulatedGateway,
};

/// Memory storage whose removals suspend, like a file rename does
#[derive(Default)]
struct SlowRemoveStorage {
    inner: MemoryStorage,
}

const REMOVE_DELAY: Duration = Duration::from_millis(100);

#[async_trait]
impl DurableStorage for SlowRemoveStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        tokio::time::sleep(REMOVE_DELAY).await;
        self.inner.remove_item(key).await
    }
}

async fn start_slow_remove(
    gateway: Arc<SimulatedGateway>,
) -> (Arc<SessionController>, Arc<SlowRemoveStorage>) {
    let storage = Arc::new(SlowRemoveStorage::default());
    let controller = SessionController::start(gateway, storage.clone())
        .await
        .unwrap();
    (Arc::new(controller), storage)
}

async fn start(gateway: Arc<SimulatedGateway>) -> (SessionController, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let controller = SessionController::start(gateway, storage.clone())
        .await
        .unwrap();
    (controller, storage)
}

#[tokio::test]
async fn test_roles_follow_account() {
    let (controller, _storage) = start(Arc::new(SimulatedGateway::instant())).await;

    let user = controller
        .login(&Credentials::new("user@example.com", "password123"))
        .await
        .unwrap();
    assert!(!user.is_admin());

    let admin = controller
        .login(&Credentials::new("admin@example.com", "admin123"))
        .await
        .unwrap();
    assert!(admin.is_admin());
    assert_eq!(controller.fetch_profile().await.unwrap().name, "Jane Smith");
}

#[tokio::test]
async fn test_wrong_password_stores_nothing() {
    let (controller, storage) = start(Arc::new(SimulatedGateway::instant())).await;

    let err = controller
        .login(&Credentials::new("user@example.com", "hunter2"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials(_)));
    assert!(controller.context().tokens().is_empty());
    assert!(storage.load_refresh_token().await.unwrap().is_none());
    assert!(!controller.has_persisted_session().await);
}

#[tokio::test]
async fn test_logout_then_call_is_unauthenticated() {
    let gateway = Arc::new(SimulatedGateway::instant());
    let (controller, storage) = start(gateway.clone()).await;
    controller
        .login(&Credentials::new("user@example.com", "password123"))
        .await
        .unwrap();

    controller.logout().await;
    assert_eq!(gateway.logout_count(), 1);
    assert!(storage.load_refresh_token().await.unwrap().is_none());

    // No access token to send and no refresh token to recover with
    let err = controller.fetch_profile().await.unwrap_err();
    assert!(err.is_refresh_rejected());
    assert_eq!(gateway.refresh_count(), 0);
    assert_eq!(controller.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_expired_access_token_is_renewed_transparently() {
    let gateway = Arc::new(SimulatedGateway::instant());
    let (controller, _storage) = start(gateway.clone()).await;
    controller
        .login(&Credentials::new("user@example.com", "password123"))
        .await
        .unwrap();

    let expired = gateway.issue_access_token(1, TokenTtl::seconds(-1)).unwrap();
    controller.context().tokens().set(expired.clone());

    let user = controller.fetch_profile().await.unwrap();
    assert_eq!(user.id, 1);
    assert_eq!(gateway.refresh_count(), 1);
    assert_ne!(controller.context().tokens().get(), Some(expired));

    // Authenticated but unknown route: refresh does not help, no second refresh
    let err = controller
        .pipeline()
        .send(ApiRequest::get("/reports"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
    assert_eq!(gateway.refresh_count(), 1);
}

#[tokio::test]
async fn test_expired_refresh_token_forces_logout() {
    let gateway = Arc::new(SimulatedGateway::instant());
    let (controller, storage) = start(gateway.clone()).await;
    let stale = gateway.issue_refresh_token(1, TokenTtl::seconds(-1)).unwrap();
    storage.store_refresh_token(&stale).await.unwrap();
    controller
        .context()
        .tokens()
        .set(gateway.issue_access_token(1, TokenTtl::seconds(-1)).unwrap());

    let err = controller.fetch_profile().await.unwrap_err();

    assert!(matches!(err, AuthError::TokenExpired(_)));
    assert!(controller.context().tokens().is_empty());
    assert!(storage.load_refresh_token().await.unwrap().is_none());
    assert_eq!(controller.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_burst_of_expired_calls_refreshes_once() {
    let gateway = Arc::new(SimulatedGateway::new(SimulatedConfig {
        refresh_latency_ms: 50,
        ..SimulatedConfig::instant()
    }));
    let (controller, _storage) = start(gateway.clone()).await;
    controller
        .login(&Credentials::new("admin@example.com", "admin123"))
        .await
        .unwrap();
    controller
        .context()
        .tokens()
        .set(gateway.issue_access_token(2, TokenTtl::seconds(-1)).unwrap());

    let results = join_all((0..20).map(|_| controller.fetch_profile())).await;

    assert!(results.iter().all(|r| r.as_ref().is_ok_and(|u| u.role == "admin")));
    assert_eq!(gateway.refresh_count(), 1);
    assert_eq!(gateway.call_count(), 40);
    assert_eq!(controller.coordinator().phase(), RefreshPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_logout_during_refresh_rejects_waiters() {
    let gateway = Arc::new(SimulatedGateway::new(SimulatedConfig {
        refresh_latency_ms: 1_000,
        ..SimulatedConfig::instant()
    }));
    let (controller, _storage) = start(gateway.clone()).await;
    controller
        .login(&Credentials::new("user@example.com", "password123"))
        .await
        .unwrap();
    controller
        .context()
        .tokens()
        .set(gateway.issue_access_token(1, TokenTtl::seconds(-1)).unwrap());

    let controller = Arc::new(controller);
    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.fetch_profile().await })
    };
    while controller.coordinator().pending() == 0 {
        tokio::task::yield_now().await;
    }

    controller.logout().await;
    assert_eq!(
        pending.await.unwrap().unwrap_err(),
        AuthError::SessionTerminated
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(controller.context().tokens().is_empty());
    assert_eq!(controller.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_session_survives_restart_via_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(SimulatedGateway::instant());

    {
        let storage = Arc::new(FileStorage::in_dir(dir.path()));
        let controller = SessionController::start(gateway.clone(), storage)
            .await
            .unwrap();
        controller
            .login(&Credentials::new("user@example.com", "password123"))
            .await
            .unwrap();
    }

    let storage = Arc::new(FileStorage::in_dir(dir.path()));
    let controller = SessionController::start(gateway.clone(), storage)
        .await
        .unwrap();
    assert_eq!(controller.status(), SessionStatus::Authenticated);
    assert!(controller.context().tokens().is_empty());

    let user = controller.fetch_profile().await.unwrap();
    assert_eq!(user.email, "user@example.com");
    assert_eq!(gateway.refresh_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_call_during_logout_does_not_revive_session() {
    let gateway = Arc::new(SimulatedGateway::instant());
    let (controller, storage) = start_slow_remove(gateway.clone()).await;
    controller
        .login(&Credentials::new("user@example.com", "password123"))
        .await
        .unwrap();

    let logout = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.logout().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The refresh token is still on disk, but no refresh may use it
    assert!(storage.load_refresh_token().await.unwrap().is_some());
    let err = controller.fetch_profile().await.unwrap_err();
    assert_eq!(err, AuthError::SessionTerminated);

    logout.await.unwrap();
    assert_eq!(gateway.refresh_count(), 0);
    assert!(controller.context().tokens().is_empty());
    assert!(controller.current_user().is_none());
    assert!(storage.load_refresh_token().await.unwrap().is_none());
    assert_eq!(controller.status(), SessionStatus::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn test_call_during_failed_refresh_teardown_does_not_refresh_again() {
    let gateway = Arc::new(SimulatedGateway::instant());
    let (controller, storage) = start_slow_remove(gateway.clone()).await;
    let stale = gateway.issue_refresh_token(1, TokenTtl::seconds(-1)).unwrap();
    storage.store_refresh_token(&stale).await.unwrap();
    controller
        .context()
        .tokens()
        .set(gateway.issue_access_token(1, TokenTtl::seconds(-1)).unwrap());

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.fetch_profile().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = controller.fetch_profile().await;

    assert!(matches!(second, Err(AuthError::TokenExpired(_))));
    assert!(matches!(
        first.await.unwrap(),
        Err(AuthError::TokenExpired(_))
    ));
    assert_eq!(gateway.refresh_count(), 1);
    assert!(controller.context().tokens().is_empty());
    assert!(controller.current_user().is_none());
    assert!(storage.load_refresh_token().await.unwrap().is_none());
}
