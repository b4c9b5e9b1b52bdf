//! Session lifecycle integration tests
//!
//! Covers identity persistence across controller instances and the sandbox
//! initialization state machine against a scripted transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sandchat_core::error::{Error, Result};
use sandchat_core::session::{
    FileSessionStore, MemorySessionStore, SandboxLifecycle, SandboxState, SessionController,
    SessionStore,
};
use tempfile::tempdir;

/// Transport that records how often it was called
struct CountingApi {
    calls: AtomicUsize,
    outcome: std::result::Result<String, String>,
}

impl CountingApi {
    fn new(outcome: std::result::Result<&str, &str>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome: outcome.map(String::from).map_err(String::from),
        })
    }
}

#[async_trait]
impl SandboxLifecycle for CountingApi {
    async fn initialize(&self, _session_id: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(Error::SessionInit)
    }
}

#[test]
fn test_identity_survives_controller_restart() {
    let dir = tempdir().unwrap();
    let api = CountingApi::new(Ok("created"));

    let first_id = {
        let store = Arc::new(FileSessionStore::with_dir(dir.path().to_path_buf()));
        let controller = SessionController::new(store, api.clone());
        controller.ensure_session().unwrap().id
    };

    // A fresh controller over the same store restores the identity
    let store = Arc::new(FileSessionStore::with_dir(dir.path().to_path_buf()));
    let controller = SessionController::new(store, api);
    assert_eq!(controller.ensure_session().unwrap().id, first_id);
}

#[test]
fn test_generated_ids_are_unique_per_store() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();
    let api = CountingApi::new(Ok("created"));

    let id_a = SessionController::new(
        Arc::new(FileSessionStore::with_dir(dir_a.path().to_path_buf())),
        api.clone(),
    )
    .ensure_session()
    .unwrap()
    .id;
    let id_b = SessionController::new(
        Arc::new(FileSessionStore::with_dir(dir_b.path().to_path_buf())),
        api,
    )
    .ensure_session()
    .unwrap()
    .id;

    assert_ne!(id_a, id_b);
}

#[tokio::test]
async fn test_initialize_is_issued_once_per_request() {
    let api = CountingApi::new(Ok("exists"));
    let controller = SessionController::new(Arc::new(MemorySessionStore::default()), api.clone());
    let session = controller.ensure_session().unwrap();

    let state = controller.initialize_sandbox(&session.id).await;
    assert_eq!(state, SandboxState::Ready);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_sandbox_does_not_clear_the_identity() {
    let api = CountingApi::new(Err("connection refused"));
    let store = Arc::new(MemorySessionStore::default());
    let controller = SessionController::new(store.clone(), api);
    let session = controller.ensure_session().unwrap();

    let state = controller.initialize_sandbox(&session.id).await;
    assert_eq!(state, SandboxState::Failed);

    // The stored identity and the controller's session are untouched
    assert_eq!(store.load().as_deref(), Some(session.id.as_str()));
    assert_eq!(controller.ensure_session().unwrap().id, session.id);
}

#[tokio::test]
async fn test_unexpected_status_string_fails() {
    let api = CountingApi::new(Ok("starting"));
    let controller = SessionController::new(Arc::new(MemorySessionStore::default()), api);
    let session = controller.ensure_session().unwrap();

    assert_eq!(
        controller.initialize_sandbox(&session.id).await,
        SandboxState::Failed
    );
    assert_eq!(controller.sandbox_state(), SandboxState::Failed);
}
