//! Session identity and sandbox lifecycle
//!
//! The controller produces exactly one session identity per process and
//! tracks the state of the sandbox the backend keeps for it. Sandbox
//! initialization is a single fire-and-forget request: chat is never
//! blocked on it, and a failure stays Failed until the next run so a stuck
//! sandbox cannot trigger request amplification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

use super::store::SessionStore;

/// Lifecycle state of the per-session sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Unknown,
    Initializing,
    Ready,
    Failed,
}

impl SandboxState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// A session identity plus the sandbox state tracked for it
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub sandbox: SandboxState,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: String,
}

/// Transport seam for the sandbox-management endpoint
#[async_trait]
pub trait SandboxLifecycle: Send + Sync {
    /// Issue the one-shot initialization request; returns the backend's
    /// logical outcome string.
    async fn initialize(&self, session_id: &str) -> Result<String>;
}

/// Production transport over HTTP
pub struct HttpSandboxApi {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl HttpSandboxApi {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl SandboxLifecycle for HttpSandboxApi {
    async fn initialize(&self, session_id: &str) -> Result<String> {
        let url = self.config.initialize_url(session_id);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| Error::SessionInit(format!("initialize request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SessionInit(format!(
                "initialize returned {}",
                status
            )));
        }

        let body: InitializeResponse = response
            .json()
            .await
            .map_err(|e| Error::SessionInit(format!("unreadable initialize response: {}", e)))?;
        Ok(body.status)
    }
}

/// Owns session identity creation and the sandbox initialization lifecycle
pub struct SessionController {
    store: Arc<dyn SessionStore>,
    api: Arc<dyn SandboxLifecycle>,
    current: Mutex<Option<Session>>,
}

impl SessionController {
    pub fn new(store: Arc<dyn SessionStore>, api: Arc<dyn SandboxLifecycle>) -> Self {
        Self {
            store,
            api,
            current: Mutex::new(None),
        }
    }

    /// Return the stable session identity, creating and persisting one on
    /// first call. Idempotent: later calls return the identical id.
    pub fn ensure_session(&self) -> Result<Session> {
        let mut current = self.current.lock();
        if let Some(session) = current.as_ref() {
            return Ok(session.clone());
        }

        let id = match self.store.load() {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                self.store.save(&id)?;
                info!("created new session {}", id);
                id
            }
        };

        let session = Session {
            id,
            sandbox: SandboxState::Unknown,
        };
        *current = Some(session.clone());
        Ok(session)
    }

    /// One-shot sandbox initialization. "created" and "exists" are the only
    /// successful outcomes; any other status value or transport failure
    /// leaves the sandbox Failed. No retry.
    pub async fn initialize_sandbox(&self, session_id: &str) -> SandboxState {
        self.set_sandbox(SandboxState::Initializing);

        let next = match self.api.initialize(session_id).await {
            Ok(status) if status == "created" || status == "exists" => {
                info!("sandbox {} for session {}", status, session_id);
                SandboxState::Ready
            }
            Ok(status) => {
                warn!("sandbox initialize returned unexpected status {:?}", status);
                SandboxState::Failed
            }
            Err(e) => {
                warn!("sandbox initialize failed: {}", e);
                SandboxState::Failed
            }
        };

        self.set_sandbox(next);
        next
    }

    /// Current sandbox state as tracked for the active session
    pub fn sandbox_state(&self) -> SandboxState {
        self.current
            .lock()
            .as_ref()
            .map(|s| s.sandbox)
            .unwrap_or(SandboxState::Unknown)
    }

    fn set_sandbox(&self, state: SandboxState) {
        if let Some(session) = self.current.lock().as_mut() {
            session.sandbox = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::MemorySessionStore;

    struct FixedOutcome(std::result::Result<String, String>);

    #[async_trait]
    impl SandboxLifecycle for FixedOutcome {
        async fn initialize(&self, _session_id: &str) -> Result<String> {
            self.0.clone().map_err(Error::SessionInit)
        }
    }

    fn controller(outcome: std::result::Result<&str, &str>) -> SessionController {
        let outcome = outcome.map(String::from).map_err(String::from);
        SessionController::new(
            Arc::new(MemorySessionStore::default()),
            Arc::new(FixedOutcome(outcome)),
        )
    }

    #[test]
    fn test_ensure_session_is_idempotent() {
        let controller = controller(Ok("created"));
        let first = controller.ensure_session().unwrap();
        let second = controller.ensure_session().unwrap();
        assert!(!first.id.is_empty());
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_persisted_id_is_reused() {
        let store = Arc::new(MemorySessionStore::default());
        store.save("persisted-id").unwrap();
        let controller =
            SessionController::new(store, Arc::new(FixedOutcome(Ok("exists".to_string()))));
        assert_eq!(controller.ensure_session().unwrap().id, "persisted-id");
    }

    #[tokio::test]
    async fn test_created_and_exists_mean_ready() {
        for status in ["created", "exists"] {
            let controller = controller(Ok(status));
            let session = controller.ensure_session().unwrap();
            assert_eq!(
                controller.initialize_sandbox(&session.id).await,
                SandboxState::Ready
            );
            assert_eq!(controller.sandbox_state(), SandboxState::Ready);
        }
    }

    #[tokio::test]
    async fn test_unexpected_status_means_failed() {
        let controller = controller(Ok("error"));
        let session = controller.ensure_session().unwrap();
        assert_eq!(
            controller.initialize_sandbox(&session.id).await,
            SandboxState::Failed
        );
    }

    #[tokio::test]
    async fn test_transport_failure_means_failed() {
        let controller = controller(Err("connection refused"));
        let session = controller.ensure_session().unwrap();
        assert_eq!(
            controller.initialize_sandbox(&session.id).await,
            SandboxState::Failed
        );
        assert_eq!(controller.sandbox_state(), SandboxState::Failed);
    }
}
