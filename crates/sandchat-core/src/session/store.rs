//! Persisted session identity
//!
//! The session id is the one piece of state shared by every channel the
//! client opens (chat, sandbox initialization, upload). It lives in a
//! single file under the platform data directory and survives restarts.
//! The store is injected into the controller so nothing reaches for
//! global mutable state.

use std::path::PathBuf;

use parking_lot::Mutex;

use crate::config::ConfigManager;
use crate::error::Result;

/// Well-known storage key (and file name) for the session identifier
pub const SESSION_STORAGE_KEY: &str = "session_id";

/// Durable store for the session identifier
pub trait SessionStore: Send + Sync {
    /// Read the persisted id, if any
    fn load(&self) -> Option<String>;
    /// Persist the id
    fn save(&self, id: &str) -> Result<()>;
}

/// File-backed store, one id string under the fixed key
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new() -> Self {
        Self {
            dir: ConfigManager::default_data_dir(),
        }
    }

    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join(SESSION_STORAGE_KEY)
    }
}

impl Default for FileSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<String> {
        let id = std::fs::read_to_string(self.key_path()).ok()?;
        let id = id.trim().to_string();
        if id.is_empty() { None } else { Some(id) }
    }

    fn save(&self, id: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.key_path(), id)?;
        Ok(())
    }
}

/// In-memory store for tests
#[derive(Default)]
pub struct MemorySessionStore {
    id: Mutex<Option<String>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<String> {
        self.id.lock().clone()
    }

    fn save(&self, id: &str) -> Result<()> {
        *self.id.lock() = Some(id.to_string());
        Ok(())
    }
}
