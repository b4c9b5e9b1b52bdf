//! Session identity, persistence, and sandbox lifecycle

mod controller;
mod store;

pub use controller::{
    HttpSandboxApi, SandboxLifecycle, SandboxState, Session, SessionController,
};
pub use store::{FileSessionStore, MemorySessionStore, SESSION_STORAGE_KEY, SessionStore};
