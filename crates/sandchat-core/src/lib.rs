//! Sandchat Core - client for a remote code-interpreter sandbox
//!
//! This crate provides the coordination logic behind the Sandchat client:
//! - Durable session identity and sandbox initialization lifecycle
//! - Streaming chat over a line-framed wire protocol, merged into an
//!   append-only transcript
//! - Tool-invocation lifecycle tracking and rendering dispatch
//! - Classification of heterogeneous sandbox execution outputs
//! - Session-scoped file upload with progress and cancellation
//!
//! Three asynchronous channels (chat stream, sandbox initialization, file
//! upload) share exactly one piece of state: the session id, immutable once
//! established.

pub mod chat;
pub mod config;
pub mod error;
pub mod output;
pub mod session;
pub mod tools;
pub mod upload;

pub use chat::{
    Attachment, ChatClient, ChatEvent, ChatMessage, DataStreamParser, FinishReason,
    InvocationState, Role, SharedTranscript, StreamFrame, ToolInvocation, Transcript,
    is_rate_limit_message,
};
pub use config::{Config, ConfigManager};
pub use error::{Error, Result};
pub use output::{ExecutionOutput, MimeBundle, Representation, StreamName};
pub use session::{
    FileSessionStore, HttpSandboxApi, MemorySessionStore, SandboxLifecycle, SandboxState, Session,
    SessionController, SessionStore,
};
pub use tools::{InvocationOutcome, ToolDisplay, ToolKind, display, outcome};
pub use upload::{MAX_UPLOAD_BYTES, UploadManager, UploadReceipt, UploadState, UploadStatus};
