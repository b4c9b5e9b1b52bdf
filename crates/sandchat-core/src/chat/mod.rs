//! Streaming conversation: data model, wire frames, merge reducer, client

mod client;
mod frames;
mod reducer;
mod types;

pub use client::{ChatClient, ChatEvent, SharedTranscript, is_rate_limit_message};
pub use frames::{DataStreamParser, StreamFrame};
pub use reducer::Transcript;
pub use types::{Attachment, ChatMessage, FinishReason, InvocationState, Role, ToolInvocation};
