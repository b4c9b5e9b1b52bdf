//! TUI (Terminal User Interface) module for the Sandchat CLI
//!
//! Message history renders above an always-visible input area; tool cells,
//! upload progress, and the sandbox indicator all update in place while
//! their background tasks run.

mod app;
pub mod events;
mod ui;

pub use app::{App, AppState, SUGGESTED_PROMPTS, TimedNotice};
pub use events::{Event, EventHandler, KeyAction, handle_key_normal, handle_key_streaming};
pub use ui::draw;
