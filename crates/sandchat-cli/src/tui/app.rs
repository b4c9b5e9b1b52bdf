//! Application state and types for the TUI

use std::time::{Duration, Instant};

use sandchat_core::chat::{ChatEvent, SharedTranscript};
use sandchat_core::session::SandboxState;
use sandchat_core::upload::{UploadState, UploadStatus};
use tui_input::Input;

/// Starter prompts shown while the transcript is empty
pub const SUGGESTED_PROMPTS: [(&str, &str); 2] = [
    ("What is the weather", "in San Francisco?"),
    ("Write and execute code", "Factorial of 5"),
];

/// How long the "file ready" banner stays up after a successful upload
const UPLOAD_BANNER_WINDOW: Duration = Duration::from_secs(7);

/// How long warnings stay up before auto-clearing
const WARNING_WINDOW: Duration = Duration::from_secs(8);

/// A notice that clears itself after its display window
#[derive(Debug, Clone)]
pub struct TimedNotice {
    pub text: String,
    expires_at: Instant,
}

impl TimedNotice {
    fn new(text: impl Into<String>, window: Duration) -> Self {
        Self {
            text: text.into(),
            expires_at: Instant::now() + window,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Normal mode - user can type and submit messages
    Normal,
    /// A turn is streaming; submission is disabled
    Streaming,
}

/// Main TUI application
pub struct App {
    /// Current application state
    pub state: AppState,
    /// Text input buffer
    pub input: Input,
    /// Shared conversation transcript (written by the chat client task)
    pub transcript: SharedTranscript,
    /// Sandbox state shown in the status bar
    pub sandbox: SandboxState,
    /// Short session tag for the status bar
    pub session_tag: String,
    /// Scroll offset for the message area
    pub scroll_offset: usize,
    /// Whether the app should quit
    pub should_quit: bool,
    /// Status message (shown in the footer)
    pub status: String,
    /// Auto-clearing warning (rate limits, failures)
    pub warning: Option<TimedNotice>,
    /// Latest upload slot snapshot
    pub upload: UploadStatus,
    /// "File ready" banner after a successful upload
    pub upload_banner: Option<TimedNotice>,
    /// Input history
    pub history: Vec<String>,
    /// Current position in history (None = not browsing)
    pub history_index: Option<usize>,
    /// Saved current input when browsing history
    pub history_draft: String,
}

impl App {
    pub fn new(transcript: SharedTranscript, session_id: &str, draft: String) -> Self {
        let session_tag = session_id
            .get(session_id.len().saturating_sub(8)..)
            .unwrap_or(session_id)
            .to_string();

        Self {
            state: AppState::Normal,
            input: Input::new(draft),
            transcript,
            sandbox: SandboxState::Unknown,
            session_tag,
            scroll_offset: usize::MAX,
            should_quit: false,
            status: String::new(),
            warning: None,
            upload: UploadStatus {
                state: UploadState::Idle,
                progress: 0.0,
            },
            upload_banner: None,
            history: Vec::new(),
            history_index: None,
            history_draft: String::new(),
        }
    }

    /// Scroll to the bottom of messages
    pub fn scroll_to_bottom(&mut self) {
        // Actual offset is resolved during render against the viewport
        self.scroll_offset = usize::MAX;
    }

    pub fn scroll_up(&mut self) {
        if self.scroll_offset > 0 {
            self.scroll_offset = self.scroll_offset.saturating_sub(1);
        }
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(1);
    }

    /// Push input to history
    pub fn push_history(&mut self, input: String) {
        if !input.is_empty() {
            self.history.push(input);
        }
        self.history_index = None;
        self.history_draft.clear();
    }

    /// Navigate to previous history entry
    pub fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let new_index = match self.history_index {
            None => {
                self.history_draft = self.input.value().to_string();
                self.history.len() - 1
            }
            Some(0) => return,
            Some(i) => i - 1,
        };
        self.history_index = Some(new_index);
        self.input = Input::new(self.history[new_index].clone());
    }

    /// Navigate to next history entry
    pub fn history_next(&mut self) {
        let Some(idx) = self.history_index else { return };
        if idx + 1 >= self.history.len() {
            self.history_index = None;
            self.input = Input::new(self.history_draft.clone());
        } else {
            self.history_index = Some(idx + 1);
            self.input = Input::new(self.history[idx + 1].clone());
        }
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.warning = Some(TimedNotice::new(text, WARNING_WINDOW));
    }

    /// Process a chat client event
    pub fn handle_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Updated => {
                self.scroll_to_bottom();
            }
            ChatEvent::TurnEnded => {
                self.state = AppState::Normal;
                self.status.clear();
            }
            ChatEvent::Cancelled => {
                self.state = AppState::Normal;
                self.status = "Turn cancelled".to_string();
            }
            ChatEvent::RateLimited => {
                self.state = AppState::Normal;
                self.status.clear();
                self.warn("You are sending too many messages. Please try again later.");
            }
            ChatEvent::Error(message) => {
                self.state = AppState::Normal;
                self.status.clear();
                self.warn(message);
            }
        }
    }

    /// Process an upload slot change
    pub fn handle_upload_status(&mut self, status: UploadStatus) {
        match &status.state {
            UploadState::Succeeded { filename } => {
                self.upload_banner = Some(TimedNotice::new(
                    format!("File ready for analysis: {}", filename),
                    UPLOAD_BANNER_WINDOW,
                ));
            }
            UploadState::Failed { message } => self.warn(message.clone()),
            UploadState::Cancelled => self.warn("Upload cancelled"),
            UploadState::Idle | UploadState::InFlight => {}
        }
        self.upload = status;
    }

    /// Expire timed notices; called on every tick
    pub fn tick(&mut self) {
        if self.warning.as_ref().is_some_and(TimedNotice::expired) {
            self.warning = None;
        }
        if self.upload_banner.as_ref().is_some_and(TimedNotice::expired) {
            self.upload_banner = None;
        }
    }

    pub fn dismiss_notices(&mut self) {
        self.warning = None;
        self.upload_banner = None;
    }
}
