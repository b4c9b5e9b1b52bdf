//! Event handling for the TUI

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use sandchat_core::chat::ChatEvent;
use sandchat_core::upload::UploadStatus;

/// Events that can occur in the TUI
#[derive(Debug)]
pub enum Event {
    /// Terminal event (key press, resize, etc.)
    Terminal(CrosstermEvent),
    /// Chat client notification
    Chat(ChatEvent),
    /// Upload slot changed
    Upload(UploadStatus),
    /// App-level notice from a background task
    Notice(String),
    /// Tick for UI refresh
    Tick,
}

/// Fans terminal events, chat events, and upload status into one stream
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    pub fn new(
        mut chat_rx: mpsc::Receiver<ChatEvent>,
        mut upload_rx: watch::Receiver<UploadStatus>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // Terminal event polling thread
        let tx_terminal = tx.clone();
        std::thread::spawn(move || {
            loop {
                if event::poll(Duration::from_millis(50)).unwrap_or(false)
                    && let Ok(evt) = event::read()
                    && tx_terminal.send(Event::Terminal(evt)).is_err()
                {
                    break;
                }
                if tx_terminal.send(Event::Tick).is_err() {
                    break;
                }
            }
        });

        // Chat event forwarding task
        let tx_chat = tx.clone();
        tokio::spawn(async move {
            while let Some(event) = chat_rx.recv().await {
                if tx_chat.send(Event::Chat(event)).is_err() {
                    break;
                }
            }
        });

        // Upload status forwarding task
        let tx_upload = tx.clone();
        tokio::spawn(async move {
            while upload_rx.changed().await.is_ok() {
                let status = upload_rx.borrow_and_update().clone();
                if tx_upload.send(Event::Upload(status)).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    /// Sender for background tasks that need to surface a notice
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Get the next event
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

/// Result of handling a key event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// No action needed
    None,
    /// Submit the current input
    Submit(String),
    /// Quit the application
    Quit,
    /// Cancel the active stream/upload, or dismiss notices
    Cancel,
    /// Scroll up
    ScrollUp,
    /// Scroll down
    ScrollDown,
    /// History previous
    HistoryPrev,
    /// History next
    HistoryNext,
}

/// Handle a key event in normal mode
pub fn handle_key_normal(key: KeyEvent, input: &mut tui_input::Input) -> KeyAction {
    match key.code {
        KeyCode::Enter => {
            let value = input.value().to_string();
            if !value.trim().is_empty() {
                input.reset();
                KeyAction::Submit(value)
            } else {
                KeyAction::None
            }
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Esc => KeyAction::Cancel,
        KeyCode::Up if key.modifiers.contains(KeyModifiers::SHIFT) => KeyAction::ScrollUp,
        KeyCode::Down if key.modifiers.contains(KeyModifiers::SHIFT) => KeyAction::ScrollDown,
        KeyCode::Up => KeyAction::HistoryPrev,
        KeyCode::Down => KeyAction::HistoryNext,
        KeyCode::PageUp => KeyAction::ScrollUp,
        KeyCode::PageDown => KeyAction::ScrollDown,
        KeyCode::Char(c) => {
            input.handle(tui_input::InputRequest::InsertChar(c));
            KeyAction::None
        }
        KeyCode::Backspace => {
            input.handle(tui_input::InputRequest::DeletePrevChar);
            KeyAction::None
        }
        KeyCode::Delete => {
            input.handle(tui_input::InputRequest::DeleteNextChar);
            KeyAction::None
        }
        KeyCode::Left => {
            input.handle(tui_input::InputRequest::GoToPrevChar);
            KeyAction::None
        }
        KeyCode::Right => {
            input.handle(tui_input::InputRequest::GoToNextChar);
            KeyAction::None
        }
        KeyCode::Home => {
            input.handle(tui_input::InputRequest::GoToStart);
            KeyAction::None
        }
        KeyCode::End => {
            input.handle(tui_input::InputRequest::GoToEnd);
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

/// Handle a key event while a turn is streaming: typing buffers input, but
/// Enter is ignored so only one request is ever in flight.
pub fn handle_key_streaming(key: KeyEvent, input: &mut tui_input::Input) -> KeyAction {
    match key.code {
        KeyCode::Enter => KeyAction::None,
        _ => handle_key_normal(key, input),
    }
}
