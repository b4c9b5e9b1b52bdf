//! Streaming chat client
//!
//! Issues chat requests tagged with the session identity, consumes the
//! streamed response frame by frame, and folds it into the shared
//! transcript. One turn at a time; the frontend gates submission by
//! disabling input while `is_busy()`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

use super::frames::{DataStreamParser, StreamFrame};
use super::reducer::Transcript;
use super::types::FinishReason;

/// Notifications pushed to the frontend while a turn runs
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// The transcript changed; re-read it
    Updated,
    /// The turn finished normally
    TurnEnded,
    /// The turn was cancelled by the user
    Cancelled,
    /// The backend asked the client to slow down
    RateLimited,
    /// The turn failed
    Error(String),
}

/// Transcript handle shared between the client task and the frontend
pub type SharedTranscript = Arc<Mutex<Transcript>>;

/// The backend's throttling reply is recognized by its message text.
pub fn is_rate_limit_message(message: &str) -> bool {
    message.contains("Too many requests")
}

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: Arc<Config>,
    session_id: String,
    transcript: SharedTranscript,
    events: mpsc::Sender<ChatEvent>,
    busy: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl ChatClient {
    /// A non-empty session id is required before any request is issued.
    pub fn new(
        config: Arc<Config>,
        session_id: impl Into<String>,
        events: mpsc::Sender<ChatEvent>,
    ) -> Result<Self> {
        let session_id = session_id.into();
        if session_id.is_empty() {
            return Err(Error::SessionInit(
                "refusing to open a chat without a session id".to_string(),
            ));
        }

        // No overall timeout here: a streamed turn legitimately outlives any
        // fixed deadline.
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            config,
            session_id,
            transcript: Arc::new(Mutex::new(Transcript::new())),
            events,
            busy: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn transcript(&self) -> SharedTranscript {
        self.transcript.clone()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether a turn is currently streaming. The frontend disables its
    /// submit action while this is true.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Start a turn: append the user message and spawn the streaming task.
    pub fn submit(&self, user_text: impl Into<String>) {
        self.busy.store(true, Ordering::Release);
        self.cancelled.store(false, Ordering::Release);

        self.transcript.lock().push_user(user_text);
        let _ = self.events.try_send(ChatEvent::Updated);

        let client = self.clone();
        tokio::spawn(async move {
            let outcome = client.run_turn().await;
            client.busy.store(false, Ordering::Release);

            let event = match outcome {
                Ok(()) => ChatEvent::TurnEnded,
                Err(Error::Cancelled) => {
                    client.transcript.lock().sanitize();
                    ChatEvent::Cancelled
                }
                Err(Error::RateLimited) => {
                    client.transcript.lock().sanitize();
                    ChatEvent::RateLimited
                }
                Err(e) => {
                    client.transcript.lock().sanitize();
                    warn!("chat turn failed: {}", e);
                    ChatEvent::Error(e.to_string())
                }
            };
            let _ = client.events.send(event).await;
        });
    }

    /// Abort the in-flight stream. Content already merged stays; incomplete
    /// tool invocations are discarded before `Cancelled` is emitted.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// One user turn: stream a step, and keep going while the backend stops
    /// for tool calls, up to the configured step cap.
    async fn run_turn(&self) -> Result<()> {
        let max_steps = self.config.max_turn_steps.max(1);
        for step in 0..max_steps {
            let finish = self.stream_step().await?;
            if FinishReason::parse(&finish) == FinishReason::ToolCalls && step + 1 < max_steps {
                debug!(step, "step ended in tool calls, continuing turn");
                continue;
            }
            break;
        }
        Ok(())
    }

    async fn stream_step(&self) -> Result<String> {
        let body = self.request_body();
        let response = self
            .http
            .post(self.config.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Stream(format!("chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || is_rate_limit_message(&text) {
                return Err(Error::RateLimited);
            }
            return Err(Error::Stream(format!(
                "chat request returned {}: {}",
                status,
                text.lines().next().unwrap_or("")
            )));
        }

        let mut bytes = response.bytes_stream();
        let mut parser = DataStreamParser::default();
        let mut finish = "stop".to_string();

        while let Some(chunk) = bytes.next().await {
            if self.cancelled.load(Ordering::Acquire) {
                return Err(Error::Cancelled);
            }
            let chunk = chunk.map_err(|e| Error::Stream(format!("stream interrupted: {}", e)))?;

            for frame in parser.feed(&chunk) {
                match frame {
                    StreamFrame::Error(message) => {
                        if is_rate_limit_message(&message) {
                            return Err(Error::RateLimited);
                        }
                        return Err(Error::Stream(message));
                    }
                    StreamFrame::StepEnd { finish_reason }
                    | StreamFrame::TurnEnd { finish_reason } => {
                        finish = finish_reason;
                    }
                    frame => {
                        self.transcript.lock().apply(frame);
                        let _ = self.events.try_send(ChatEvent::Updated);
                    }
                }
            }
        }

        if self.cancelled.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }

        Ok(finish)
    }

    /// Full prior history plus the session identity, every request.
    fn request_body(&self) -> Value {
        let transcript = self.transcript.lock();
        let messages: Vec<Value> = transcript.messages().iter().map(|m| m.to_wire()).collect();
        json!({
            "session_id": self.session_id,
            "messages": messages,
        })
    }
}
