//! Session-scoped file upload
//!
//! One transfer at a time, bound to the session id via the query string,
//! with monotonic progress reporting on a watch channel and explicit abort.
//! Validation happens before any network traffic; nothing here retries on
//! failure, the user re-triggers.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::watch;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Largest file the backend accepts (10 GiB)
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// How long a successful task keeps showing 1.0 before resetting to Idle
const SUCCESS_RESET_DELAY: Duration = Duration::from_secs(1);

/// Lifecycle of the single upload slot
#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    Idle,
    InFlight,
    Succeeded { filename: String },
    Failed { message: String },
    Cancelled,
}

impl UploadState {
    /// Whether a new upload may start from this state. Idle, Succeeded and
    /// Failed accept; InFlight and a not-yet-dismissed Cancelled do not.
    pub fn accepts_new_upload(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Succeeded { .. } | Self::Failed { .. }
        )
    }
}

/// Snapshot published on the watch channel
#[derive(Debug, Clone, PartialEq)]
pub struct UploadStatus {
    pub state: UploadState,
    /// Monotonically non-decreasing within one task, 0.0..=1.0
    pub progress: f64,
}

impl UploadStatus {
    fn idle() -> Self {
        Self {
            state: UploadState::Idle,
            progress: 0.0,
        }
    }
}

/// Parsed success body; the backend promises at least a filename
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub filename: String,
}

pub struct UploadManager {
    http: reqwest::Client,
    config: Arc<Config>,
    status_tx: watch::Sender<UploadStatus>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl UploadManager {
    pub fn new(config: Arc<Config>) -> Result<(Self, watch::Receiver<UploadStatus>)> {
        let (status_tx, status_rx) = watch::channel(UploadStatus::idle());
        let http = reqwest::Client::builder().build()?;
        let manager = Self {
            http,
            config,
            status_tx,
            cancel: Mutex::new(None),
        };
        Ok((manager, status_rx))
    }

    pub fn status(&self) -> UploadStatus {
        self.status_tx.borrow().clone()
    }

    /// Abort the in-flight transfer, if any
    pub fn cancel(&self) {
        if let Some(token) = self.cancel.lock().as_ref() {
            token.cancel();
        }
    }

    /// Clear a finished or cancelled task so the slot frees up early
    pub fn dismiss(&self) {
        self.status_tx.send_if_modified(|status| {
            if status.state == UploadState::InFlight {
                return false;
            }
            *status = UploadStatus::idle();
            true
        });
    }

    /// Transfer one file into the session's sandbox. Validation failures
    /// reject synchronously, before any network call.
    pub async fn upload(&self, path: &Path, session_id: &str) -> Result<UploadReceipt> {
        validate_session(session_id)?;
        {
            let state = self.status_tx.borrow().state.clone();
            if !state.accepts_new_upload() {
                return Err(Error::UploadValidation(
                    "Another upload is already in progress.".to_string(),
                ));
            }
        }

        let metadata = std::fs::metadata(path).map_err(|_| {
            Error::UploadValidation(format!("No such file: {}", path.display()))
        })?;
        if !metadata.is_file() {
            return Err(Error::UploadValidation(format!(
                "Not a file: {}",
                path.display()
            )));
        }
        validate_size(metadata.len())?;

        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());
        self.publish(UploadState::InFlight, 0.0);
        debug!("uploading {} ({} bytes)", path.display(), metadata.len());

        let outcome = self.transfer(path, session_id, metadata.len(), &token).await;
        *self.cancel.lock() = None;

        match outcome {
            Ok(receipt) => {
                self.publish(
                    UploadState::Succeeded {
                        filename: receipt.filename.clone(),
                    },
                    1.0,
                );
                self.schedule_reset();
                Ok(receipt)
            }
            Err(Error::Cancelled) => {
                self.publish(UploadState::Cancelled, 0.0);
                Err(Error::Cancelled)
            }
            Err(e) => {
                warn!("upload failed: {}", e);
                // Failed resets the progress immediately; the slot stays
                // open for a manual retry.
                self.publish(
                    UploadState::Failed {
                        message: e.to_string(),
                    },
                    0.0,
                );
                Err(e)
            }
        }
    }

    async fn transfer(
        &self,
        path: &Path,
        session_id: &str,
        size: u64,
        token: &CancellationToken,
    ) -> Result<UploadReceipt> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::UploadTransport(format!("Could not open file: {}", e)))?;

        let sent = Arc::new(AtomicU64::new(0));
        let status_tx = self.status_tx.clone();
        let total = size.max(1);
        let counter = sent.clone();
        let body_stream = ReaderStream::new(file).inspect(move |chunk| {
            if let Ok(chunk) = chunk {
                let done = counter.fetch_add(chunk.len() as u64, Ordering::AcqRel)
                    + chunk.len() as u64;
                let fraction = (done as f64 / total as f64).min(1.0);
                status_tx.send_if_modified(|status| advance_progress(status, fraction));
            }
        });

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(body_stream),
            size,
        )
        .file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .http
            .post(self.config.upload_url())
            .query(&[("session_id", session_id)])
            .multipart(form)
            .send();

        let response = tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            response = request => response
                .map_err(|e| Error::UploadTransport(format!("Network error during upload: {}", e)))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UploadTransport(format!("Upload failed: {}", status)));
        }

        let body = tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            body = response.text() => body
                .map_err(|e| Error::UploadTransport(format!("Network error during upload: {}", e)))?,
        };

        serde_json::from_str(&body)
            .map_err(|_| Error::UploadTransport("Invalid response from server.".to_string()))
    }

    fn publish(&self, state: UploadState, progress: f64) {
        // send() only errs when every receiver is gone, which is fine
        let _ = self.status_tx.send(UploadStatus { state, progress });
    }

    /// Pin 1.0 briefly, then free the slot for the next upload
    fn schedule_reset(&self) {
        let status_tx = self.status_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SUCCESS_RESET_DELAY).await;
            status_tx.send_if_modified(|status| {
                if matches!(status.state, UploadState::Succeeded { .. }) {
                    *status = UploadStatus::idle();
                    true
                } else {
                    false
                }
            });
        });
    }
}

fn validate_session(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(Error::UploadValidation(
            "No session found. Start a session before uploading.".to_string(),
        ));
    }
    Ok(())
}

fn validate_size(size: u64) -> Result<()> {
    if size > MAX_UPLOAD_BYTES {
        return Err(Error::UploadValidation("File too large.".to_string()));
    }
    Ok(())
}

/// Progress never moves backwards within one task
fn advance_progress(status: &mut UploadStatus, fraction: f64) -> bool {
    if status.state != UploadState::InFlight || fraction <= status.progress {
        return false;
    }
    status.progress = fraction.min(1.0);
    true
}
