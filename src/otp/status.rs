//! Transient status line shown to the user.
//!
//! Errors stay until something replaces them; everything else is cleared
//! after five seconds unless a newer message was shown in the meantime.

use super::error::OtpError;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep, Duration},
};

pub const AUTO_CLEAR: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
}

impl From<&OtpError> for StatusMessage {
    fn from(err: &OtpError) -> Self {
        let kind = if err.is_warning() {
            StatusKind::Warning
        } else {
            StatusKind::Error
        };
        Self {
            text: err.to_string(),
            kind,
        }
    }
}

#[derive(Debug)]
pub struct StatusBoard {
    tx: watch::Sender<Option<StatusMessage>>,
    generation: Arc<AtomicU64>,
    clear_task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx,
            generation: Arc::new(AtomicU64::new(0)),
            clear_task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<StatusMessage>> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> Option<StatusMessage> {
        self.tx.borrow().clone()
    }

    /// Replace the current message. Must be called from within a tokio runtime.
    pub fn show(&self, text: impl Into<String>, kind: StatusKind) {
        self.publish(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    pub fn show_error(&self, err: &OtpError) {
        self.publish(StatusMessage::from(err));
    }

    fn publish(&self, message: StatusMessage) {
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let persistent = message.kind == StatusKind::Error;

        if let Ok(mut task) = self.clear_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }

            self.tx.send_replace(Some(message));

            if !persistent {
                let tx = self.tx.clone();
                let generation = Arc::clone(&self.generation);
                *task = Some(tokio::spawn(async move {
                    sleep(AUTO_CLEAR).await;
                    tx.send_if_modified(|value| {
                        if generation.load(Ordering::SeqCst) == mine {
                            *value = None;
                            true
                        } else {
                            false
                        }
                    });
                }));
            }
        }
    }
}

impl Drop for StatusBoard {
    fn drop(&mut self) {
        if let Ok(mut task) = self.clear_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}
