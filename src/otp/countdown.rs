//! Resend countdown.
//!
//! A single cancellable tokio task decrements the visible counter once per
//! second and publishes it over a `watch` channel. Starting a new countdown
//! aborts the previous task; a generation counter keeps a task that is being
//! aborted from publishing over its successor.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Duration, Instant},
};
use tracing::trace;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct Countdown {
    tx: watch::Sender<u64>,
    generation: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            tx,
            generation: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    /// Seconds left on the display; `0` means resend is enabled.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .ok()
            .and_then(|task| task.as_ref().map(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    /// Start counting down from `seconds`, replacing any running countdown.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, seconds: u64) {
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.abort_task();
        self.tx.send_replace(seconds);

        if seconds == 0 {
            return;
        }

        let tx = self.tx.clone();
        let generation = Arc::clone(&self.generation);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            for remaining in (0..seconds).rev() {
                ticker.tick().await;
                let current = tx.send_if_modified(|value| {
                    if generation.load(Ordering::SeqCst) == mine {
                        *value = remaining;
                        true
                    } else {
                        false
                    }
                });
                if !current {
                    return;
                }
                trace!(remaining, "resend countdown tick");
            }
        });

        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
    }

    /// Stop the countdown and re-enable resend immediately.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_task();
        self.tx.send_replace(0);
    }

    fn abort_task(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.abort_task();
    }
}
