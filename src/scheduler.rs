use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::flush::FlushExecutor;

/// Background task that flushes the buffer on a fixed interval.
///
/// Ticks that come due while a flush is still running are skipped rather
/// than queued.
pub struct FlushScheduler {
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FlushScheduler {
    /// Spawn the timer task on the current tokio runtime.
    pub fn start(executor: Arc<FlushExecutor>, every: Duration) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        match executor.try_flush().await {
                            Some(Ok(report)) if report.submitted > 0 => {
                                debug!(index = ?report.index, documents = report.submitted, "scheduled flush");
                            }
                            Some(Err(e)) => error!(error = %e, "scheduled flush failed"),
                            Some(Ok(_)) => {}
                            None => debug!("flush already in progress, skipping tick"),
                        }
                    }
                }
            }
        });

        Self { token, handle: Mutex::new(Some(handle)) }
    }

    /// Stop the timer and wait for a tick in progress to finish.
    /// Calling it again is a no-op.
    pub async fn stop(&self) {
        self.token.cancel();
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!("flush scheduler panicked");
                }
            }
        }
    }

    /// Request a stop without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}
