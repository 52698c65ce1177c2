//! Cancellable periodic background tasks.
//!
//! A [`PeriodicTask`] owns a spawned Tokio task that runs a job on a fixed
//! interval until it is stopped. Stopping cancels the loop and waits for the
//! task to finish, so callers observe a quiesced task once `stop` returns.
//! A job that is mid-run when cancellation arrives is allowed to complete.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// When the first run of a periodic job happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRun {
    /// Run once right away, then every period.
    Immediately,
    /// Wait one full period before the first run.
    AfterPeriod,
}

/// Handle to a running periodic job.
///
/// Dropping the handle cancels the job without waiting for it; use
/// [`PeriodicTask::stop`] to wait until the task has exited.
pub struct PeriodicTask {
    name: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `job` on the current Tokio runtime, running it every `period`.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero (same contract as [`tokio::time::interval`]).
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, first_run: FirstRun, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // The first tick of a Tokio interval completes immediately.
            if first_run == FirstRun::AfterPeriod {
                ticker.tick().await;
            }

            debug!(task = name, period_ms = period.as_millis() as u64, "Periodic task started");

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => job().await,
                }
            }

            debug!(task = name, "Periodic task stopped");
        });

        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    /// Name the task was spawned with.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether cancellation has been requested.
    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the task and wait for it to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(task = self.name, error = %e, "Periodic task ended abnormally");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
