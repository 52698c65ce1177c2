//! Graceful shutdown: stop accepting, drain in-flight commands, then exit.

use keyward_commands::ShutdownTrigger;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Coordinates shutdown of the serving loop and its command tasks.
///
/// Command tasks are spawned through [`DrainController::spawn`] so that
/// [`DrainController::drain`] can wait for them.
#[derive(Clone, Default)]
pub struct DrainController {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl DrainController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancelled once shutdown has been initiated
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_draining(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a task that shutdown waits for
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(task)
    }

    /// Initiate shutdown on Ctrl+C or SIGTERM
    pub fn listen_for_signals(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_signal() => this.initiate(),
                _ = this.token.cancelled() => {}
            }
        });
    }

    /// Wait up to `timeout` for tracked tasks to finish.
    ///
    /// Returns `false` when the timeout expired with tasks still running.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.tracker.len();
        info!(in_flight, timeout_secs = timeout.as_secs(), "Draining in-flight commands");

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("Drain complete");
                true
            }
            Err(_) => {
                warn!(remaining = self.tracker.len(), "Drain timed out, forcing shutdown");
                false
            }
        }
    }
}

impl ShutdownTrigger for DrainController {
    fn initiate(&self) {
        if !self.token.is_cancelled() {
            info!("Graceful shutdown initiated");
        }
        self.token.cancel();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
