//! Background expiry of stale verifications.

use crate::traits::IdentityStore;
use keyward_runtime::{current_timestamp, FirstRun, PeriodicTask};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Periodically deletes pending verifications that outlived their lifetime.
///
/// Runs once right away and then every `period`. Failures are logged and the
/// next run proceeds as usual.
pub struct VerificationExpiry {
    task: PeriodicTask,
}

impl VerificationExpiry {
    pub fn spawn(store: Arc<dyn IdentityStore>, period: Duration) -> Self {
        let task = PeriodicTask::spawn("verification-expiry", period, FirstRun::Immediately, move || {
            let store = Arc::clone(&store);
            async move {
                match store.expire_pending(current_timestamp()).await {
                    Ok(0) => debug!("No stale verifications"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Verification expiry failed"),
                }
            }
        });

        Self { task }
    }

    /// Stop the sweep and wait for an in-progress run to finish
    pub async fn stop(self) {
        self.task.stop().await;
    }
}
