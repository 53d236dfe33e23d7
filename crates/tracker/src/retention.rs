//! Periodic purge of long-finished jobs.
//!
//! Spawned by [`JobTracker::start`](crate::JobTracker::start) only when a
//! retention window is configured. Terminal jobs whose `ended_at` is older
//! than the window are removed from the registry; non-terminal jobs are
//! never touched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::reconciler::StateReconciler;

/// Run the retention loop until `cancel` is triggered.
pub async fn run(
    reconciler: Arc<StateReconciler>,
    retain_for: Duration,
    sweep_interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retain_for_secs = retain_for.as_secs(),
        interval_secs = sweep_interval.as_secs(),
        "Job retention sweeper started"
    );

    let mut interval = tokio::time::interval(sweep_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                let purged = sweep(&reconciler, retain_for).await;
                if purged > 0 {
                    tracing::info!(purged, "Job retention: purged finished jobs");
                } else {
                    tracing::debug!("Job retention: nothing to purge");
                }
            }
        }
    }
}

/// One sweep. Returns how many jobs were removed.
pub async fn sweep(reconciler: &StateReconciler, retain_for: Duration) -> usize {
    let window = chrono::Duration::from_std(retain_for).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(window)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    reconciler.purge_finished_before(cutoff).await
}
