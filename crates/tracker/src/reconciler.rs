//! Applies polled status to the registry.
//!
//! [`StateReconciler`] is the single writer of the [`JobRegistry`]. Every
//! write happens under the registry's write lock, so checks against the
//! current record (terminal, removed, lane cancelled, tracker sealed) and
//! the mutation they guard are atomic. Notifications for a mutation are
//! published before the lock is released, so no event for a job can follow
//! the removal of that job.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use flowcontent_core::error::SubmissionError;
use flowcontent_core::job::{JobRecord, Reconciliation, StatusReport};
use flowcontent_core::types::{JobId, Timestamp};
use flowcontent_events::CompletionNotifier;

use crate::registry::JobRegistry;

pub struct StateReconciler {
    registry: Arc<JobRegistry>,
    notifier: CompletionNotifier,
}

impl StateReconciler {
    pub fn new(registry: Arc<JobRegistry>, notifier: CompletionNotifier) -> Self {
        Self { registry, notifier }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn notifier(&self) -> &CompletionNotifier {
        &self.notifier
    }

    /// Seed the registry with a newly created job.
    ///
    /// Fails with [`SubmissionError::DuplicateJobId`] if the id has ever
    /// been tracked, and with [`SubmissionError::Stopped`] once sealed.
    pub async fn admit(&self, job: JobRecord) -> Result<JobRecord, SubmissionError> {
        let mut state = self.registry.write().await;
        if state.is_sealed() {
            return Err(SubmissionError::Stopped);
        }
        if state.has_seen(&job.id) {
            return Err(SubmissionError::DuplicateJobId(job.id));
        }
        state.put(job.clone());
        self.notifier.job_updated(&job);
        Ok(job)
    }

    /// Apply one polled report to a job.
    ///
    /// The report is discarded when the job is no longer tracked, already
    /// terminal, the polling `lane` was cancelled, or the tracker is sealed.
    /// A first terminal observation publishes the job's single
    /// success/failure notification.
    pub async fn apply(
        &self,
        id: &JobId,
        report: &StatusReport,
        lane: &CancellationToken,
    ) -> Reconciliation {
        let mut state = self.registry.write().await;
        if state.is_sealed() || lane.is_cancelled() {
            return Reconciliation::Discarded;
        }
        let Some(current) = state.get(id) else {
            tracing::debug!(job_id = %id, "Discarding status for untracked job");
            return Reconciliation::Discarded;
        };

        let outcome = current.reconcile(report, Utc::now());
        match &outcome {
            Reconciliation::Updated(next) => {
                state.put(next.clone());
                self.notifier.job_updated(next);
            }
            Reconciliation::Terminal(next) => {
                state.put(next.clone());
                self.notifier.job_updated(next);
                self.notifier.job_finished(next);
            }
            Reconciliation::Discarded => {
                tracing::debug!(job_id = %id, "Discarding status for terminal job");
            }
            Reconciliation::Unchanged => {}
        }
        outcome
    }

    /// Run `publish` only while `id` is still tracked and the tracker is
    /// running. Holds the registry read lock across the call so a
    /// concurrent removal cannot slip in between. Returns whether it ran.
    pub async fn publish_if_tracked(
        &self,
        id: &JobId,
        publish: impl FnOnce(&CompletionNotifier),
    ) -> bool {
        let state = self.registry.read().await;
        if state.is_sealed() || state.get(id).is_none() {
            return false;
        }
        publish(&self.notifier);
        true
    }

    /// Stop tracking a job. Returns the record that was removed.
    pub async fn remove(&self, id: &JobId) -> Option<JobRecord> {
        let mut state = self.registry.write().await;
        if state.is_sealed() {
            return None;
        }
        state.remove(id)
    }

    /// Drop terminal jobs that ended before `cutoff`. Returns how many.
    pub async fn purge_finished_before(&self, cutoff: Timestamp) -> usize {
        let mut state = self.registry.write().await;
        if state.is_sealed() {
            return 0;
        }
        state.remove_finished_before(cutoff).len()
    }

    /// Refuse every later write. Idempotent.
    pub async fn seal(&self) {
        self.registry.write().await.seal();
    }

    pub async fn is_sealed(&self) -> bool {
        self.registry.is_sealed().await
    }
}
