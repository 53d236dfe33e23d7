//! User-facing job notifications.
//!
//! [`CompletionNotifier`] turns reconciler outcomes into [`JobEvent`]s on
//! the shared [`EventBus`]. It holds no per-job state: the once-per-job
//! guarantee for terminal events comes from the reconciler only calling
//! [`CompletionNotifier::job_finished`] on a first terminal observation.

use std::sync::Arc;

use chrono::Utc;
use flowcontent_core::job::{JobRecord, JobStatus};
use flowcontent_core::types::JobId;

use crate::bus::{EventBus, JobEvent};

/// Publishes job lifecycle notifications on an [`EventBus`].
#[derive(Clone)]
pub struct CompletionNotifier {
    bus: Arc<EventBus>,
}

impl CompletionNotifier {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// The bus events are published on.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// A tracked record was mutated.
    pub fn job_updated(&self, job: &JobRecord) {
        tracing::debug!(
            job_id = %job.id,
            status = %job.status,
            progress = job.progress,
            "Job updated",
        );
        self.bus.publish(JobEvent::JobUpdated { job: job.clone() });
    }

    /// Deliver the single success or failure signal for a job.
    ///
    /// Ignores records that are not terminal.
    pub fn job_finished(&self, job: &JobRecord) {
        let event = match job.status {
            JobStatus::Completed => {
                tracing::info!(
                    job_id = %job.id,
                    kind = %job.kind,
                    related_entity_id = job.related_entity_id.as_deref(),
                    "Job succeeded",
                );
                JobEvent::JobSucceeded { job: job.clone() }
            }
            JobStatus::Error => {
                tracing::warn!(
                    job_id = %job.id,
                    kind = %job.kind,
                    error = job.last_error.as_deref().unwrap_or_default(),
                    "Job failed",
                );
                JobEvent::JobFailed { job: job.clone() }
            }
            status => {
                tracing::warn!(job_id = %job.id, %status, "Finish notification for non-terminal job ignored");
                return;
            }
        };
        self.bus.publish(event);
    }

    /// Polling for a job has failed `consecutive_failures` times in a row.
    pub fn job_degraded(&self, job_id: &JobId, consecutive_failures: u32) {
        tracing::warn!(job_id = %job_id, consecutive_failures, "Job polling degraded");
        self.bus.publish(JobEvent::JobDegraded {
            job_id: job_id.clone(),
            consecutive_failures,
            at: Utc::now(),
        });
    }

    /// Polling for a previously degraded job succeeded again.
    pub fn job_recovered(&self, job_id: &JobId) {
        tracing::info!(job_id = %job_id, "Job polling recovered");
        self.bus.publish(JobEvent::JobRecovered {
            job_id: job_id.clone(),
            at: Utc::now(),
        });
    }

    /// A job was removed from tracking before reaching a terminal state.
    pub fn job_cancelled(&self, job_id: &JobId) {
        tracing::info!(job_id = %job_id, "Job tracking cancelled");
        self.bus.publish(JobEvent::JobCancelled {
            job_id: job_id.clone(),
            at: Utc::now(),
        });
    }
}
