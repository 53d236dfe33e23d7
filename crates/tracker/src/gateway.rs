//! Starting jobs against the remote service.
//!
//! [`SubmissionGateway`] makes exactly one remote call per submission. On
//! success the new job is admitted into the registry as `pending` at
//! progress 0 and the scheduler is woken; on failure nothing is recorded
//! and the error goes straight back to the caller.

use std::sync::Arc;

use chrono::Utc;

use flowcontent_client::{GenerationService, SubmitRequest};
use flowcontent_core::error::SubmissionError;
use flowcontent_core::job::{JobKind, JobRecord};
use flowcontent_core::types::JobId;

use crate::reconciler::StateReconciler;
use crate::scheduler::PollScheduler;

pub struct SubmissionGateway {
    service: Arc<dyn GenerationService>,
    reconciler: Arc<StateReconciler>,
    scheduler: Arc<PollScheduler>,
}

impl SubmissionGateway {
    pub fn new(
        service: Arc<dyn GenerationService>,
        reconciler: Arc<StateReconciler>,
        scheduler: Arc<PollScheduler>,
    ) -> Self {
        Self {
            service,
            reconciler,
            scheduler,
        }
    }

    /// Create a job remotely and start tracking it.
    ///
    /// Submissions are not deduplicated by related entity; two calls for
    /// the same article produce two tracked jobs.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<JobRecord, SubmissionError> {
        if self.reconciler.is_sealed().await {
            return Err(SubmissionError::Stopped);
        }

        let submission = self.service.submit(request).await.map_err(|e| {
            tracing::warn!(kind = %request.kind, error = %e, "Job submission failed");
            e
        })?;

        let related_entity_id = submission
            .related_entity_id
            .or_else(|| request.related_entity_id.clone());
        let job = JobRecord::pending(submission.job_id, request.kind, related_entity_id, Utc::now());
        let job = self.reconciler.admit(job).await?;
        self.scheduler.wake();

        tracing::info!(
            job_id = %job.id,
            kind = %job.kind,
            related_entity_id = job.related_entity_id.as_deref(),
            "Job submitted",
        );
        Ok(job)
    }

    /// Start tracking a job that was created elsewhere.
    pub async fn adopt(
        &self,
        job_id: JobId,
        kind: JobKind,
        related_entity_id: Option<String>,
    ) -> Result<JobRecord, SubmissionError> {
        if job_id.as_str().trim().is_empty() {
            return Err(SubmissionError::Invalid("job id must not be empty".to_string()));
        }

        let job = JobRecord::pending(job_id, kind, related_entity_id, Utc::now());
        let job = self.reconciler.admit(job).await?;
        self.scheduler.wake();

        tracing::info!(job_id = %job.id, kind = %job.kind, "Job adopted for tracking");
        Ok(job)
    }
}
