//! Response bodies of the generation backend and their mapping onto the
//! tracker's domain types.

use serde::Deserialize;

use flowcontent_core::error::{PollError, SubmissionError};
use flowcontent_core::job::{JobStatus, StatusReport, Submission};
use flowcontent_core::types::JobId;

/// Returned by `POST /dashboard/generate-article` and
/// `POST /dashboard/process-article/{articleId}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJobResponse {
    pub success: bool,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub article_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl GenerationJobResponse {
    /// Reason a response is refused, preferring `error` over `message`.
    fn rejection_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "generation service declined the request".to_string())
    }

    /// Article id of a successfully created draft.
    pub fn into_article_id(self) -> Result<String, SubmissionError> {
        if !self.success {
            return Err(SubmissionError::Rejected {
                message: self.rejection_message(),
            });
        }
        self.article_id.ok_or_else(|| SubmissionError::Rejected {
            message: "draft created without an article id".to_string(),
        })
    }

    /// Job handle of a started article generation.
    ///
    /// `fallback_article_id` is used when the response omits `articleId`.
    pub fn into_submission(
        self,
        fallback_article_id: Option<String>,
    ) -> Result<Submission, SubmissionError> {
        if !self.success {
            return Err(SubmissionError::Rejected {
                message: self.rejection_message(),
            });
        }
        let job_id = self
            .job_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| SubmissionError::Rejected {
                message: "generation started without a job id".to_string(),
            })?;
        Ok(Submission {
            job_id: JobId::new(job_id),
            related_entity_id: self.article_id.or(fallback_article_id),
        })
    }
}

/// Returned by `GET /dashboard/jobs/{jobId}`.
///
/// The payload also carries `startTime`, `endTime`, `articleId` and `type`.
/// They are skipped: timestamps are stamped locally and the related entity
/// is fixed at submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatusResponse {
    pub fn into_report(self) -> Result<StatusReport, PollError> {
        let status = parse_status(&self.status)?;
        let mut report = StatusReport::new(status, progress_value(self.progress));
        report.error = self.error;
        Ok(report)
    }
}

/// Returned by `POST /videos-svd/generate` and `GET /videos-svd/status/{jobId}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoJobResponse {
    pub job_id: String,
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl VideoJobResponse {
    pub fn into_report(self) -> Result<StatusReport, PollError> {
        let status = parse_status(&self.status)?;
        let mut report = StatusReport::new(status, progress_value(self.progress));
        report.error = self.error;
        report.output_url = self.video_url;
        Ok(report)
    }

    /// A video job accepted by the service. A response that already
    /// reports failure is treated as a rejection.
    pub fn into_submission(
        self,
        related_entity_id: Option<String>,
    ) -> Result<Submission, SubmissionError> {
        if JobStatus::from_wire(&self.status) == Some(JobStatus::Error) {
            return Err(SubmissionError::Rejected {
                message: self
                    .error
                    .unwrap_or_else(|| "video generation failed to start".to_string()),
            });
        }
        if self.job_id.trim().is_empty() {
            return Err(SubmissionError::Rejected {
                message: "video generation started without a job id".to_string(),
            });
        }
        Ok(Submission {
            job_id: JobId::new(self.job_id),
            related_entity_id,
        })
    }
}

fn parse_status(raw: &str) -> Result<JobStatus, PollError> {
    JobStatus::from_wire(raw)
        .ok_or_else(|| PollError::Transient(format!("unrecognized job status '{raw}'")))
}

/// Progress arrives as a JSON number that may be fractional or missing.
fn progress_value(raw: Option<f64>) -> i64 {
    match raw {
        Some(p) if p.is_finite() => p.round() as i64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn article_status_maps_to_report() {
        let body: JobStatusResponse = serde_json::from_value(serde_json::json!({
            "status": "generating",
            "progress": 42.6,
            "startTime": "2026-01-01T10:00:00Z",
            "type": "article",
        }))
        .expect("deserialization should succeed");

        let report = body.into_report().expect("status should parse");
        assert_eq!(report.status, JobStatus::Generating);
        assert_eq!(report.progress, 43);
        assert!(report.error.is_none());
    }

    #[test]
    fn full_article_status_payload_decodes() {
        let body: JobStatusResponse = serde_json::from_value(serde_json::json!({
            "status": "error",
            "progress": 80,
            "startTime": "2026-01-01T10:00:00Z",
            "endTime": "2026-01-01T10:05:00Z",
            "error": "model unavailable",
            "articleId": "a-7",
            "type": "article",
        }))
        .expect("deserialization should succeed");

        let report = body.into_report().expect("status should parse");
        assert_eq!(report.status, JobStatus::Error);
        assert_eq!(report.progress, 80);
        assert_eq!(report.error.as_deref(), Some("model unavailable"));
    }

    #[test]
    fn video_status_aliases_and_url() {
        let body: VideoJobResponse = serde_json::from_value(serde_json::json!({
            "jobId": "v-1",
            "status": "completed",
            "progress": 100,
            "videoUrl": "https://cdn/v-1.mp4",
        }))
        .expect("deserialization should succeed");

        let report = body.into_report().expect("status should parse");
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.output_url.as_deref(), Some("https://cdn/v-1.mp4"));
    }

    #[test]
    fn video_failed_status_carries_error() {
        let body: VideoJobResponse = serde_json::from_value(serde_json::json!({
            "jobId": "v-2",
            "status": "failed",
            "error": "replicate timeout",
        }))
        .expect("deserialization should succeed");

        let report = body.into_report().expect("status should parse");
        assert_eq!(report.status, JobStatus::Error);
        assert_eq!(report.progress, 0);
        assert_eq!(report.error.as_deref(), Some("replicate timeout"));
    }

    #[test]
    fn unknown_status_is_transient() {
        let body: JobStatusResponse =
            serde_json::from_value(serde_json::json!({"status": "warming_up"}))
                .expect("deserialization should succeed");
        assert_matches!(body.into_report(), Err(PollError::Transient(msg)) if msg.contains("warming_up"));
    }

    #[test]
    fn unsuccessful_generation_response_is_rejected() {
        let body: GenerationJobResponse = serde_json::from_value(serde_json::json!({
            "success": false,
            "articleId": "a-1",
            "error": "quota exceeded",
        }))
        .expect("deserialization should succeed");

        assert_matches!(
            body.into_submission(None),
            Err(SubmissionError::Rejected { message }) if message == "quota exceeded"
        );
    }

    #[test]
    fn generation_response_without_job_id_is_rejected() {
        let body: GenerationJobResponse =
            serde_json::from_value(serde_json::json!({"success": true, "articleId": "a-1"}))
                .expect("deserialization should succeed");
        assert_matches!(body.into_submission(None), Err(SubmissionError::Rejected { .. }));
    }

    #[test]
    fn generation_response_falls_back_to_requested_article() {
        let body: GenerationJobResponse =
            serde_json::from_value(serde_json::json!({"success": true, "jobId": "j-7"}))
                .expect("deserialization should succeed");
        let submission = body
            .into_submission(Some("a-9".into()))
            .expect("submission should be accepted");
        assert_eq!(submission.job_id.as_str(), "j-7");
        assert_eq!(submission.related_entity_id.as_deref(), Some("a-9"));
    }
}
