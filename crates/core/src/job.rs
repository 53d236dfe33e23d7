//! Job record data model and the job state machine.
//!
//! ```text
//! pending -> generating -> { completed | error }
//! ```
//!
//! `completed` and `error` are terminal and absorbing. All mutation of a
//! [`JobRecord`] after submission goes through [`JobRecord::reconcile`],
//! which never mutates in place: it returns a [`Reconciliation`] that the
//! caller commits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JOB_NOT_FOUND_MESSAGE;
use crate::types::{JobId, Timestamp};

/// Lowest reportable progress value.
pub const PROGRESS_MIN: u8 = 0;
/// Highest reportable progress value.
pub const PROGRESS_MAX: u8 = 100;

/// Fallback `last_error` when the service reports `error` without a message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "generation failed";

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// Which remote subsystem owns a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Article,
    Video,
    Audio,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(Self::Article),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(format!(
                "Invalid job kind '{other}'. Must be one of: article, video, audio"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Generating,
    Completed,
    Error,
}

impl JobStatus {
    /// `completed` and `error` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Position in the state machine. Terminal states share the last rank.
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Generating => 1,
            Self::Completed | Self::Error => 2,
        }
    }

    /// Parse a status string as reported by either remote subsystem.
    ///
    /// The video service says `processing` and `failed` where the article
    /// service says `generating` and `error`. Returns `None` for anything
    /// else.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => Some(Self::Pending),
            "generating" | "processing" => Some(Self::Generating),
            "completed" => Some(Self::Completed),
            "error" | "failed" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a raw progress value reported by the service into `0..=100`.
pub fn clamp_progress(raw: i64) -> u8 {
    raw.clamp(i64::from(PROGRESS_MIN), i64::from(PROGRESS_MAX)) as u8
}

// ---------------------------------------------------------------------------
// Submission / StatusReport
// ---------------------------------------------------------------------------

/// What the service returns when it accepts a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: JobId,
    /// Domain object being produced, if the service reported one.
    pub related_entity_id: Option<String>,
}

/// One polled status payload `{status, progress, error?}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: JobStatus,
    /// Raw progress as reported; clamped when applied.
    pub progress: i64,
    pub error: Option<String>,
    /// Result location for completed jobs (e.g. the rendered video URL).
    pub output_url: Option<String>,
}

impl StatusReport {
    pub fn new(status: JobStatus, progress: i64) -> Self {
        Self {
            status,
            progress,
            error: None,
            output_url: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_output_url(mut self, url: impl Into<String>) -> Self {
        self.output_url = Some(url.into());
        self
    }

    /// Synthetic report for a job the service no longer recognizes.
    pub fn not_found() -> Self {
        Self::new(JobStatus::Error, 0).with_error(JOB_NOT_FOUND_MESSAGE)
    }
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// Identity plus current state of one generation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub related_entity_id: Option<String>,
    pub status: JobStatus,
    pub progress: u8,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub output_url: Option<String>,
}

/// Result of applying a [`StatusReport`] to a [`JobRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The record was already terminal; the report is stale and dropped.
    Discarded,
    /// The report carried nothing newer than the record.
    Unchanged,
    /// The record advanced but is still non-terminal.
    Updated(JobRecord),
    /// First terminal observation. Fires exactly once per job.
    Terminal(JobRecord),
}

impl JobRecord {
    /// Initial state of a freshly submitted job.
    pub fn pending(
        id: JobId,
        kind: JobKind,
        related_entity_id: Option<String>,
        started_at: Timestamp,
    ) -> Self {
        Self {
            id,
            kind,
            related_entity_id,
            status: JobStatus::Pending,
            progress: PROGRESS_MIN,
            started_at,
            ended_at: None,
            last_error: None,
            output_url: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Compute the next state of this record given a polled report.
    ///
    /// - A terminal record discards every report.
    /// - Status never moves backwards; a report of an earlier state keeps
    ///   the current one.
    /// - Progress is clamped into range and never decreases.
    /// - The first terminal report stamps `ended_at = now`, records
    ///   `last_error` (error) or `output_url` (completed).
    pub fn reconcile(&self, report: &StatusReport, now: Timestamp) -> Reconciliation {
        if self.is_terminal() {
            return Reconciliation::Discarded;
        }

        let status = if report.status.rank() >= self.status.rank() {
            report.status
        } else {
            self.status
        };
        let progress = clamp_progress(report.progress).max(self.progress);

        if status.is_terminal() {
            let mut next = self.clone();
            next.status = status;
            next.progress = progress;
            next.ended_at = Some(now);
            match status {
                JobStatus::Error => {
                    next.last_error = Some(
                        report
                            .error
                            .clone()
                            .filter(|e| !e.trim().is_empty())
                            .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
                    );
                }
                _ => {
                    next.output_url = report.output_url.clone();
                }
            }
            return Reconciliation::Terminal(next);
        }

        if status == self.status && progress == self.progress {
            return Reconciliation::Unchanged;
        }

        let mut next = self.clone();
        next.status = status;
        next.progress = progress;
        Reconciliation::Updated(next)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn pending_job() -> JobRecord {
        JobRecord::pending(
            JobId::new("J1"),
            JobKind::Article,
            Some("article-1".into()),
            Utc::now(),
        )
    }

    fn generating_at(progress: u8) -> JobRecord {
        JobRecord {
            status: JobStatus::Generating,
            progress,
            ..pending_job()
        }
    }

    #[test]
    fn pending_record_starts_at_zero() {
        let job = pending_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.ended_at.is_none());
        assert!(job.last_error.is_none());
    }

    #[test]
    fn wire_status_aliases() {
        assert_eq!(JobStatus::from_wire("pending"), Some(JobStatus::Pending));
        assert_eq!(JobStatus::from_wire("generating"), Some(JobStatus::Generating));
        assert_eq!(JobStatus::from_wire("processing"), Some(JobStatus::Generating));
        assert_eq!(JobStatus::from_wire("completed"), Some(JobStatus::Completed));
        assert_eq!(JobStatus::from_wire("failed"), Some(JobStatus::Error));
        assert_eq!(JobStatus::from_wire(" ERROR "), Some(JobStatus::Error));
        assert_eq!(JobStatus::from_wire("exploded"), None);
    }

    #[test]
    fn job_kind_parses_known_values_only() {
        assert_eq!("video".parse::<JobKind>(), Ok(JobKind::Video));
        assert!("podcast".parse::<JobKind>().is_err());
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(clamp_progress(-5), 0);
        assert_eq!(clamp_progress(42), 42);
        assert_eq!(clamp_progress(250), 100);
    }

    #[test]
    fn generating_report_updates_pending_job() {
        let job = pending_job();
        let report = StatusReport::new(JobStatus::Generating, 40);
        let next = assert_matches!(job.reconcile(&report, Utc::now()), Reconciliation::Updated(j) => j);
        assert_eq!(next.status, JobStatus::Generating);
        assert_eq!(next.progress, 40);
        assert!(next.ended_at.is_none());
    }

    #[test]
    fn lower_progress_is_ignored() {
        let job = generating_at(80);
        let report = StatusReport::new(JobStatus::Generating, 50);
        assert_eq!(job.reconcile(&report, Utc::now()), Reconciliation::Unchanged);
    }

    #[test]
    fn out_of_range_progress_is_clamped_before_applying() {
        let job = generating_at(10);
        let report = StatusReport::new(JobStatus::Generating, 400);
        let next = assert_matches!(job.reconcile(&report, Utc::now()), Reconciliation::Updated(j) => j);
        assert_eq!(next.progress, 100);
    }

    #[test]
    fn status_never_moves_backwards() {
        let job = generating_at(30);
        let report = StatusReport::new(JobStatus::Pending, 35);
        let next = assert_matches!(job.reconcile(&report, Utc::now()), Reconciliation::Updated(j) => j);
        assert_eq!(next.status, JobStatus::Generating);
        assert_eq!(next.progress, 35);
    }

    #[test]
    fn completed_report_is_first_terminal_observation() {
        let job = generating_at(40);
        let now = Utc::now();
        let report = StatusReport::new(JobStatus::Completed, 100).with_output_url("https://cdn/v.mp4");
        let next = assert_matches!(job.reconcile(&report, now), Reconciliation::Terminal(j) => j);
        assert_eq!(next.status, JobStatus::Completed);
        assert_eq!(next.progress, 100);
        assert_eq!(next.ended_at, Some(now));
        assert_eq!(next.output_url.as_deref(), Some("https://cdn/v.mp4"));
        assert!(next.last_error.is_none());
    }

    #[test]
    fn error_report_records_message() {
        let job = generating_at(60);
        let report = StatusReport::new(JobStatus::Error, 0).with_error("model timeout");
        let next = assert_matches!(job.reconcile(&report, Utc::now()), Reconciliation::Terminal(j) => j);
        assert_eq!(next.status, JobStatus::Error);
        assert_eq!(next.progress, 60, "progress is frozen, not reset");
        assert_eq!(next.last_error.as_deref(), Some("model timeout"));
    }

    #[test]
    fn error_report_without_message_uses_default() {
        let job = pending_job();
        let report = StatusReport::new(JobStatus::Error, 0);
        let next = assert_matches!(job.reconcile(&report, Utc::now()), Reconciliation::Terminal(j) => j);
        assert_eq!(next.last_error.as_deref(), Some(DEFAULT_FAILURE_MESSAGE));
    }

    #[test]
    fn not_found_becomes_terminal_error() {
        let job = generating_at(20);
        let next = assert_matches!(
            job.reconcile(&StatusReport::not_found(), Utc::now()),
            Reconciliation::Terminal(j) => j
        );
        assert_eq!(next.status, JobStatus::Error);
        assert_eq!(next.last_error.as_deref(), Some(JOB_NOT_FOUND_MESSAGE));
    }

    #[test]
    fn terminal_record_discards_every_report() {
        let done = JobRecord {
            status: JobStatus::Completed,
            progress: 100,
            ended_at: Some(Utc::now()),
            ..pending_job()
        };
        for report in [
            StatusReport::new(JobStatus::Generating, 90),
            StatusReport::new(JobStatus::Completed, 100),
            StatusReport::new(JobStatus::Error, 0).with_error("late"),
        ] {
            assert_eq!(done.reconcile(&report, Utc::now()), Reconciliation::Discarded);
        }
    }

    #[test]
    fn same_report_twice_is_unchanged() {
        let job = generating_at(40);
        let report = StatusReport::new(JobStatus::Generating, 40);
        assert_eq!(job.reconcile(&report, Utc::now()), Reconciliation::Unchanged);
    }

    #[test]
    fn record_serializes_with_lowercase_enums() {
        let json = serde_json::to_value(pending_job()).expect("serialization should succeed");
        assert_eq!(json["id"], "J1");
        assert_eq!(json["kind"], "article");
        assert_eq!(json["status"], "pending");
        assert!(json["ended_at"].is_null());
    }
}
