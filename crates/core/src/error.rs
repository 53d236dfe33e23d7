use crate::job::JobKind;
use crate::types::JobId;

/// Message stored in `last_error` when the service no longer knows a job.
pub const JOB_NOT_FOUND_MESSAGE: &str = "job not found";

/// The remote service refused (or could not be asked) to create a job.
///
/// Returned synchronously to the caller that initiated the submission.
/// No job record exists when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The service answered but declined to start the job.
    #[error("Submission rejected: {message}")]
    Rejected { message: String },

    /// The payload failed local validation; nothing was sent.
    #[error("Invalid submission payload: {0}")]
    Invalid(String),

    /// The service has no submission endpoint for this kind of job.
    #[error("Submitting {0} jobs is not supported")]
    UnsupportedKind(JobKind),

    /// The service returned an id that is already tracked.
    #[error("Job id {0} is already tracked")]
    DuplicateJobId(JobId),

    /// The request never reached the service or the response was unreadable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The tracker has been stopped and accepts no new jobs.
    #[error("Job tracker is stopped")]
    Stopped,
}

/// Failure while asking the service for a job's status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// The service no longer recognizes the job id. Terminal for the job.
    #[error("job not found")]
    NotFound,

    /// Network failure, timeout, or unreadable response. The job stays
    /// non-terminal and is retried on the next tick.
    #[error("Transient poll error: {0}")]
    Transient(String),
}
