//! Event type names for job lifecycle notifications.
//!
//! Used by `flowcontent-events` when publishing on the bus and by any
//! subscriber that forwards events to an external channel.

/// Any mutation of a tracked job record (progress bar refresh).
pub const MSG_TYPE_JOB_UPDATED: &str = "job_updated";

/// Job reached `completed`. Fired once per job.
pub const MSG_TYPE_JOB_SUCCEEDED: &str = "job_succeeded";

/// Job reached `error`. Fired once per job.
pub const MSG_TYPE_JOB_FAILED: &str = "job_failed";

/// Polling has failed repeatedly; the job is still being polled.
pub const MSG_TYPE_JOB_DEGRADED: &str = "job_degraded";

/// Polling succeeded again after a degraded streak.
pub const MSG_TYPE_JOB_RECOVERED: &str = "job_recovered";

/// Job was removed from tracking before reaching a terminal state.
pub const MSG_TYPE_JOB_CANCELLED: &str = "job_cancelled";
