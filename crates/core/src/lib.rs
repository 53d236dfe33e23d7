//! Domain model for asynchronous generation jobs.
//!
//! Holds the [`JobRecord`](job::JobRecord) data model, the job state
//! machine, wire-status parsing, the error taxonomy shared by every
//! other crate, and the event type constants used when job lifecycle
//! changes are published. Contains no I/O.

pub mod error;
pub mod job;
pub mod job_events;
pub mod types;
