//! Asynchronous generation job tracking.
//!
//! A [`JobTracker`] is a process-scoped service that submits generation
//! jobs to a remote [`GenerationService`](flowcontent_client::GenerationService),
//! polls every non-terminal job on a fixed interval, and publishes
//! [`JobEvent`](flowcontent_events::JobEvent)s as jobs progress.
//!
//! Components:
//!
//! - [`registry::JobRegistry`] -- the single source of truth for tracked jobs.
//! - [`reconciler::StateReconciler`] -- the only writer to the registry.
//! - [`gateway::SubmissionGateway`] -- starts jobs and seeds the registry.
//! - [`scheduler::PollScheduler`] -- the tick loop and per-job poll lanes.
//! - [`retention`] -- optional purge of long-finished jobs.

pub mod config;
pub mod gateway;
pub mod reconciler;
pub mod registry;
pub mod retention;
pub mod scheduler;
pub mod tracker;

pub use config::{ConfigError, TrackerConfig};
pub use tracker::JobTracker;
