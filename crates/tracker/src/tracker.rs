//! The process-scoped job tracking service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use flowcontent_client::{GenerationService, SubmitRequest};
use flowcontent_core::error::SubmissionError;
use flowcontent_core::job::{JobKind, JobRecord};
use flowcontent_core::types::JobId;
use flowcontent_events::{CompletionNotifier, EventBus, JobEvent};

use crate::config::{ConfigError, TrackerConfig};
use crate::gateway::SubmissionGateway;
use crate::reconciler::StateReconciler;
use crate::registry::JobRegistry;
use crate::retention;
use crate::scheduler::{PollScheduler, SchedulerConfig};

/// How long [`JobTracker::stop`] waits for each background task to exit.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Submits generation jobs, keeps them polled, and publishes their
/// lifecycle on an [`EventBus`].
///
/// Created with [`JobTracker::start`] and shared as `Arc<JobTracker>`.
/// Every stateful piece (registry, scheduler, bus) belongs to one
/// instance; nothing is global.
///
/// Call [`stop`](Self::stop) for an orderly shutdown. Dropping the last
/// handle without it aborts polling immediately.
pub struct JobTracker {
    bus: Arc<EventBus>,
    reconciler: Arc<StateReconciler>,
    scheduler: Arc<PollScheduler>,
    gateway: SubmissionGateway,
    background: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl JobTracker {
    /// Validate `config` and start the background tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        service: Arc<dyn GenerationService>,
        config: TrackerConfig,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        let bus = Arc::new(EventBus::default());
        let registry = Arc::new(JobRegistry::new());
        let reconciler = Arc::new(StateReconciler::new(
            registry,
            CompletionNotifier::new(Arc::clone(&bus)),
        ));
        let scheduler = Arc::new(PollScheduler::new(
            Arc::clone(&service),
            Arc::clone(&reconciler),
            SchedulerConfig {
                poll_interval: config.poll_interval,
                request_timeout: config.request_timeout,
                degraded_after_failures: config.degraded_after_failures,
            },
        ));
        let gateway = SubmissionGateway::new(
            service,
            Arc::clone(&reconciler),
            Arc::clone(&scheduler),
        );

        let background = CancellationToken::new();
        let mut handles = vec![tokio::spawn(Arc::clone(&scheduler).run())];
        if let Some(retain_for) = config.retention {
            handles.push(tokio::spawn(retention::run(
                Arc::clone(&reconciler),
                retain_for,
                config.retention_sweep_interval,
                background.child_token(),
            )));
        }

        tracing::info!(
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            degraded_after_failures = config.degraded_after_failures,
            retention_secs = config.retention.map(|r| r.as_secs()),
            "Job tracker started",
        );

        Ok(Arc::new(Self {
            bus,
            reconciler,
            scheduler,
            gateway,
            background,
            handles: Mutex::new(handles),
            stopped: AtomicBool::new(false),
        }))
    }

    /// Start a job remotely and track it from `pending`.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<JobRecord, SubmissionError> {
        self.gateway.submit(request).await
    }

    /// Track a job that was started by someone else.
    pub async fn track(
        &self,
        job_id: impl Into<JobId>,
        kind: JobKind,
        related_entity_id: Option<String>,
    ) -> Result<JobRecord, SubmissionError> {
        self.gateway
            .adopt(job_id.into(), kind, related_entity_id)
            .await
    }

    pub async fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.reconciler.registry().get(id).await
    }

    pub async fn list(&self) -> Vec<JobRecord> {
        self.reconciler.registry().list().await
    }

    /// Non-terminal jobs only.
    pub async fn list_active(&self) -> Vec<JobRecord> {
        self.reconciler.registry().list_active().await
    }

    /// Stop tracking a job and abandon any in-flight poll for it.
    ///
    /// The remote job is not touched. Returns `false` if the job was not
    /// tracked or the tracker is stopped.
    pub async fn cancel(&self, id: &JobId) -> bool {
        let Some(removed) = self.reconciler.remove(id).await else {
            return false;
        };
        self.scheduler.release(id).await;

        if removed.is_terminal() {
            tracing::debug!(job_id = %id, status = %removed.status, "Finished job dropped");
        } else {
            tracing::info!(job_id = %id, "Job tracking cancelled");
            self.reconciler.notifier().job_cancelled(id);
        }
        true
    }

    /// Receive every [`JobEvent`] published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Halt all polling. Idempotent.
    ///
    /// Once this returns the registry is frozen: queries still answer,
    /// while submissions, cancellations and late poll results are refused.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        self.reconciler.seal().await;
        self.scheduler.stop().await;
        self.background.cancel();

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Tracker task panicked"),
                Err(_) => tracing::warn!("Timed out waiting for tracker task to exit"),
            }
        }

        let active = self.reconciler.registry().list_active().await.len();
        tracing::info!(active, "Job tracker stopped");
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        if !self.stopped.load(Ordering::Acquire) {
            tracing::warn!("Job tracker dropped without stop, aborting polling");
            self.scheduler.abort();
            self.background.cancel();
        }
    }
}
