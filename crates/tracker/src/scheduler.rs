//! Periodic status polling (tick loop plus one lane per job).
//!
//! On every tick the scheduler snapshots the registry's active jobs and
//! issues one status request per job, concurrently. Each job has a *lane*
//! holding at most one in-flight request: a job whose previous request has
//! not returned is skipped for the tick, so results for one job are applied
//! in the order they were issued.
//!
//! When no job is active the loop parks on a [`Notify`] instead of ticking,
//! and performs no network activity until [`PollScheduler::wake`] is called.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use flowcontent_client::GenerationService;
use flowcontent_core::error::PollError;
use flowcontent_core::job::{JobKind, Reconciliation, StatusReport};
use flowcontent_core::types::JobId;

use crate::reconciler::StateReconciler;

/// How long [`PollScheduler::stop`] waits for in-flight lanes to drain.
const STOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-job polling state.
#[derive(Default)]
struct Lane {
    /// Token of the request currently in flight, if any.
    in_flight: Option<CancellationToken>,
    consecutive_failures: u32,
    degraded: bool,
}

/// Settings the scheduler needs from [`TrackerConfig`](crate::TrackerConfig).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub request_timeout: Option<Duration>,
    pub degraded_after_failures: u32,
}

pub struct PollScheduler {
    service: Arc<dyn GenerationService>,
    reconciler: Arc<StateReconciler>,
    config: SchedulerConfig,
    lanes: Mutex<HashMap<JobId, Lane>>,
    wake: Notify,
    /// Cancels the tick loop and, through child tokens, every lane.
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl PollScheduler {
    pub fn new(
        service: Arc<dyn GenerationService>,
        reconciler: Arc<StateReconciler>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            service,
            reconciler,
            config,
            lanes: Mutex::new(HashMap::new()),
            wake: Notify::new(),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Resume ticking after an idle period. Called when a job is admitted.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of jobs with a request currently in flight.
    pub async fn in_flight(&self) -> usize {
        self.lanes
            .lock()
            .await
            .values()
            .filter(|lane| lane.in_flight.is_some())
            .count()
    }

    /// Run the tick loop until [`stop`](Self::stop) is called.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first poll of a job happens one full interval after it starts.
        ticker.reset();

        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Poll scheduler started",
        );

        loop {
            if !self.reconciler.registry().has_active().await {
                tracing::debug!("No active jobs, poll scheduler idle");
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = self.wake.notified() => {
                        ticker.reset();
                        continue;
                    }
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }

        tracing::info!("Poll scheduler stopped");
    }

    /// One pass over the active jobs.
    ///
    /// The lanes lock is held across the snapshot so that a concurrent
    /// [`release`](Self::release) either precedes the snapshot or cancels
    /// the request armed from it.
    pub async fn tick(self: &Arc<Self>) {
        let mut lanes = self.lanes.lock().await;
        let snapshot = self.reconciler.registry().list_active().await;
        if snapshot.is_empty() {
            return;
        }

        let mut issued = 0usize;
        for job in snapshot {
            if self.cancel.is_cancelled() {
                return;
            }
            let lane = lanes.entry(job.id.clone()).or_default();
            if lane.in_flight.is_some() {
                tracing::trace!(job_id = %job.id, "Previous poll still in flight, skipping");
                continue;
            }

            let token = self.cancel.child_token();
            lane.in_flight = Some(token.clone());
            issued += 1;

            let this = Arc::clone(self);
            self.tasks
                .spawn(async move { this.poll_job(job.id, job.kind, token).await });
        }
        tracing::trace!(issued, "Poll tick issued requests");
    }

    /// Stop tracking one job: aborts its in-flight request, if any.
    pub async fn release(&self, id: &JobId) {
        if let Some(lane) = self.lanes.lock().await.remove(id) {
            if let Some(token) = lane.in_flight {
                token.cancel();
            }
        }
    }

    /// Cancel the tick loop and every in-flight request without waiting.
    ///
    /// Results of aborted requests are discarded by the reconciler since
    /// their lane tokens are children of the scheduler's token.
    pub fn abort(&self) {
        self.cancel.cancel();
        self.tasks.close();
    }

    /// Cancel the tick loop and every in-flight request, then wait briefly
    /// for lanes to finish. Idempotent.
    pub async fn stop(&self) {
        self.abort();
        if tokio::time::timeout(STOP_DRAIN_TIMEOUT, self.tasks.wait())
            .await
            .is_err()
        {
            tracing::warn!("Timed out waiting for in-flight polls to finish");
        }
        self.lanes.lock().await.clear();
    }

    // ---- private helpers ----

    /// Issue one status request for a job and apply its result.
    async fn poll_job(self: Arc<Self>, id: JobId, kind: JobKind, token: CancellationToken) {
        let result = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(job_id = %id, "Poll aborted");
                self.clear_in_flight(&id).await;
                return;
            }
            result = self.fetch_status(kind, &id) => result,
        };

        match result {
            Ok(report) => self.on_report(&id, &report, &token).await,
            Err(PollError::NotFound) => {
                tracing::warn!(job_id = %id, "Job no longer known to generation service");
                self.on_report(&id, &StatusReport::not_found(), &token).await;
            }
            Err(PollError::Transient(reason)) => self.on_transient(&id, &reason, &token).await,
        }

        self.clear_in_flight(&id).await;
    }

    async fn fetch_status(&self, kind: JobKind, id: &JobId) -> Result<StatusReport, PollError> {
        let request = self.service.status(kind, id);
        match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .unwrap_or_else(|_| {
                    Err(PollError::Transient(format!(
                        "status request timed out after {} ms",
                        limit.as_millis()
                    )))
                }),
            None => request.await,
        }
    }

    async fn on_report(&self, id: &JobId, report: &StatusReport, token: &CancellationToken) {
        let outcome = self.reconciler.apply(id, report, token).await;
        if token.is_cancelled() {
            return;
        }

        let recovered = {
            let mut lanes = self.lanes.lock().await;
            match lanes.get_mut(id) {
                Some(lane) => {
                    let was_degraded = lane.degraded;
                    lane.consecutive_failures = 0;
                    lane.degraded = false;
                    was_degraded
                }
                None => false,
            }
        };
        if recovered && !matches!(outcome, Reconciliation::Discarded) {
            self.reconciler
                .publish_if_tracked(id, |notifier| notifier.job_recovered(id))
                .await;
        }

        if let Reconciliation::Terminal(job) = &outcome {
            tracing::debug!(job_id = %id, status = %job.status, "Job terminal, lane retired");
            self.lanes.lock().await.remove(id);
        }
    }

    async fn on_transient(&self, id: &JobId, reason: &str, token: &CancellationToken) {
        let degraded_after = self.lanes.lock().await.get_mut(id).and_then(|lane| {
            if token.is_cancelled() {
                return None;
            }
            lane.consecutive_failures += 1;
            tracing::debug!(
                job_id = %id,
                consecutive_failures = lane.consecutive_failures,
                error = %reason,
                "Status poll failed",
            );
            if lane.consecutive_failures >= self.config.degraded_after_failures && !lane.degraded {
                lane.degraded = true;
                Some(lane.consecutive_failures)
            } else {
                None
            }
        });

        if let Some(failures) = degraded_after {
            self.reconciler
                .publish_if_tracked(id, |notifier| notifier.job_degraded(id, failures))
                .await;
        }
    }

    /// Free the lane for the next tick. Lanes removed meanwhile stay removed.
    async fn clear_in_flight(&self, id: &JobId) {
        if let Some(lane) = self.lanes.lock().await.get_mut(id) {
            lane.in_flight = None;
        }
    }
}
