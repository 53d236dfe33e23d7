//! Shared helpers for job tracker integration tests.
//!
//! [`FakeService`] is an in-memory [`GenerationService`] whose status
//! answers are scripted per job. Each scripted step can be delayed to keep
//! a request in flight across ticks; the last step of a script repeats
//! forever.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::Instant;

use flowcontent_client::{GenerationService, SubmitRequest};
use flowcontent_core::error::{PollError, SubmissionError};
use flowcontent_core::job::{JobKind, JobStatus, StatusReport, Submission};
use flowcontent_core::types::JobId;
use flowcontent_events::JobEvent;
use flowcontent_tracker::{JobTracker, TrackerConfig};

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Generous upper bound for waiting on an event in virtual time.
pub const EVENT_WAIT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Scripted steps
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Step {
    pub delay: Option<Duration>,
    pub outcome: Result<StatusReport, PollError>,
}

impl Step {
    pub fn report(status: JobStatus, progress: i64) -> Self {
        Self {
            delay: None,
            outcome: Ok(StatusReport::new(status, progress)),
        }
    }

    pub fn reply(report: StatusReport) -> Self {
        Self {
            delay: None,
            outcome: Ok(report),
        }
    }

    pub fn fail(reason: &str) -> Self {
        Self {
            delay: None,
            outcome: Err(PollError::Transient(reason.to_string())),
        }
    }

    pub fn not_found() -> Self {
        Self {
            delay: None,
            outcome: Err(PollError::NotFound),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Submission answer queued ahead of a `submit` call.
pub enum SubmitOutcome {
    Accept(Submission),
    Reject(SubmissionError),
}

// ---------------------------------------------------------------------------
// FakeService
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeService {
    submissions: Mutex<VecDeque<SubmitOutcome>>,
    scripts: Mutex<HashMap<JobId, VecDeque<Step>>>,
    /// Every status call as `(job, kind, when)` in arrival order.
    calls: Mutex<Vec<(JobId, JobKind, Instant)>>,
    in_flight: Mutex<HashMap<JobId, usize>>,
    max_in_flight: AtomicUsize,
    submit_calls: AtomicUsize,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Next `submit` returns this id.
    pub fn accept_next(&self, id: &str) {
        self.submissions
            .lock()
            .unwrap()
            .push_back(SubmitOutcome::Accept(Submission {
                job_id: JobId::new(id),
                related_entity_id: None,
            }));
    }

    /// Next `submit` fails.
    pub fn reject_next(&self, error: SubmissionError) {
        self.submissions
            .lock()
            .unwrap()
            .push_back(SubmitOutcome::Reject(error));
    }

    /// Status answers for `id`, consumed in order. The last one repeats.
    pub fn script(&self, id: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(JobId::new(id), steps.into());
    }

    pub fn status_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn status_calls_for(&self, id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(job, _, _)| job.as_str() == id)
            .count()
    }

    pub fn call_times_for(&self, id: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(job, _, _)| job.as_str() == id)
            .map(|(_, _, at)| *at)
            .collect()
    }

    pub fn kinds_polled_for(&self, id: &str) -> Vec<JobKind> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(job, _, _)| job.as_str() == id)
            .map(|(_, kind, _)| *kind)
            .collect()
    }

    pub fn in_flight_for(&self, id: &str) -> usize {
        self.in_flight
            .lock()
            .unwrap()
            .get(&JobId::new(id))
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of simultaneous requests ever observed for one job.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    fn next_step(&self, id: &JobId) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(id) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
            Some(steps) => steps
                .front()
                .cloned()
                .unwrap_or_else(|| Step::report(JobStatus::Pending, 0)),
            None => Step::report(JobStatus::Pending, 0),
        }
    }
}

/// Tracks one in-flight request; decrements when the request future is
/// dropped, including when the tracker abandons it.
struct InFlightGuard<'a> {
    service: &'a FakeService,
    id: JobId,
}

impl<'a> InFlightGuard<'a> {
    fn enter(service: &'a FakeService, id: &JobId) -> Self {
        let mut in_flight = service.in_flight.lock().unwrap();
        let count = in_flight.entry(id.clone()).or_insert(0);
        *count += 1;
        service.max_in_flight.fetch_max(*count, Ordering::SeqCst);
        Self {
            service,
            id: id.clone(),
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(count) = self.service.in_flight.lock().unwrap().get_mut(&self.id) {
            *count -= 1;
        }
    }
}

#[async_trait]
impl GenerationService for FakeService {
    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, SubmissionError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.submissions.lock().unwrap().pop_front();
        match queued {
            Some(SubmitOutcome::Accept(submission)) => Ok(submission),
            Some(SubmitOutcome::Reject(error)) => Err(error),
            None => Ok(Submission {
                job_id: JobId::new(uuid::Uuid::new_v4().to_string()),
                related_entity_id: request.related_entity_id.clone(),
            }),
        }
    }

    async fn status(&self, kind: JobKind, job_id: &JobId) -> Result<StatusReport, PollError> {
        self.calls
            .lock()
            .unwrap()
            .push((job_id.clone(), kind, Instant::now()));
        let _guard = InFlightGuard::enter(self, job_id);

        let step = self.next_step(job_id);
        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }
        step.outcome
    }
}

// ---------------------------------------------------------------------------
// Tracker helpers
// ---------------------------------------------------------------------------

pub fn test_config() -> TrackerConfig {
    TrackerConfig {
        poll_interval: POLL_INTERVAL,
        request_timeout: None,
        degraded_after_failures: 3,
        retention: None,
        retention_sweep_interval: Duration::from_secs(1),
    }
}

pub fn start(service: &Arc<FakeService>, config: TrackerConfig) -> Arc<JobTracker> {
    let service: Arc<dyn GenerationService> = service.clone();
    JobTracker::start(service, config).expect("tracker should start")
}

/// Wait for the first event matching `pred`, skipping others.
pub async fn wait_for(
    rx: &mut broadcast::Receiver<JobEvent>,
    pred: impl Fn(&JobEvent) -> bool,
) -> JobEvent {
    tokio::time::timeout(EVENT_WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Wait for `id`'s terminal event.
pub async fn wait_terminal(rx: &mut broadcast::Receiver<JobEvent>, id: &str) -> JobEvent {
    wait_for(rx, |e| e.is_terminal() && e.job_id().as_str() == id).await
}

/// Collect every event currently buffered.
pub fn drain(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Yield until `cond` holds, advancing virtual time in small steps.
pub async fn until(cond: impl Fn() -> bool) {
    tokio::time::timeout(EVENT_WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}
