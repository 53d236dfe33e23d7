//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`JobEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` between the tracker and any
//! UI projection.

use serde::Serialize;
use tokio::sync::broadcast;

use flowcontent_core::job::JobRecord;
use flowcontent_core::job_events::{
    MSG_TYPE_JOB_CANCELLED, MSG_TYPE_JOB_DEGRADED, MSG_TYPE_JOB_FAILED, MSG_TYPE_JOB_RECOVERED,
    MSG_TYPE_JOB_SUCCEEDED, MSG_TYPE_JOB_UPDATED,
};
use flowcontent_core::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A change in the lifecycle of a tracked job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// The job's record was mutated (status and/or progress).
    JobUpdated { job: JobRecord },

    /// First terminal observation with status `completed`.
    JobSucceeded { job: JobRecord },

    /// First terminal observation with status `error`.
    JobFailed { job: JobRecord },

    /// Polling has failed `consecutive_failures` times in a row. The job
    /// is still non-terminal and still being polled.
    JobDegraded {
        job_id: JobId,
        consecutive_failures: u32,
        at: Timestamp,
    },

    /// A poll succeeded after a degraded streak.
    JobRecovered { job_id: JobId, at: Timestamp },

    /// The job was removed from tracking before it reached a terminal state.
    JobCancelled { job_id: JobId, at: Timestamp },
}

impl JobEvent {
    /// Stable event name, e.g. `"job_succeeded"`.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::JobUpdated { .. } => MSG_TYPE_JOB_UPDATED,
            Self::JobSucceeded { .. } => MSG_TYPE_JOB_SUCCEEDED,
            Self::JobFailed { .. } => MSG_TYPE_JOB_FAILED,
            Self::JobDegraded { .. } => MSG_TYPE_JOB_DEGRADED,
            Self::JobRecovered { .. } => MSG_TYPE_JOB_RECOVERED,
            Self::JobCancelled { .. } => MSG_TYPE_JOB_CANCELLED,
        }
    }

    /// Id of the job this event concerns.
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::JobUpdated { job } | Self::JobSucceeded { job } | Self::JobFailed { job } => {
                &job.id
            }
            Self::JobDegraded { job_id, .. }
            | Self::JobRecovered { job_id, .. }
            | Self::JobCancelled { job_id, .. } => job_id,
        }
    }

    /// Whether this is a once-per-job terminal notification.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::JobSucceeded { .. } | Self::JobFailed { .. })
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`JobEvent`].
///
/// # Usage
///
/// ```rust
/// use flowcontent_events::bus::{EventBus, JobEvent};
/// use flowcontent_core::types::JobId;
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::JobCancelled { job_id: JobId::new("J1"), at: chrono::Utc::now() });
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: JobEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use flowcontent_core::job::JobKind;

    use super::*;

    fn record(id: &str) -> JobRecord {
        JobRecord::pending(JobId::new(id), JobKind::Video, None, Utc::now())
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(JobEvent::JobUpdated { job: record("J1") });

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type(), MSG_TYPE_JOB_UPDATED);
        assert_eq!(received.job_id().as_str(), "J1");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(JobEvent::JobSucceeded { job: record("J2") });

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert!(e1.is_terminal());
        assert_eq!(e2.event_type(), MSG_TYPE_JOB_SUCCEEDED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers; this must not panic.
        bus.publish(JobEvent::JobCancelled {
            job_id: JobId::new("orphan"),
            at: Utc::now(),
        });
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = JobEvent::JobDegraded {
            job_id: JobId::new("J3"),
            consecutive_failures: 5,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).expect("serialization should succeed");
        assert_eq!(json["type"], "job_degraded");
        assert_eq!(json["job_id"], "J3");
        assert_eq!(json["consecutive_failures"], 5);
    }
}
