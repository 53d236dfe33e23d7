//! In-memory store of tracked jobs.
//!
//! [`JobRegistry`] is readable by anyone holding it; writes are
//! crate-private and issued only by the
//! [`StateReconciler`](crate::reconciler::StateReconciler).

use std::collections::{HashMap, HashSet};

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use flowcontent_core::job::JobRecord;
use flowcontent_core::types::{JobId, Timestamp};

/// Authoritative, queryable store of every job currently being tracked.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the tracker's components.
#[derive(Default)]
pub struct JobRegistry {
    state: RwLock<RegistryState>,
}

/// Contents of the registry, only reachable through the write guard.
#[derive(Default)]
pub(crate) struct RegistryState {
    jobs: HashMap<JobId, JobRecord>,
    /// Every id ever admitted, including removed ones. Ids are never reused.
    ///
    /// Cancellation and retention purges do not shrink this set, so it grows
    /// by one small entry per job for the life of the registry.
    known_ids: HashSet<JobId>,
    /// Set once the owning tracker stops; no writes are accepted after.
    sealed: bool,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record of a job, or `None` if it is not tracked.
    pub async fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.state.read().await.jobs.get(id).cloned()
    }

    /// Every tracked job, terminal or not, ordered by start time.
    pub async fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.state.read().await.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Snapshot of all non-terminal jobs: the scheduler's polling universe.
    ///
    /// The returned records are copies; later transitions do not affect
    /// a snapshot already taken.
    pub async fn list_active(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self
            .state
            .read()
            .await
            .jobs
            .values()
            .filter(|job| !job.is_terminal())
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Whether at least one tracked job is non-terminal.
    pub async fn has_active(&self) -> bool {
        self.state
            .read()
            .await
            .jobs
            .values()
            .any(|job| !job.is_terminal())
    }

    /// Number of tracked jobs.
    pub async fn len(&self) -> usize {
        self.state.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether the owning tracker has stopped accepting writes.
    pub async fn is_sealed(&self) -> bool {
        self.state.read().await.sealed
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().await
    }
}

impl RegistryState {
    pub(crate) fn get(&self, id: &JobId) -> Option<&JobRecord> {
        self.jobs.get(id)
    }

    /// Insert or replace a record by id.
    ///
    /// Refuses to replace a terminal record with a non-terminal one and
    /// returns `false` in that case.
    pub(crate) fn put(&mut self, job: JobRecord) -> bool {
        if let Some(existing) = self.jobs.get(&job.id) {
            if existing.is_terminal() && !job.is_terminal() {
                return false;
            }
        }
        self.known_ids.insert(job.id.clone());
        self.jobs.insert(job.id.clone(), job);
        true
    }

    pub(crate) fn remove(&mut self, id: &JobId) -> Option<JobRecord> {
        self.jobs.remove(id)
    }

    /// Whether `id` has ever been admitted, even if since removed.
    pub(crate) fn has_seen(&self, id: &JobId) -> bool {
        self.known_ids.contains(id)
    }

    /// Remove terminal jobs that ended before `cutoff`. Returns their ids.
    pub(crate) fn remove_finished_before(&mut self, cutoff: Timestamp) -> Vec<JobId> {
        let expired: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| job.is_terminal() && job.ended_at.is_some_and(|ended| ended < cutoff))
            .map(|job| job.id.clone())
            .collect();
        for id in &expired {
            self.jobs.remove(id);
        }
        expired
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }
}
