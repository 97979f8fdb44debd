use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use alloy::primitives::B256;
use uuid::Uuid;

use crate::job::{JobQueue, JobSpec, JobType, QueueError};

#[derive(Debug, Default)]
struct QueueState {
    jobs: Vec<(Uuid, JobSpec)>,
    rejections: HashMap<JobType, QueueError>,
    duplicates_allowed: HashSet<JobType>,
    fail_lookups: bool,
    add_delay: Option<Duration>,
}

/// A [`JobQueue`] that keeps every accepted job in memory.
///
/// A job with the same type and related id as an accepted one is rejected as
/// [`QueueError::Duplicated`], unless duplicates were allowed for its type.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    state: Mutex<QueueState>,
}

impl RecordingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects every job of `job_type` with `error` until [`RecordingQueue::accept`] is called.
    pub fn reject(&self, job_type: JobType, error: QueueError) {
        self.state().rejections.insert(job_type, error);
    }

    pub fn accept(&self, job_type: JobType) {
        self.state().rejections.remove(&job_type);
    }

    /// Accepts repeated jobs of `job_type` for the same related id.
    pub fn allow_duplicates(&self, job_type: JobType) {
        self.state().duplicates_allowed.insert(job_type);
    }

    /// Makes `offering_job_related_id` fail until switched back.
    pub fn fail_lookups(&self, fail: bool) {
        self.state().fail_lookups = fail;
    }

    /// Delays every `add` response.
    pub fn delay_adds(&self, delay: Duration) {
        self.state().add_delay = Some(delay);
    }

    /// Accepted jobs in submission order.
    #[must_use]
    pub fn jobs(&self) -> Vec<JobSpec> {
        self.state().jobs.iter().map(|(_, job)| job.clone()).collect()
    }

    #[must_use]
    pub fn jobs_of(&self, job_type: JobType) -> Vec<JobSpec> {
        self.jobs().into_iter().filter(|job| job.job_type == job_type).collect()
    }

    /// Id the queue assigned to the `index`-th accepted job.
    #[must_use]
    pub fn job_id(&self, index: usize) -> Option<Uuid> {
        self.state().jobs.get(index).map(|(id, _)| *id)
    }
}

impl JobQueue for RecordingQueue {
    async fn add(&self, job: JobSpec) -> Result<Uuid, QueueError> {
        let delay = self.state().add_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(error) = state.rejections.get(&job.job_type) {
            return Err(error.clone());
        }
        let duplicate = !state.duplicates_allowed.contains(&job.job_type)
            && state.jobs.iter().any(|(_, accepted)| {
                accepted.job_type == job.job_type && accepted.related_id == job.related_id
            });
        if duplicate {
            return Err(QueueError::Duplicated);
        }

        let id = Uuid::new_v4();
        state.jobs.push((id, job));
        Ok(id)
    }

    async fn offering_job_related_id(&self, offering_hash: B256) -> Result<Option<Uuid>, QueueError> {
        let state = self.state();
        if state.fail_lookups {
            return Err(QueueError::Other("lookup failed".into()));
        }
        Ok(state.jobs.iter().find_map(|(_, job)| job.announced_offering(offering_hash)))
    }
}
