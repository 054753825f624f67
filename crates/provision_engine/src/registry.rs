use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use provision_core::{Job, JobId, JobStatus};

use crate::TrackerError;

/// Shared handle to one job's state. Each job has its own lock so events for
/// different jobs never wait on each other.
pub(crate) type JobCell = Arc<Mutex<Job>>;

/// Authoritative id → job store. Storage and lookup only; mutation happens
/// through the reconciler while the job's own lock is held.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<BTreeMap<JobId, JobCell>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) -> Result<(), TrackerError> {
        let job_id = job.id().to_string();
        self.insert_cell(job_id, Arc::new(Mutex::new(job)))
    }

    /// Publishes a cell under `job_id`. The caller may hold the cell's lock,
    /// so the job is never read here.
    pub(crate) fn insert_cell(&self, job_id: JobId, cell: JobCell) -> Result<(), TrackerError> {
        let mut jobs = self.jobs.write();
        if jobs.contains_key(&job_id) {
            return Err(TrackerError::DuplicateJob(job_id));
        }
        jobs.insert(job_id, cell);
        Ok(())
    }

    /// Swaps the provisional job `local_id` for `cell` under one write lock,
    /// so a concurrent registration of `job_id` cannot slip in between.
    pub(crate) fn replace_provisional(
        &self,
        local_id: &str,
        job_id: JobId,
        cell: JobCell,
    ) -> Result<(), TrackerError> {
        let mut jobs = self.jobs.write();
        match jobs.get(local_id) {
            Some(existing) if existing.lock().is_provisional() => {}
            Some(_) => return Err(TrackerError::NotProvisional(local_id.to_string())),
            None => return Err(TrackerError::UnknownJob(local_id.to_string())),
        }
        if job_id != local_id && jobs.contains_key(&job_id) {
            return Err(TrackerError::DuplicateJob(job_id));
        }
        jobs.remove(local_id);
        jobs.insert(job_id, cell);
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.cell(job_id).map(|cell| cell.lock().clone())
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.read().contains_key(job_id)
    }

    pub fn remove(&self, job_id: &str) -> Option<Job> {
        let cell = self.jobs.write().remove(job_id)?;
        let job = cell.lock().clone();
        Some(job)
    }

    /// All jobs ordered by id.
    pub fn list(&self) -> Vec<Job> {
        self.cells().iter().map(|cell| cell.lock().clone()).collect()
    }

    pub fn statuses(&self) -> Vec<JobStatus> {
        self.cells().iter().map(|cell| cell.lock().status()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    pub(crate) fn cell(&self, job_id: &str) -> Option<JobCell> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Snapshot of the cells so per-job locks are taken after the map lock is released.
    fn cells(&self) -> Vec<JobCell> {
        self.jobs.read().values().cloned().collect()
    }
}
