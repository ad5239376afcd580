use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::core::orchestrator::TransferJob;

/// Planned transfers kept for later lookup or release.
#[derive(Clone, Default)]
pub struct JobLog {
    jobs: Arc<RwLock<HashMap<Uuid, TransferJob>>>,
}

impl JobLog {
    pub fn insert(&self, job: TransferJob) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.job_id, job);
    }

    pub fn get(&self, job_id: &Uuid) -> Option<TransferJob> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    /// Removes the job; only the caller that gets it back may release it.
    pub fn remove(&self, job_id: &Uuid) -> Option<TransferJob> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
