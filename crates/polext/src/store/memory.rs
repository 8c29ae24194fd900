use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::JobStore;
use crate::error::PersistenceError;
use crate::model::{Job, JobUpdate};

/// Job store kept in process memory.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &Job) -> Result<(), PersistenceError> {
        let mut jobs = self.write();
        if jobs.contains_key(&job.job_id) {
            return Err(PersistenceError::AlreadyExists(job.job_id.clone()));
        }
        jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, PersistenceError> {
        Ok(self.read().get(job_id).cloned())
    }

    async fn update_fields(
        &self,
        job_id: &str,
        update: &JobUpdate,
    ) -> Result<(), PersistenceError> {
        let mut jobs = self.write();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| PersistenceError::NotFound(job_id.to_string()))?;
        update.apply_to(job, Utc::now());
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> Result<(), PersistenceError> {
        self.write().remove(job_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Job>, PersistenceError> {
        let mut jobs: Vec<Job> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}
