use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;

use super::JobStore;
use crate::db::job_repo::{self, JobRow};
use crate::db::Database;
use crate::error::PersistenceError;
use crate::model::{Job, JobUpdate};

/// Job store backed by the SQLite `jobs` table.
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs blocking SQLite work on the blocking thread pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&Database) -> Result<T, PersistenceError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| PersistenceError::Unavailable(format!("database task failed: {}", e)))?
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create(&self, job: &Job) -> Result<(), PersistenceError> {
        let row = JobRow::from_job(job)?;
        self.blocking(move |db| job_repo::insert(db, &row)).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, PersistenceError> {
        let id = job_id.to_string();
        self.blocking(move |db| job_repo::find_by_id(db, &id))
            .await?
            .map(JobRow::into_job)
            .transpose()
    }

    /// Applies `update` in a single transaction so concurrent updates to
    /// the same job do not overwrite each other.
    async fn update_fields(
        &self,
        job_id: &str,
        update: &JobUpdate,
    ) -> Result<(), PersistenceError> {
        let id = job_id.to_string();
        let update = update.clone();
        let found = self
            .blocking(move |db| {
                job_repo::modify(db, &id, |row| {
                    let mut job = row.into_job()?;
                    update.apply_to(&mut job, Utc::now());
                    JobRow::from_job(&job)
                })
            })
            .await?;

        if !found {
            return Err(PersistenceError::NotFound(job_id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> Result<(), PersistenceError> {
        let id = job_id.to_string();
        self.blocking(move |db| job_repo::delete(db, &id)).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Job>, PersistenceError> {
        self.blocking(job_repo::list_all)
            .await?
            .into_iter()
            .map(JobRow::into_job)
            .collect()
    }
}
