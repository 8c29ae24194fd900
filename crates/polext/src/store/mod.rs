//! Key-value job persistence.

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::model::{Job, JobUpdate};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryJobStore;
pub use sqlite::SqliteJobStore;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new job. Fails with `AlreadyExists` on a duplicate id.
    async fn create(&self, job: &Job) -> Result<(), PersistenceError>;

    async fn get(&self, job_id: &str) -> Result<Option<Job>, PersistenceError>;

    /// Applies a partial update. Fails with `NotFound` for an unknown id.
    async fn update_fields(&self, job_id: &str, update: &JobUpdate)
        -> Result<(), PersistenceError>;

    /// Removes a job. Removing an unknown id is not an error.
    async fn delete(&self, job_id: &str) -> Result<(), PersistenceError>;

    /// All jobs, newest first.
    async fn list(&self) -> Result<Vec<Job>, PersistenceError>;
}
