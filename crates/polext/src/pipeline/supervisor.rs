//! Tracks background job tasks so shutdown can drain them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::FutureExt;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

type Tasks = HashMap<String, JoinHandle<()>>;

/// Owns the join handles of running jobs, keyed by job id.
///
/// Finished tasks are reaped lazily whenever the task map is touched.
#[derive(Default)]
pub struct Supervisor {
    tasks: Mutex<Tasks>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tasks> {
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Supervisor lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        tasks.retain(|job_id, handle| {
            if !handle.is_finished() {
                return true;
            }
            if let Some(Err(e)) = handle.now_or_never() {
                error!("Pipeline task for job {} ended abnormally: {}", job_id, e);
            }
            false
        });
        tasks
    }

    /// Spawns `task` on the current runtime and tracks it under `job_id`.
    pub fn spawn<F>(&self, job_id: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        if self.lock().insert(job_id.to_string(), handle).is_some() {
            warn!("Job {} was already running, tracking the newer task", job_id);
        }
        debug!("Spawned pipeline task for job {}", job_id);
    }

    /// Ids of jobs whose tasks are still running, sorted.
    pub fn in_flight(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.lock().contains_key(job_id)
    }

    /// Waits up to `grace` for every tracked task, then aborts the rest.
    ///
    /// Returns the ids of the jobs that had to be aborted.
    pub async fn shutdown(&self, grace: Duration) -> Vec<String> {
        let mut tasks: Vec<(String, JoinHandle<()>)> = self.lock().drain().collect();
        if tasks.is_empty() {
            return Vec::new();
        }
        info!("Waiting up to {:?} for {} running job(s)", grace, tasks.len());

        let drained = tokio::time::timeout(
            grace,
            join_all(tasks.iter_mut().map(|(_, handle)| handle)),
        )
        .await;

        let mut aborted = Vec::new();
        match drained {
            Ok(results) => {
                for ((job_id, _), result) in tasks.iter().zip(results) {
                    if let Err(e) = result {
                        warn!("Pipeline task for job {} ended abnormally: {}", job_id, e);
                    }
                }
            }
            Err(_) => {
                for (job_id, handle) in &tasks {
                    if !handle.is_finished() {
                        warn!("Aborting job {} after shutdown grace period", job_id);
                        handle.abort();
                        aborted.push(job_id.clone());
                    }
                }
            }
        }
        aborted.sort();
        aborted
    }
}
