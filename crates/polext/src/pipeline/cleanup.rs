use futures_util::future::join_all;
use log::{error, info, warn};

use crate::broadcast::JobReporter;
use crate::model::JobUpdate;
use crate::providers::BlobStore;
use crate::store::JobStore;

/// Removes everything a fatally failed job left behind.
///
/// Blob deletions are best-effort and only logged. If the job record itself
/// cannot be deleted it is marked failed in place instead, and the failure
/// event goes out without the `deleted` flag.
pub(crate) async fn discard_failed_job(
    store: &dyn JobStore,
    blobs: &dyn BlobStore,
    reporter: &JobReporter,
    blob_keys: &[String],
    reason: &str,
) {
    let job_id = reporter.job_id();
    warn!("Job {}: cleaning up after fatal error: {}", job_id, reason);

    let deletions = join_all(blob_keys.iter().map(|key| async move {
        (key, blobs.delete(key).await)
    }))
    .await;
    for (key, result) in deletions {
        if let Err(e) = result {
            error!("Job {}: failed to delete blob {}: {}", job_id, key, e);
        }
    }

    match store.delete(job_id).await {
        Ok(()) => {
            info!("Job {}: record deleted after failure", job_id);
            reporter.failed_and_deleted(reason);
        }
        Err(e) => {
            error!("Job {}: failed to delete job record: {}", job_id, e);
            if let Err(e) = store.update_fields(job_id, &JobUpdate::failed(reason)).await {
                error!("Job {}: failed to mark job as failed: {}", job_id, e);
            }
            reporter.failed(reason);
        }
    }
}
