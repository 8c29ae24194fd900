//! Bounded fan-out of independent per-file operations.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

/// Runs operations with at most `ceiling` in flight.
///
/// Every operation runs to completion; results come back in input order.
/// Operations report failure through their output, so one failing never
/// cancels the others.
#[derive(Clone)]
pub struct BoundedScheduler {
    ceiling: usize,
    semaphore: Arc<Semaphore>,
}

impl BoundedScheduler {
    pub fn new(ceiling: usize) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            ceiling,
            semaphore: Arc::new(Semaphore::new(ceiling)),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub async fn run_all<I, F, T>(&self, operations: I) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T>,
    {
        let gated = operations.into_iter().map(|operation| {
            let semaphore = Arc::clone(&self.semaphore);
            async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = semaphore.acquire().await.ok();
                operation.await
            }
        });
        join_all(gated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_ceiling_is_respected() {
        let scheduler = BoundedScheduler::new(5);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = scheduler
            .run_all((0..20).map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            }))
            .await;

        assert_eq!(results, (0..20).collect::<Vec<_>>());
        assert_eq!(peak.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_failures_do_not_cancel_others() {
        let scheduler = BoundedScheduler::new(2);
        let results: Vec<Result<u32, String>> = scheduler
            .run_all((0..6u32).map(|i| async move {
                if i % 2 == 0 {
                    Err(format!("file {} failed", i))
                } else {
                    Ok(i)
                }
            }))
            .await;

        assert_eq!(results.len(), 6);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
        assert_eq!(results[1], Ok(1));
        assert_eq!(results[4], Err("file 4 failed".to_string()));
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let scheduler = BoundedScheduler::new(3);
        let results = scheduler
            .run_all((0..8u64).map(|i| async move {
                tokio::time::sleep(Duration::from_millis(8 - i)).await;
                i
            }))
            .await;
        assert_eq!(results, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_ceiling_is_clamped() {
        assert_eq!(BoundedScheduler::new(0).ceiling(), 1);
    }
}
