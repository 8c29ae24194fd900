//! Per-job registry of event observers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;

use super::event::{PipelineEvent, Stage};
use crate::model::PolicyExtract;

/// Receiving end handed to observers.
pub type EventSink = mpsc::UnboundedSender<PipelineEvent>;

/// Handle identifying one registered sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// A sink registered by [`EventBroadcaster::subscribe`].
///
/// Dropping it unsubscribes.
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::UnboundedReceiver<PipelineEvent>,
    job_id: String,
    broadcaster: EventBroadcaster,
}

impl Subscription {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(&self.job_id, self.id);
    }
}

type Registry = HashMap<String, HashMap<SubscriberId, EventSink>>;

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    sinks: RwLock<Registry>,
}

/// Pushes events to the observers currently connected to a job.
///
/// Delivery is best-effort: events published while nobody listens are
/// dropped and there is no replay. Clones share the same registry; separate
/// instances are fully isolated.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    inner: Arc<Inner>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        match self.inner.sinks.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Event registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        match self.inner.sinks.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Event registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Registers an existing sink for `job_id`.
    pub fn subscribe_sink(&self, job_id: &str, sink: EventSink) -> SubscriberId {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.write()
            .entry(job_id.to_string())
            .or_default()
            .insert(id, sink);
        log::debug!("Observer {:?} subscribed to job {}", id, job_id);
        id
    }

    /// Creates a channel and registers its sending half for `job_id`.
    pub fn subscribe(&self, job_id: &str) -> Subscription {
        let (sink, receiver) = mpsc::unbounded_channel();
        let id = self.subscribe_sink(job_id, sink);
        Subscription {
            id,
            receiver,
            job_id: job_id.to_string(),
            broadcaster: self.clone(),
        }
    }

    /// Removes a sink. Unknown jobs or ids are ignored.
    pub fn unsubscribe(&self, job_id: &str, id: SubscriberId) {
        let mut registry = self.write();
        if let Some(sinks) = registry.get_mut(job_id) {
            sinks.remove(&id);
            if sinks.is_empty() {
                registry.remove(job_id);
            }
        }
    }

    /// Sends `event` to every live sink of `job_id` and returns how many
    /// received it. Sinks whose receiver is gone are dropped.
    pub fn publish(&self, job_id: &str, event: &PipelineEvent) -> usize {
        let mut closed = Vec::new();
        let mut delivered = 0;

        {
            let registry = self.read();
            let Some(sinks) = registry.get(job_id) else {
                return 0;
            };
            for (id, sink) in sinks {
                if sink.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*id);
                }
            }
        }

        for id in closed {
            self.unsubscribe(job_id, id);
        }
        delivered
    }

    pub fn subscriber_count(&self, job_id: &str) -> usize {
        self.read().get(job_id).map_or(0, HashMap::len)
    }

    /// Number of jobs with at least one registered sink.
    pub fn watched_jobs(&self) -> usize {
        self.read().len()
    }

    /// Returns a reporter bound to one job.
    pub fn reporter(&self, job_id: &str) -> JobReporter {
        JobReporter {
            job_id: job_id.to_string(),
            broadcaster: self.clone(),
        }
    }
}

/// Publishes the events of a single job.
#[derive(Clone)]
pub struct JobReporter {
    job_id: String,
    broadcaster: EventBroadcaster,
}

impl JobReporter {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn stage(&self, stage: Stage) {
        self.broadcaster
            .publish(&self.job_id, &PipelineEvent::stage(stage));
    }

    pub fn processed(&self, done: usize, total: usize, file_name: &str) {
        self.broadcaster.publish(
            &self.job_id,
            &PipelineEvent::processed(done, total, file_name),
        );
    }

    pub fn complete(&self, extracted_data: &PolicyExtract, artifact: &str) {
        let event = PipelineEvent::Complete {
            extracted_data: extracted_data.clone(),
            artifact: artifact.to_string(),
        };
        self.broadcaster.publish(&self.job_id, &event);
    }

    pub fn failed(&self, error: &str) {
        self.broadcaster
            .publish(&self.job_id, &PipelineEvent::failed(error));
    }

    pub fn failed_and_deleted(&self, error: &str) {
        self.broadcaster
            .publish(&self.job_id, &PipelineEvent::failed_and_deleted(error));
    }
}
