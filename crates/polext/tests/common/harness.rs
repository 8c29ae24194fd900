//! Orchestrator wiring for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use polext::broadcast::{EventBroadcaster, PipelineEvent, Stage, Subscription};
use polext::config::{PipelineConfig, PromptRegistry};
use polext::model::Job;
use polext::pipeline::{Collaborators, Orchestrator, UploadFile};
use polext::providers::blob::InMemoryBlobStore;
use polext::providers::{JsonRenderer, Renderer};
use polext::store::{InMemoryJobStore, JobStore};

use super::fakes::{FakeExtractor, FakeOcr, FlakyJobStore};

/// Outcome of one submitted job.
#[derive(Debug)]
pub struct RunResult {
    pub job_id: String,
    /// Every event up to and including the terminal one.
    pub events: Vec<PipelineEvent>,
}

impl RunResult {
    pub fn stages(&self) -> Vec<Stage> {
        self.events
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::InProgress { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::InProgress { progress, .. } => progress.clone(),
                _ => None,
            })
            .collect()
    }

    pub fn terminal(&self) -> &PipelineEvent {
        self.events.last().expect("no events received")
    }
}

pub struct HarnessBuilder {
    config: PipelineConfig,
    extractor: FakeExtractor,
    store: Arc<dyn JobStore>,
    renderer: Arc<dyn Renderer>,
    in_progress_polls: usize,
    ocr_start_delay: Duration,
}

impl HarnessBuilder {
    pub fn config(mut self, configure: impl FnOnce(&mut PipelineConfig)) -> Self {
        configure(&mut self.config);
        self
    }

    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = store;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Number of `IN_PROGRESS` pages each OCR job reports before succeeding.
    pub fn in_progress_polls(mut self, polls: usize) -> Self {
        self.in_progress_polls = polls;
        self
    }

    pub fn ocr_start_delay(mut self, delay: Duration) -> Self {
        self.ocr_start_delay = delay;
        self
    }

    pub fn build(self) -> Harness {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let ocr = Arc::new(
            FakeOcr::new(Arc::clone(&blobs), self.in_progress_polls)
                .with_start_delay(self.ocr_start_delay),
        );
        let extractor = Arc::new(self.extractor);
        let store = Arc::new(FlakyJobStore::new(self.store));
        let events = EventBroadcaster::new();

        let orchestrator = Orchestrator::new(
            Collaborators {
                store: store.clone(),
                blobs: blobs.clone(),
                ocr: ocr.clone(),
                extractor: extractor.clone(),
                renderer: self.renderer,
            },
            PromptRegistry::builtin(),
            events.clone(),
            self.config,
        );

        Harness {
            orchestrator,
            store,
            blobs,
            ocr,
            extractor,
            events,
        }
    }
}

/// An orchestrator over fakes, with handles to inspect each of them.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub store: Arc<FlakyJobStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub ocr: Arc<FakeOcr>,
    pub extractor: Arc<FakeExtractor>,
    pub events: EventBroadcaster,
}

impl Harness {
    pub fn builder(extractor: FakeExtractor) -> HarnessBuilder {
        HarnessBuilder {
            config: PipelineConfig {
                poll_interval_ms: 10,
                ..PipelineConfig::default()
            },
            extractor,
            store: Arc::new(InMemoryJobStore::new()),
            renderer: Arc::new(JsonRenderer),
            in_progress_polls: 0,
            ocr_start_delay: Duration::ZERO,
        }
    }

    pub fn new(extractor: FakeExtractor) -> Self {
        Self::builder(extractor).build()
    }

    pub fn uploads(files: &[(&str, &str)]) -> Vec<UploadFile> {
        files
            .iter()
            .map(|(name, text)| UploadFile::new(name, text.as_bytes().to_vec()))
            .collect()
    }

    /// Submits `files` (name, content) and collects events until the job
    /// reaches a terminal state.
    ///
    /// Relies on the current-thread test runtime: the job task cannot run
    /// before the subscription is registered.
    pub async fn run(&self, files: &[(&str, &str)], policy_type: Option<&str>) -> RunResult {
        let accepted = self
            .orchestrator
            .submit(Self::uploads(files), policy_type)
            .await
            .expect("submit failed");
        assert_eq!(accepted.status, "processing");

        let mut subscription = self.orchestrator.subscribe(&accepted.job_id);
        let events = collect_until_terminal(&mut subscription).await;

        RunResult {
            job_id: accepted.job_id,
            events,
        }
    }

    pub async fn job(&self, job_id: &str) -> Option<Job> {
        self.store.get(job_id).await.expect("job store read failed")
    }
}

pub async fn collect_until_terminal(subscription: &mut Subscription) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    let collect = async {
        while let Some(event) = subscription.receiver.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(3600), collect)
        .await
        .expect("job did not reach a terminal state");
    events
}
