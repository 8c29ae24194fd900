//! Job submission and the background processing protocol.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use log::{error, info, warn};
use serde::Serialize;
use tracing::{info_span, Instrument};

use super::cleanup::discard_failed_job;
use super::stages::StageRunner;
use super::supervisor::Supervisor;
use crate::aggregate::aggregate_documents;
use crate::broadcast::{EventBroadcaster, JobReporter, Stage, Subscription};
use crate::config::{Config, PipelineConfig, PromptRegistry};
use crate::error::{ConfigError, JobError, PersistenceError, PolextError, SubmitError};
use crate::model::{
    generate_job_id, DocumentState, Job, JobStatus, JobSummary, JobUpdate, PolicyExtract,
};
use crate::providers::{
    BlobStore, ChatExtractor, Extractor, FilesystemBlobStore, HttpOcrProvider, JsonRenderer,
    OcrPoller, OcrProvider, Renderer,
};
use crate::secrets::SecretSource;
use crate::store::{JobStore, SqliteJobStore};

/// One file handed to [`Orchestrator::submit`].
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Guessed from `name` when absent.
    pub mime_type: Option<String>,
}

impl UploadFile {
    pub fn new(name: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            bytes,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    pub fn content_type(&self) -> String {
        match &self.mime_type {
            Some(mime_type) if !mime_type.is_empty() => mime_type.clone(),
            _ => mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }
}

/// Immediate acknowledgment of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub job_id: String,
    pub status: String,
    pub message: String,
}

impl Accepted {
    fn processing(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: "processing".to_string(),
            message: "Processing started.".to_string(),
        }
    }
}

/// External collaborators used by the pipeline.
pub struct Collaborators {
    pub store: Arc<dyn JobStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub ocr: Arc<dyn OcrProvider>,
    pub extractor: Arc<dyn Extractor>,
    pub renderer: Arc<dyn Renderer>,
}

struct Inner {
    store: Arc<dyn JobStore>,
    blobs: Arc<dyn BlobStore>,
    poller: OcrPoller,
    extractor: Arc<dyn Extractor>,
    renderer: Arc<dyn Renderer>,
    prompts: PromptRegistry,
    events: EventBroadcaster,
    config: PipelineConfig,
}

/// Accepts submissions and runs each job as a supervised background task.
pub struct Orchestrator {
    inner: Arc<Inner>,
    supervisor: Supervisor,
}

fn resolve_secret(source: &SecretSource) -> Result<Option<secrecy::SecretString>, ConfigError> {
    source
        .resolve_optional()
        .map_err(|e| ConfigError::Secret(e.to_string()))
}

impl Orchestrator {
    pub fn new(
        collaborators: Collaborators,
        prompts: PromptRegistry,
        events: EventBroadcaster,
        config: PipelineConfig,
    ) -> Self {
        let poller = OcrPoller::new(collaborators.ocr, config.poll_interval());
        Self {
            inner: Arc::new(Inner {
                store: collaborators.store,
                blobs: collaborators.blobs,
                poller,
                extractor: collaborators.extractor,
                renderer: collaborators.renderer,
                prompts,
                events,
                config,
            }),
            supervisor: Supervisor::new(),
        }
    }

    /// Wires the SQLite job store, filesystem blob store and HTTP providers
    /// described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, PolextError> {
        let database_path = config
            .storage
            .database_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "Cannot determine database path".to_string(),
            })?;
        let blob_directory =
            config
                .storage
                .blob_directory()
                .ok_or_else(|| ConfigError::Validation {
                    message: "Cannot determine blob directory".to_string(),
                })?;

        let store = SqliteJobStore::open(&database_path)?;
        let ocr = HttpOcrProvider::new(
            &config.ocr.base_url,
            resolve_secret(&config.ocr.credentials)?,
        );
        let extractor = ChatExtractor::new(
            &config.extraction.base_url,
            &config.extraction.model,
            resolve_secret(&config.extraction.credentials)?,
        )
        .with_max_tokens(config.extraction.max_tokens)
        .with_temperature(config.extraction.temperature);
        let prompts = PromptRegistry::from_config(&config.prompts)?;

        info!(
            "Pipeline configured (database={}, blobs={}, prompts={:?})",
            database_path.display(),
            blob_directory.display(),
            prompts.policy_types()
        );

        Ok(Self::new(
            Collaborators {
                store: Arc::new(store),
                blobs: Arc::new(FilesystemBlobStore::new(blob_directory)),
                ocr: Arc::new(ocr),
                extractor: Arc::new(extractor),
                renderer: Arc::new(JsonRenderer),
            },
            prompts,
            EventBroadcaster::new(),
            config.pipeline.clone(),
        ))
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.inner.events
    }

    pub fn subscribe(&self, job_id: &str) -> Subscription {
        self.inner.events.subscribe(job_id)
    }

    /// Uploads `files`, records a new job and starts processing it.
    ///
    /// Returns as soon as the job is recorded; progress and the result are
    /// delivered through the broadcaster and the job store.
    pub async fn submit(
        &self,
        files: Vec<UploadFile>,
        policy_type: Option<&str>,
    ) -> Result<Accepted, SubmitError> {
        if files.is_empty() {
            return Err(SubmitError::NoFiles);
        }
        let policy_type = policy_type
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(self.inner.config.default_policy_type.as_str())
            .to_string();

        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            let content_type = file.content_type();
            match self.inner.blobs.upload(file.bytes, &content_type).await {
                Ok(key) => documents.push(DocumentState::pending(&key, &file.name)),
                Err(source) => {
                    self.discard_uploads(&documents).await;
                    return Err(SubmitError::Upload {
                        name: file.name,
                        source,
                    });
                }
            }
        }

        let job_id = generate_job_id();
        let job = Job::new(&job_id, &policy_type, documents.clone());
        if let Err(e) = self.inner.store.create(&job).await {
            self.discard_uploads(&documents).await;
            return Err(e.into());
        }
        info!(
            "Accepted job {} ({} file(s), policy type {})",
            job_id,
            documents.len(),
            policy_type
        );

        self.start(&job_id, documents, &policy_type);
        Ok(Accepted::processing(&job_id))
    }

    async fn discard_uploads(&self, documents: &[DocumentState]) {
        for doc in documents {
            if let Err(e) = self.inner.blobs.delete(&doc.key).await {
                error!("Failed to delete uploaded blob {}: {}", doc.key, e);
            }
        }
    }

    /// Runs the pipeline for a job already recorded in the store.
    ///
    /// Must be called from within a Tokio runtime. Returns immediately.
    pub fn start(&self, job_id: &str, documents: Vec<DocumentState>, policy_type: &str) {
        let inner = Arc::clone(&self.inner);
        let id = job_id.to_string();
        let policy_type = policy_type.to_string();
        self.supervisor.spawn(job_id, async move {
            inner.run(&id, documents, &policy_type).await;
        });
    }

    /// The stored job, for observers that connect after events were sent.
    pub async fn job(&self, job_id: &str) -> Result<Job, PersistenceError> {
        self.inner
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(job_id.to_string()))
    }

    pub async fn list_summaries(&self) -> Result<Vec<JobSummary>, PersistenceError> {
        let jobs = self.inner.store.list().await?;
        Ok(jobs.iter().map(JobSummary::from_job).collect())
    }

    /// Replaces the extracted data of a job by hand and re-renders it.
    ///
    /// The job is marked complete regardless of its previous status.
    pub async fn update_extracted_data(
        &self,
        job_id: &str,
        extract: PolicyExtract,
    ) -> Result<Job, PolextError> {
        let job = self.job(job_id).await?;
        let artifact = self.inner.renderer.render(&job.policy_type, &extract)?;

        let update = JobUpdate::status(JobStatus::Complete)
            .with_extracted_data(extract)
            .with_artifact(artifact);
        self.inner.store.update_fields(job_id, &update).await?;
        info!("Job {}: extracted data updated", job_id);

        Ok(self.job(job_id).await?)
    }

    pub fn in_flight(&self) -> Vec<String> {
        self.supervisor.in_flight()
    }

    /// Waits up to `grace` for running jobs, then aborts the rest.
    pub async fn shutdown(&self, grace: Duration) -> Vec<String> {
        let aborted = self.supervisor.shutdown(grace).await;
        if !aborted.is_empty() {
            warn!("Shutdown aborted {} running job(s): {:?}", aborted.len(), aborted);
        }
        aborted
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Inner {
    async fn run(&self, job_id: &str, documents: Vec<DocumentState>, policy_type: &str) {
        let reporter = self.events.reporter(job_id);
        let blob_keys: Vec<String> = documents.iter().map(|d| d.key.clone()).collect();
        let span = info_span!("job", job_id = %job_id, policy_type = %policy_type);

        let result = AssertUnwindSafe(self.process(&reporter, documents, policy_type))
            .catch_unwind()
            .instrument(span)
            .await
            .unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(payload.as_ref()))));

        if let Err(e) = result {
            error!("Job {} failed: {}", job_id, e);
            discard_failed_job(
                self.store.as_ref(),
                self.blobs.as_ref(),
                &reporter,
                &blob_keys,
                &e.to_string(),
            )
            .await;
        }
    }

    /// Returns an error only for failures that require discarding the job.
    /// Unknown policy types and batches without any extraction are recorded
    /// as failed jobs here.
    async fn process(
        &self,
        reporter: &JobReporter,
        mut documents: Vec<DocumentState>,
        policy_type: &str,
    ) -> Result<(), JobError> {
        let job_id = reporter.job_id();

        self.store
            .update_fields(job_id, &JobUpdate::status(JobStatus::InProgress))
            .await?;
        reporter.stage(Stage::Initializing);

        let prompt = match self.prompts.resolve(policy_type) {
            Ok(prompt) => prompt,
            Err(e) => {
                let message = JobError::from(e).to_string();
                warn!("Job {}: {}", job_id, message);
                self.store
                    .update_fields(job_id, &JobUpdate::failed(&message))
                    .await?;
                reporter.failed(&message);
                return Ok(());
            }
        };

        let runner = StageRunner {
            job_id,
            store: self.store.as_ref(),
            poller: &self.poller,
            extractor: self.extractor.as_ref(),
            reporter,
            config: &self.config,
        };

        reporter.stage(Stage::OcrStart);
        runner
            .start_ocr(&mut documents)
            .instrument(info_span!("stage_a"))
            .await;
        self.store
            .update_fields(job_id, &JobUpdate::default().with_documents(&documents))
            .await?;

        reporter.stage(Stage::Analysis);
        let documents = runner
            .analyze(documents, &prompt)
            .instrument(info_span!("stage_b"))
            .await?;
        self.store
            .update_fields(job_id, &JobUpdate::default().with_documents(&documents))
            .await?;

        let analyzed = documents
            .iter()
            .filter(|doc| doc.analyzed_data().is_some())
            .count();
        let extract = if analyzed == 0 {
            None
        } else {
            reporter.stage(Stage::Aggregating);
            let _span = info_span!("aggregate", analyzed).entered();
            aggregate_documents(&documents)
        };

        let Some(extract) = extract else {
            let message = JobError::AllDocumentsFailed.to_string();
            warn!("Job {}: {}", job_id, message);
            self.store
                .update_fields(job_id, &JobUpdate::failed(&message).with_documents(&documents))
                .await?;
            reporter.failed(&message);
            return Ok(());
        };

        let artifact = self.renderer.render(policy_type, &extract)?;
        let update = JobUpdate::status(JobStatus::Complete)
            .with_documents(&documents)
            .with_extracted_data(extract.clone())
            .with_artifact(artifact.clone());
        self.store.update_fields(job_id, &update).await?;

        info!(
            "Job {} complete: {}/{} document(s) analyzed, {} offer(s) with franchise, {} without",
            job_id,
            analyzed,
            documents.len(),
            extract.offers_with_franchise.len(),
            extract.offers_without_franchise.len()
        );
        reporter.complete(&extract, &artifact);
        Ok(())
    }
}
