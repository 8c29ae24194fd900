//! The two fan-out stages of a job: OCR start, then poll + extract.

use log::{debug, warn};
use tokio::sync::Mutex;

use crate::broadcast::JobReporter;
use crate::config::PipelineConfig;
use crate::error::{DocumentError, PersistenceError};
use crate::model::{DocumentExtract, DocumentState, DocumentStatus, JobUpdate};
use crate::normalizer;
use crate::providers::{Extractor, OcrPoller};
use crate::scheduler::BoundedScheduler;
use crate::store::JobStore;

/// Borrowed collaborators for running the stages of one job.
pub(crate) struct StageRunner<'a> {
    pub job_id: &'a str,
    pub store: &'a dyn JobStore,
    pub poller: &'a OcrPoller,
    pub extractor: &'a dyn Extractor,
    pub reporter: &'a JobReporter,
    pub config: &'a PipelineConfig,
}

struct AnalysisProgress {
    documents: Vec<DocumentState>,
    succeeded: usize,
}

impl StageRunner<'_> {
    /// Stage A: starts an OCR job for every pending document.
    ///
    /// A document whose start fails is marked failed; the others continue.
    pub async fn start_ocr(&self, documents: &mut [DocumentState]) {
        let scheduler = BoundedScheduler::new(self.config.ocr_start_concurrency);

        let starts = documents.iter().map(|doc| {
            let key = doc.key.clone();
            let pending = doc.status == DocumentStatus::Pending;
            async move {
                if pending {
                    Some(self.poller.start_job(&key).await)
                } else {
                    None
                }
            }
        });
        let results = scheduler.run_all(starts).await;

        for (doc, result) in documents.iter_mut().zip(results) {
            match result {
                Some(Ok(ocr_job_id)) => doc.mark_ocr_started(ocr_job_id),
                Some(Err(e)) => {
                    warn!(
                        "Job {}: failed to start OCR for '{}': {}",
                        self.job_id, doc.original_name, e
                    );
                    doc.mark_failed(e);
                }
                None => {}
            }
        }
    }

    /// Stage B: polls OCR and runs extraction for every started document.
    ///
    /// Each unit runs under the per-document deadline. Successes are reported
    /// as they land and documents are persisted every `persist_every`
    /// successes and once the success count reaches the file count. Batch
    /// writes happen outside the progress lock, one at a time, each with the
    /// latest snapshot. A failed batch persist is returned after every unit
    /// has settled.
    pub async fn analyze(
        &self,
        documents: Vec<DocumentState>,
        prompt: &str,
    ) -> Result<Vec<DocumentState>, PersistenceError> {
        let scheduler = BoundedScheduler::new(self.config.analyze_concurrency);
        let total = documents.len();

        let work: Vec<(usize, String, String)> = documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.status == DocumentStatus::OcrStarted)
            .filter_map(|(index, doc)| {
                doc.ocr_job_id
                    .clone()
                    .map(|ocr_job_id| (index, ocr_job_id, doc.original_name.clone()))
            })
            .collect();

        let progress = Mutex::new(AnalysisProgress {
            documents,
            succeeded: 0,
        });
        let persist_error: Mutex<Option<PersistenceError>> = Mutex::new(None);

        let units = work.into_iter().map(|(index, ocr_job_id, name)| {
            let progress = &progress;
            let persist_error = &persist_error;
            async move {
                let timeout = self.config.document_timeout();
                let outcome =
                    match tokio::time::timeout(timeout, self.analyze_one(&ocr_job_id, prompt))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(DocumentError::Timeout(timeout)),
                    };

                let persist = {
                    let mut state = progress.lock().await;
                    match outcome {
                        Ok(extract) => {
                            state.documents[index].mark_analyzed(extract);
                            state.succeeded += 1;
                            let done = state.succeeded;
                            self.reporter.processed(done, total, &name);
                            debug!("Job {}: analyzed {}/{} ({})", self.job_id, done, total, name);
                            done % self.config.persist_every.max(1) == 0 || done == total
                        }
                        Err(e) => {
                            warn!("Job {}: failed to analyze '{}': {}", self.job_id, name, e);
                            state.documents[index].mark_failed(e);
                            false
                        }
                    }
                };

                if persist {
                    self.persist_batch(progress, persist_error).await;
                }
            }
        });
        scheduler.run_all(units).await;

        match persist_error.into_inner() {
            Some(e) => Err(e),
            None => Ok(progress.into_inner().documents),
        }
    }

    /// Writes the current document list. Holding `persist_error` serializes
    /// batch writes; the snapshot is taken after acquiring it so a later
    /// write never carries older state than an earlier one.
    async fn persist_batch(
        &self,
        progress: &Mutex<AnalysisProgress>,
        persist_error: &Mutex<Option<PersistenceError>>,
    ) {
        let mut error = persist_error.lock().await;
        if error.is_some() {
            return;
        }
        let update = JobUpdate::default().with_documents(&progress.lock().await.documents);
        if let Err(e) = self.store.update_fields(self.job_id, &update).await {
            warn!("Job {}: failed to persist document progress: {}", self.job_id, e);
            *error = Some(e);
        }
    }

    async fn analyze_one(
        &self,
        ocr_job_id: &str,
        prompt: &str,
    ) -> Result<DocumentExtract, DocumentError> {
        let text = self.poller.wait_for_completion(ocr_job_id).await?;
        let raw = self.extractor.extract(&text, prompt).await?;
        let value = normalizer::recover(&raw)?;
        DocumentExtract::from_value(value).map_err(|e| DocumentError::InvalidExtract(e.to_string()))
    }
}
