//! Fake collaborators with call and concurrency accounting.
//!
//! The OCR fake reads the uploaded bytes back from the shared in-memory blob
//! store and returns them as the recognized text, so a test file's content
//! selects the scripted behavior:
//! - `fail-ocr-start...` makes starting the OCR job fail
//! - `ocr-failed...` makes the OCR job end in `FAILED`
//!
//! The extractor answers by OCR text.
//!
//! Every OCR call is recorded in order, so tests can check how the two
//! pipeline stages interleave.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use polext::error::{PersistenceError, ProviderError, RenderError};
use polext::model::{Job, JobUpdate, PolicyExtract};
use polext::providers::blob::InMemoryBlobStore;
use polext::providers::{Extractor, OcrPage, OcrProvider, OcrStatus, Renderer};
use polext::store::JobStore;

/// One call made to [`FakeOcr`], keyed by blob key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrCall {
    Start(String),
    Page(String),
}

pub struct FakeOcr {
    blobs: Arc<InMemoryBlobStore>,
    in_progress_polls: usize,
    start_delay: Duration,
    polls: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<OcrCall>>,
    starts: AtomicUsize,
    starts_in_flight: AtomicUsize,
    start_peak: AtomicUsize,
}

impl FakeOcr {
    pub fn new(blobs: Arc<InMemoryBlobStore>, in_progress_polls: usize) -> Self {
        Self {
            blobs,
            in_progress_polls,
            start_delay: Duration::ZERO,
            polls: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            starts: AtomicUsize::new(0),
            starts_in_flight: AtomicUsize::new(0),
            start_peak: AtomicUsize::new(0),
        }
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Most `start_job` calls that were running at the same time.
    pub fn start_peak(&self) -> usize {
        self.start_peak.load(Ordering::SeqCst)
    }

    /// Every call so far, in the order they were made.
    pub fn calls(&self) -> Vec<OcrCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: OcrCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn text_of(&self, key: &str) -> Result<String, ProviderError> {
        self.blobs
            .get(key)
            .map(|blob| String::from_utf8_lossy(&blob.bytes).into_owned())
            .ok_or_else(|| ProviderError::Ocr(format!("unknown document {}", key)))
    }
}

#[async_trait]
impl OcrProvider for FakeOcr {
    async fn start_job(&self, blob_key: &str) -> Result<String, ProviderError> {
        self.record(OcrCall::Start(blob_key.to_string()));
        self.starts.fetch_add(1, Ordering::SeqCst);
        let now = self.starts_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.start_peak.fetch_max(now, Ordering::SeqCst);

        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        let result = self.text_of(blob_key).and_then(|text| {
            if text.starts_with("fail-ocr-start") {
                Err(ProviderError::Ocr("text detection quota exceeded".to_string()))
            } else {
                // The OCR job id doubles as the blob key so pages can find the text.
                Ok(blob_key.to_string())
            }
        });

        self.starts_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_page(
        &self,
        job_id: &str,
        _next_token: Option<&str>,
    ) -> Result<OcrPage, ProviderError> {
        self.record(OcrCall::Page(job_id.to_string()));
        {
            let mut polls = self.polls.lock().unwrap();
            let count = polls.entry(job_id.to_string()).or_insert(0);
            *count += 1;
            if *count <= self.in_progress_polls {
                return Ok(OcrPage {
                    status: OcrStatus::InProgress,
                    lines: vec![],
                    next_token: None,
                });
            }
        }

        let text = self.text_of(job_id)?;
        if text.starts_with("ocr-failed") {
            return Ok(OcrPage {
                status: OcrStatus::Failed,
                lines: vec![],
                next_token: None,
            });
        }
        Ok(OcrPage {
            status: OcrStatus::Succeeded,
            lines: text.lines().map(str::to_string).collect(),
            next_token: None,
        })
    }

    fn name(&self) -> &str {
        "fake-ocr"
    }
}

/// What the extractor does for a given OCR text.
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(String),
    Fail(String),
    /// Never answers.
    Hang,
    Panic,
}

pub struct FakeExtractor {
    script: HashMap<String, Scripted>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl Default for FakeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            script: HashMap::new(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn respond(mut self, text: &str, response: &str) -> Self {
        self.script
            .insert(text.to_string(), Scripted::Respond(response.to_string()));
        self
    }

    pub fn fail(mut self, text: &str, reason: &str) -> Self {
        self.script
            .insert(text.to_string(), Scripted::Fail(reason.to_string()));
        self
    }

    pub fn hang(mut self, text: &str) -> Self {
        self.script.insert(text.to_string(), Scripted::Hang);
        self
    }

    pub fn panic(mut self, text: &str) -> Self {
        self.script.insert(text.to_string(), Scripted::Panic);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, text: &str, prompt: &str) -> Result<String, ProviderError> {
        assert!(!prompt.is_empty(), "extractor called without a prompt");
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match self.script.get(text.trim()) {
            Some(Scripted::Respond(response)) => Ok(response.clone()),
            Some(Scripted::Fail(reason)) => Err(ProviderError::Extraction(reason.clone())),
            Some(Scripted::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Some(Scripted::Panic) => panic!("offer table parser crashed on {:?}", text.trim()),
            None => Err(ProviderError::Extraction(format!(
                "no scripted response for {:?}",
                text.trim()
            ))),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "fake-extractor"
    }
}

/// Job store wrapper that can be told to fail specific writes.
pub struct FlakyJobStore {
    inner: Arc<dyn JobStore>,
    fail_on_complete: AtomicBool,
    fail_delete: AtomicBool,
    document_write_delay_ms: AtomicU64,
    document_writes: AtomicUsize,
}

impl FlakyJobStore {
    pub fn new(inner: Arc<dyn JobStore>) -> Self {
        Self {
            inner,
            fail_on_complete: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            document_write_delay_ms: AtomicU64::new(0),
            document_writes: AtomicUsize::new(0),
        }
    }

    /// Fails the write that stores the aggregated extract.
    pub fn fail_on_complete(&self) {
        self.fail_on_complete.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    /// Delays every update that carries the document list.
    pub fn slow_document_writes(&self, delay: Duration) {
        self.document_write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of updates that carried the document list.
    pub fn document_writes(&self) -> usize {
        self.document_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn create(&self, job: &Job) -> Result<(), PersistenceError> {
        self.inner.create(job).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, PersistenceError> {
        self.inner.get(job_id).await
    }

    async fn update_fields(
        &self,
        job_id: &str,
        update: &JobUpdate,
    ) -> Result<(), PersistenceError> {
        if update.extracted_data.is_some() && self.fail_on_complete.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("disk full".to_string()));
        }
        if update.documents.is_some() {
            self.document_writes.fetch_add(1, Ordering::SeqCst);
            let delay = self.document_write_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
        self.inner.update_fields(job_id, update).await
    }

    async fn delete(&self, job_id: &str) -> Result<(), PersistenceError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("read-only replica".to_string()));
        }
        self.inner.delete(job_id).await
    }

    async fn list(&self) -> Result<Vec<Job>, PersistenceError> {
        self.inner.list().await
    }
}

pub struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(&self, policy_type: &str, _extract: &PolicyExtract) -> Result<String, RenderError> {
        Err(RenderError::Failed {
            policy_type: policy_type.to_string(),
            reason: "template missing".to_string(),
        })
    }
}
