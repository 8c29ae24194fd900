//! External collaborators of the pipeline.
//!
//! Each capability is a trait so tests and deployments can plug in their own
//! implementations:
//! - [`BlobStore`]: raw uploaded files
//! - [`OcrProvider`]: asynchronous, paginated text detection
//! - [`Extractor`]: LLM structuring of OCR text
//! - [`Renderer`]: presentation of the aggregated result

use async_trait::async_trait;

use crate::error::{BlobError, ProviderError, RenderError};
use crate::model::PolicyExtract;

pub mod blob;
pub mod extractor;
pub mod ocr;
pub mod render;

pub use blob::{generate_blob_key, FilesystemBlobStore, InMemoryBlobStore};
pub use extractor::ChatExtractor;
pub use ocr::{HttpOcrProvider, OcrPoller};
pub use render::JsonRenderer;

/// Stores raw uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` and returns the key to reference them by.
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, BlobError>;

    /// Removes a stored file. Deleting an unknown key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// State of an OCR job as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrStatus {
    InProgress,
    Succeeded,
    Failed,
}

/// One page of OCR results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrPage {
    pub status: OcrStatus,
    /// Detected text lines, in reading order. Empty unless `Succeeded`.
    pub lines: Vec<String>,
    /// Token for the next page, if any.
    pub next_token: Option<String>,
}

#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Starts text detection on a stored file and returns the OCR job id.
    async fn start_job(&self, blob_key: &str) -> Result<String, ProviderError>;

    /// Fetches the status and, once finished, one page of results.
    async fn get_page(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<OcrPage, ProviderError>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Runs `prompt` over the document text and returns the raw model output.
    async fn extract(&self, text: &str, prompt: &str) -> Result<String, ProviderError>;

    fn name(&self) -> &str;
}

pub trait Renderer: Send + Sync {
    fn render(&self, policy_type: &str, extract: &PolicyExtract) -> Result<String, RenderError>;
}
