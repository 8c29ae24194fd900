use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secrets::SecretSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
    pub ocr: OcrServiceConfig,
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Concurrency, polling and persistence settings of the job pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ceiling for concurrent OCR job starts.
    #[serde(default = "default_ocr_start_concurrency")]
    pub ocr_start_concurrency: usize,
    /// Ceiling for concurrent poll + extract units.
    #[serde(default = "default_analyze_concurrency")]
    pub analyze_concurrency: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Deadline for one document's poll + extract unit.
    #[serde(default = "default_document_timeout_secs")]
    pub document_timeout_secs: u64,
    /// Documents are persisted after every Nth successful file.
    #[serde(default = "default_persist_every")]
    pub persist_every: usize,
    #[serde(default = "default_policy_type")]
    pub default_policy_type: String,
}

fn default_ocr_start_concurrency() -> usize {
    10
}

fn default_analyze_concurrency() -> usize {
    5
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_document_timeout_secs() -> u64 {
    600
}

fn default_persist_every() -> usize {
    3
}

fn default_policy_type() -> String {
    "casco".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_start_concurrency: default_ocr_start_concurrency(),
            analyze_concurrency: default_analyze_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            document_timeout_secs: default_document_timeout_secs(),
            persist_every: default_persist_every(),
            default_policy_type: default_policy_type(),
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Directory of `<policy_type>.txt` templates. Entries override the
    /// built-in templates of the same name.
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrServiceConfig {
    pub base_url: String,
    #[serde(flatten)]
    pub credentials: SecretSource,
}

/// OpenAI-compatible chat completions endpoint used for extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(flatten)]
    pub credentials: SecretSource,
}

fn default_max_tokens() -> u32 {
    4000
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Defaults to `~/.polext/data/polext.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Defaults to `~/.polext/blobs`.
    #[serde(default)]
    pub blob_directory: Option<String>,
}

impl StorageConfig {
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }

    pub fn blob_directory(&self) -> Option<PathBuf> {
        match &self.blob_directory {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::home_dir().map(|h| h.join(".polext").join("blobs")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
