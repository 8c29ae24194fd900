use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolextError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Submission rejected: {0}")]
    Submit(#[from] SubmitError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Errors raised while loading the `polext.json` configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to read prompt template '{path}': {source}")]
    ReadPrompt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret resolution failed: {0}")]
    Secret(String),
}

/// The policy type of a job has no prompt template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid policy type: {policy_type}")]
pub struct ConfigurationError {
    pub policy_type: String,
}

/// OCR, extraction or transport failure from an external provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("OCR job {job_id} failed")]
    OcrJobFailed { job_id: String },

    #[error("OCR request failed: {0}")]
    Ocr(String),

    #[error("Extraction request failed: {0}")]
    Extraction(String),

    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned {status}: {body}")]
    BadStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },
}

/// Model output from which no JSON object could be recovered.
#[derive(Error, Debug)]
#[error("Failed to parse model response: {reason}. Cleaned: {cleaned:?}. Raw: {raw:?}")]
pub struct MalformedResponseError {
    pub reason: String,
    pub raw: String,
    pub cleaned: String,
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    #[error("Job store lock poisoned")]
    LockPoisoned,

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Corrupt job record {job_id}: {reason}")]
    Corrupt { job_id: String, reason: String },

    #[error("Job store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Corrupt {
            job_id: String::new(),
            reason: err.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Failed to write blob '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete blob '{key}': {source}")]
    Delete {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    #[error("Blob store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to render {policy_type} artifact: {reason}")]
    Failed { policy_type: String, reason: String },
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("No files uploaded.")]
    NoFiles,

    #[error("Upload of '{name}' failed: {source}")]
    Upload {
        name: String,
        #[source]
        source: BlobError,
    },

    #[error("Failed to create job: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Per-document failure recorded on `DocumentState::error`. Never aborts the batch.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    MalformedResponse(#[from] MalformedResponseError),

    #[error("Extraction did not match the expected structure: {0}")]
    InvalidExtract(String),

    #[error("Document processing timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Job-level failure. Every variant ends the job.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Failed to extract data from any document.")]
    AllDocumentsFailed,

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Job processing panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, PolextError>;
