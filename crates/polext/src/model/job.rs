//! Job and per-document records persisted in the job store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extract::{DocumentExtract, PolicyExtract};

/// Generates a new opaque job identifier (32 lowercase hex characters).
pub fn generate_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Lifecycle of a job. `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    NotStarted,
    InProgress,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::NotStarted => "not_started",
            JobStatus::InProgress => "in_progress",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Label shown on the policy dashboard.
    pub fn display_label(&self) -> &'static str {
        match self {
            JobStatus::NotStarted => "Not Started",
            JobStatus::InProgress => "In Progress",
            JobStatus::Complete => "Complete",
            JobStatus::Failed => "Incomplete",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a status string that is not part of the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(JobStatus::NotStarted),
            "in_progress" => Ok(JobStatus::InProgress),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Lifecycle of one uploaded file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    OcrStarted,
    Analyzed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::OcrStarted => "ocr_started",
            DocumentStatus::Analyzed => "analyzed",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a single file through OCR and extraction.
///
/// The transition methods keep `data` set exactly when the status is
/// `Analyzed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    /// Blob store key.
    pub key: String,
    pub original_name: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub ocr_job_id: Option<String>,
    #[serde(default)]
    pub data: Option<DocumentExtract>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DocumentState {
    pub fn pending(key: &str, original_name: &str) -> Self {
        Self {
            key: key.to_string(),
            original_name: original_name.to_string(),
            status: DocumentStatus::Pending,
            ocr_job_id: None,
            data: None,
            error: None,
        }
    }

    pub fn mark_ocr_started(&mut self, ocr_job_id: String) {
        self.ocr_job_id = Some(ocr_job_id);
        self.status = DocumentStatus::OcrStarted;
        self.error = None;
    }

    pub fn mark_analyzed(&mut self, data: DocumentExtract) {
        self.data = Some(data);
        self.status = DocumentStatus::Analyzed;
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl fmt::Display) {
        self.data = None;
        self.status = DocumentStatus::Failed;
        self.error = Some(error.to_string());
    }

    pub fn is_failed(&self) -> bool {
        self.status == DocumentStatus::Failed
    }

    /// Returns the extraction if this document was analyzed.
    pub fn analyzed_data(&self) -> Option<&DocumentExtract> {
        match self.status {
            DocumentStatus::Analyzed => self.data.as_ref(),
            _ => None,
        }
    }
}

/// One processing request spanning one or more uploaded documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub policy_type: String,
    pub status: JobStatus,
    #[serde(default)]
    pub documents: Vec<DocumentState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<PolicyExtract>,
    /// Rendered presentation of `extracted_data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_id: &str, policy_type: &str, documents: Vec<DocumentState>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.to_string(),
            policy_type: policy_type.to_string(),
            status: JobStatus::NotStarted,
            documents,
            extracted_data: None,
            artifact: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Partial update of a job record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub documents: Option<Vec<DocumentState>>,
    pub extracted_data: Option<PolicyExtract>,
    pub artifact: Option<String>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn with_documents(mut self, documents: &[DocumentState]) -> Self {
        self.documents = Some(documents.to_vec());
        self
    }

    pub fn with_extracted_data(mut self, extract: PolicyExtract) -> Self {
        self.extracted_data = Some(extract);
        self
    }

    pub fn with_artifact(mut self, artifact: String) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Applies the set fields to `job` and advances `updated_at`.
    pub fn apply_to(&self, job: &mut Job, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(ref documents) = self.documents {
            job.documents = documents.clone();
        }
        if let Some(ref extract) = self.extracted_data {
            job.extracted_data = Some(extract.clone());
        }
        if let Some(ref artifact) = self.artifact {
            job.artifact = Some(artifact.clone());
        }
        if let Some(ref error) = self.error {
            job.error = Some(error.clone());
        }
        job.updated_at = now.max(job.updated_at);
    }
}

/// Row shown on the policy dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: String,
    pub status: String,
    pub policy_type: String,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub phone: String,
    pub amount: String,
    pub object: String,
}

impl JobSummary {
    pub fn from_job(job: &Job) -> Self {
        let client = job.extracted_data.as_ref().map(|e| &e.client_data);
        let field = |value: Option<&String>| {
            value
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| "N/A".to_string())
        };

        let amount = job
            .extracted_data
            .as_ref()
            .and_then(|e| e.offers_with_franchise.first())
            .map(|offer| offer.rate1.clone())
            .unwrap_or_else(|| "0 €".to_string());

        Self {
            job_id: job.job_id.clone(),
            status: job.status.display_label().to_string(),
            policy_type: job.policy_type.to_uppercase(),
            created_at: job.created_at,
            name: field(client.and_then(|c| c.name.as_ref())),
            phone: field(client.and_then(|c| c.phone.as_ref())),
            amount,
            object: field(client.and_then(|c| c.object.as_ref())),
        }
    }
}
