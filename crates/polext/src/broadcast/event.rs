//! Events streamed to observers of a job.

use serde::{Deserialize, Serialize};

use crate::model::PolicyExtract;

/// Pipeline stage reported by `in_progress` events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initializing,
    OcrStart,
    Analysis,
    Processing,
    Aggregating,
}

impl Stage {
    /// Default message shown for the stage.
    pub fn message(&self) -> &'static str {
        match self {
            Stage::Initializing => "Starting processing pipeline...",
            Stage::OcrStart => "Initiating document analysis...",
            Stage::Analysis => "Analyzing documents...",
            Stage::Processing => "Processing documents...",
            Stage::Aggregating => "Aggregating results...",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Initializing => write!(f, "initializing"),
            Stage::OcrStart => write!(f, "ocr_start"),
            Stage::Analysis => write!(f, "analysis"),
            Stage::Processing => write!(f, "processing"),
            Stage::Aggregating => write!(f, "aggregating"),
        }
    }
}

/// A lifecycle, progress or result event, tagged by `status` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineEvent {
    InProgress {
        stage: Stage,
        message: String,
        /// `"m/n"` for `processing` events.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        extracted_data: PolicyExtract,
        artifact: String,
    },
    Failed {
        error: String,
        /// Set when the failure cleanup removed the job record.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deleted: Option<bool>,
    },
}

impl PipelineEvent {
    pub fn stage(stage: Stage) -> Self {
        PipelineEvent::InProgress {
            stage,
            message: stage.message().to_string(),
            progress: None,
        }
    }

    /// Emitted after each successfully analyzed file.
    pub fn processed(done: usize, total: usize, file_name: &str) -> Self {
        PipelineEvent::InProgress {
            stage: Stage::Processing,
            message: format!("Analyzed {}/{}: {}", done, total, file_name),
            progress: Some(format!("{}/{}", done, total)),
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        PipelineEvent::Failed {
            error: error.to_string(),
            deleted: None,
        }
    }

    pub fn failed_and_deleted(error: impl ToString) -> Self {
        PipelineEvent::Failed {
            error: error.to_string(),
            deleted: Some(true),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineEvent::InProgress { .. })
    }
}
