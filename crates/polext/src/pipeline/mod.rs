//! Job processing pipeline.
//!
//! A job moves `not_started -> in_progress -> complete | failed`:
//!
//! 1. OCR is started for every document (bounded fan-out).
//! 2. Each started document is polled to completion and extracted
//!    (second, independent bounded fan-out, with a per-document deadline).
//! 3. Analyzed documents are aggregated into one `PolicyExtract`.
//!
//! Per-document failures are recorded on the document. Persistence and
//! render failures discard the job and its uploads.

mod cleanup;
pub mod orchestrator;
mod stages;
pub mod supervisor;

pub use orchestrator::{Accepted, Collaborators, Orchestrator, UploadFile};
pub use supervisor::Supervisor;
