pub mod extract;
pub mod job;

pub use extract::{ClientData, DocumentExtract, Offer, PolicyExtract, RawOffer};
pub use job::{
    generate_job_id, DocumentState, DocumentStatus, Job, JobStatus, JobSummary, JobUpdate,
    UnknownStatus,
};
