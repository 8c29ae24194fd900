pub mod aggregate;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod providers;
pub mod scheduler;
pub mod secrets;
pub mod store;
pub mod telemetry;

pub use aggregate::{aggregate, aggregate_documents};
pub use broadcast::{EventBroadcaster, PipelineEvent, Stage, Subscription};
pub use config::{load_config, Config, PipelineConfig, PromptRegistry};
pub use error::{
    ConfigError, ConfigurationError, DocumentError, JobError, MalformedResponseError,
    PersistenceError, PolextError, ProviderError, Result, SubmitError,
};
pub use model::{DocumentState, DocumentStatus, Job, JobStatus, JobSummary, Offer, PolicyExtract};
pub use pipeline::{Accepted, Collaborators, Orchestrator, UploadFile};
pub use scheduler::BoundedScheduler;
pub use secrets::{SecretError, SecretSource};
pub use store::{InMemoryJobStore, JobStore, SqliteJobStore};
pub use telemetry::init_logging;
