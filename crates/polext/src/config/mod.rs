pub mod loader;
pub mod prompts;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use prompts::PromptRegistry;
pub use schema::{
    Config, ExtractionConfig, LoggingConfig, OcrServiceConfig, PipelineConfig, PromptConfig,
    StorageConfig,
};
