//! Prompt templates per policy type.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::schema::PromptConfig;
use crate::error::{ConfigError, ConfigurationError};

const CASCO_PROMPT: &str = include_str!("../../prompts/casco.txt");

/// Maps a policy type to its extraction prompt.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    templates: BTreeMap<String, Arc<str>>,
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptRegistry {
    /// Registry with no templates at all.
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    /// Registry holding the templates shipped with the crate.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("casco", CASCO_PROMPT);
        registry
    }

    /// Built-in templates plus those from the configured directory.
    pub fn from_config(config: &PromptConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::builtin();
        if let Some(dir) = &config.directory {
            registry.load_dir(Path::new(dir))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, policy_type: &str, template: &str) {
        self.templates
            .insert(policy_type.to_string(), Arc::from(template));
    }

    /// Loads every `<policy_type>.txt` file in `dir`, replacing templates
    /// with the same name. Returns the number of templates loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ConfigError> {
        let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::ReadPrompt {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut loaded = 0;
        for entry in entries {
            let path = entry
                .map_err(|e| ConfigError::ReadPrompt {
                    path: dir.to_path_buf(),
                    source: e,
                })?
                .path();

            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(policy_type) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let template = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadPrompt {
                path: path.clone(),
                source: e,
            })?;
            log::debug!("Loaded prompt for policy type '{}'", policy_type);
            self.register(policy_type, &template);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Returns the template for `policy_type`.
    pub fn resolve(&self, policy_type: &str) -> Result<Arc<str>, ConfigurationError> {
        self.templates
            .get(policy_type)
            .cloned()
            .ok_or_else(|| ConfigurationError {
                policy_type: policy_type.to_string(),
            })
    }

    pub fn policy_types(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_casco() {
        let registry = PromptRegistry::builtin();
        let prompt = registry.resolve("casco").unwrap();
        assert!(prompt.contains("offersWithoutFranchise"));
        assert!(prompt.contains("franchiseTotal"));
        assert_eq!(registry.policy_types(), vec!["casco"]);
    }

    #[test]
    fn test_unknown_policy_type() {
        let err = PromptRegistry::builtin().resolve("life").unwrap_err();
        assert_eq!(err.to_string(), "Invalid policy type: life");
    }

    #[test]
    fn test_directory_overrides_and_adds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("casco.txt"), "custom casco").unwrap();
        std::fs::write(dir.path().join("rca.txt"), "rca prompt").unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let config = PromptConfig {
            directory: Some(dir.path().to_string_lossy().into_owned()),
        };
        let registry = PromptRegistry::from_config(&config).unwrap();

        assert_eq!(&*registry.resolve("casco").unwrap(), "custom casco");
        assert_eq!(&*registry.resolve("rca").unwrap(), "rca prompt");
        assert_eq!(registry.policy_types(), vec!["casco", "rca"]);
    }

    #[test]
    fn test_missing_directory() {
        let config = PromptConfig {
            directory: Some("/nonexistent/polext/prompts".to_string()),
        };
        assert!(matches!(
            PromptRegistry::from_config(&config),
            Err(ConfigError::ReadPrompt { .. })
        ));
    }

    #[test]
    fn test_empty_registry() {
        assert!(PromptRegistry::empty().resolve("casco").is_err());
    }
}
