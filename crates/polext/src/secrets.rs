//! API key resolution for the OCR and extraction providers.
//!
//! A key can be given three ways, checked in this order:
//!
//! 1. **Direct value** - `"api_key": "sk-..."`, for local testing
//! 2. **File** - `"api_key_file": "/run/secrets/llm_key"`, for mounted secrets
//! 3. **Environment variable** - `"api_key_env_var": "POLEXT_LLM_KEY"`

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: api_key, api_key_file, api_key_env_var)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Where to find a provider API key. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env_var: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl SecretSource {
    pub fn from_env_var(name: &str) -> Self {
        Self {
            api_key_env_var: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        non_empty(&self.api_key).is_some()
            || non_empty(&self.api_key_file).is_some()
            || non_empty(&self.api_key_env_var).is_some()
    }

    /// Resolves the key from the first configured source.
    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        if let Some(value) = non_empty(&self.api_key) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = non_empty(&self.api_key_file) {
            let path = expand_home(path);
            return std::fs::read_to_string(&path)
                .map(|content| SecretString::from(content.trim().to_string()))
                .map_err(|e| SecretError::FileRead { path, source: e });
        }

        if let Some(name) = non_empty(&self.api_key_env_var) {
            return match std::env::var(name) {
                // Env files often leave a trailing newline.
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }

    /// Like [`resolve`](Self::resolve), but an unconfigured source yields `None`.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>, SecretError> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Expands a leading `~` or `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}
