use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Validation { message }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    let pipeline = &config.pipeline;
    if pipeline.ocr_start_concurrency == 0 || pipeline.analyze_concurrency == 0 {
        return Err(invalid("Concurrency ceilings must be at least 1".to_string()));
    }
    if pipeline.poll_interval_ms == 0 {
        return Err(invalid("poll_interval_ms must be at least 1".to_string()));
    }
    if pipeline.document_timeout_secs == 0 {
        return Err(invalid("document_timeout_secs must be at least 1".to_string()));
    }
    if pipeline.persist_every == 0 {
        return Err(invalid("persist_every must be at least 1".to_string()));
    }
    if pipeline.default_policy_type.trim().is_empty() {
        return Err(invalid("default_policy_type must not be empty".to_string()));
    }

    for (name, url) in [
        ("ocr.base_url", &config.ocr.base_url),
        ("extraction.base_url", &config.extraction.base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(format!("{} must be an http(s) URL: {}", name, url)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
    {
        "version": "1.0",
        "ocr": {"base_url": "http://localhost:9000"},
        "extraction": {"base_url": "http://localhost:8080/v1", "model": "gpt-oss-20b"}
    }
    "#;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.pipeline.analyze_concurrency, 5);
        assert_eq!(config.extraction.model, "gpt-oss-20b");
        assert_eq!(config.logging.level, "info");
        assert!(config.prompts.directory.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "pipeline": {
                "ocr_start_concurrency": 4,
                "analyze_concurrency": 2,
                "poll_interval_ms": 500,
                "document_timeout_secs": 120,
                "persist_every": 1,
                "default_policy_type": "rca"
            },
            "prompts": {"directory": "/etc/polext/prompts"},
            "ocr": {"base_url": "https://ocr.internal", "api_key_env_var": "OCR_KEY"},
            "extraction": {
                "base_url": "https://llm.internal/v1",
                "model": "m",
                "max_tokens": 2000,
                "temperature": 0.2,
                "api_key_file": "/run/secrets/llm"
            },
            "storage": {"database_path": "/tmp/p.db", "blob_directory": "/tmp/blobs"},
            "logging": {"level": "debug", "json": true}
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.pipeline.ocr_start_concurrency, 4);
        assert_eq!(config.pipeline.default_policy_type, "rca");
        assert_eq!(config.prompts.directory.as_deref(), Some("/etc/polext/prompts"));
        assert_eq!(
            config.ocr.credentials.api_key_env_var.as_deref(),
            Some("OCR_KEY")
        );
        assert_eq!(config.extraction.max_tokens, 2000);
        assert!(config.logging.json);
    }

    #[test]
    fn test_invalid_version() {
        let config_json = MINIMAL.replace("\"1.0\"", "\"2.0\"");
        assert!(load_config_from_str(&config_json).is_err());
    }

    #[test]
    fn test_schema_rejects_zero_concurrency() {
        let config_json = r#"
        {
            "version": "1.0",
            "pipeline": {"analyze_concurrency": 0},
            "ocr": {"base_url": "http://ocr"},
            "extraction": {"base_url": "http://llm", "model": "m"}
        }
        "#;
        let result = load_config_from_str(config_json);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_unknown_keys() {
        let config_json = r#"
        {
            "version": "1.0",
            "workers": 3,
            "ocr": {"base_url": "http://ocr"},
            "extraction": {"base_url": "http://llm", "model": "m"}
        }
        "#;
        assert!(matches!(
            load_config_from_str(config_json),
            Err(ConfigError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_missing_extraction_section() {
        let config_json = r#"{"version": "1.0", "ocr": {"base_url": "http://ocr"}}"#;
        assert!(load_config_from_str(config_json).is_err());
    }

    #[test]
    fn test_non_http_base_url() {
        let config_json = MINIMAL.replace("http://localhost:9000", "ftp://ocr");
        assert!(matches!(
            load_config_from_str(&config_json),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polext.json");
        std::fs::write(&path, MINIMAL).unwrap();
        assert!(load_config(&path).is_ok());

        let missing = load_config(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::ReadFile { .. })));
    }
}
