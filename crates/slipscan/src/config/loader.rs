use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

static LANGUAGE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{3}(?:_[a-z]+)?$").unwrap());

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

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.queue_depth == 0 {
        return Err(ConfigError::Validation {
            message: "queue_depth must be at least 1".to_string(),
        });
    }

    if config.rasterizer.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "rasterizer.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.upload_directory == config.scratch_directory {
        return Err(ConfigError::Validation {
            message: "upload_directory and scratch_directory must differ".to_string(),
        });
    }

    for lang in &config.ocr.languages {
        if !LANGUAGE_CODE.is_match(lang) {
            return Err(ConfigError::Validation {
                message: format!("Invalid OCR language code: '{}'", lang),
            });
        }
    }

    Ok(())
}
