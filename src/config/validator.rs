use thiserror::Error;

use crate::config::{CompilerSettings, FetchSettings, Settings};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_compiler(&settings.compiler) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_fetch(&settings.fetch) {
            errors.extend(e);
        }

        if settings.log.level.trim().is_empty() {
            errors.push(ValidationError::MissingField("log.level".to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_compiler(compiler: &CompilerSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if compiler.select_threshold == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "compiler.select_threshold".to_string(),
                reason: "Threshold must be greater than 0".to_string(),
            });
        }

        if compiler.max_depth == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "compiler.max_depth".to_string(),
                reason: "Depth must be greater than 0".to_string(),
            });
        }

        if compiler.reserved_prefix.is_empty() {
            errors.push(ValidationError::MissingField(
                "compiler.reserved_prefix".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_fetch(fetch: &FetchSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if fetch.enabled && fetch.timeout_seconds == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "fetch.timeout_seconds".to_string(),
                reason: "Timeout must be greater than 0 when fetching is enabled".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
