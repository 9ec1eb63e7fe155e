//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0)
//! - Check TLS paths are present when TLS is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - File existence is checked when TLS material is loaded, not here

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.max_connections == 0 {
        errors.push(ValidationError {
            field: "max_connections",
            message: "must be greater than zero".into(),
        });
    }
    if config.max_body_bytes == 0 {
        errors.push(ValidationError {
            field: "max_body_bytes",
            message: "must be greater than zero".into(),
        });
    }
    if let Some(tls) = &config.tls {
        if tls.cert_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "tls.cert_path",
                message: "must not be empty".into(),
            });
        }
        if tls.key_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "tls.key_path",
                message: "must not be empty".into(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
