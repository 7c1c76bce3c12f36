//! Shared error types for mapping configuration
//!
//! Everything in here is detected while a configuration or a backend's
//! mapping set is being validated, never while a caller is being resolved.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for configuration and ARN handling
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// ARN could not be parsed
    #[error("Invalid ARN '{arn}': {reason}")]
    InvalidArn { arn: String, reason: String },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The same ARN appears twice in one mapping list
    #[error("Duplicate mapping for ARN: {0}")]
    DuplicateArn(String),

    /// Backend name not recognized
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Template references a parameter that does not exist
    #[error("Unknown template token '{{{{{token}}}}}' in '{template}'")]
    UnknownTemplateToken { template: String, token: String },

    /// Template syntax is broken (e.g. an unterminated `{{`)
    #[error("Malformed template '{template}': {reason}")]
    MalformedTemplate { template: String, reason: String },
}

impl CoreError {
    pub(crate) fn invalid_arn(arn: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArn {
            arn: arn.to_string(),
            reason: reason.into(),
        }
    }
}
