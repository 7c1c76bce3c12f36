//! Error types for the identity mapper

use iamk_core::{BackendKind, CoreError};
use std::time::Duration;
use thiserror::Error;

/// Identity mapper errors
///
/// These surface at build/reload time. Resolution itself never fails; it
/// reports a `Denied` or `Malformed` outcome instead.
#[derive(Debug, Error)]
pub enum MapperError {
    /// Invalid configuration or mapping data
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Template could not be rendered for this caller
    #[error("Unresolved template '{template}': {reason}")]
    UnresolvedTemplate { template: String, reason: String },

    /// Backend could not be read
    #[error("Backend {backend} unavailable: {reason}")]
    BackendUnavailable { backend: BackendKind, reason: String },

    /// Backend fetch exceeded its deadline
    #[error("Backend {backend} timed out after {timeout:?}")]
    BackendTimeout { backend: BackendKind, timeout: Duration },

    /// Backend order names a backend no source was registered for
    #[error("No source registered for backend {0}")]
    MissingSource(BackendKind),

    /// Every backend in the order failed
    #[error("All backends failed: {0}")]
    AllBackendsFailed(String),
}

impl MapperError {
    /// Configuration problems an operator has to fix
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Core(_) | Self::MissingSource(_) | Self::UnresolvedTemplate { .. })
    }
}

/// Result type for mapper operations
pub type Result<T> = std::result::Result<T, MapperError>;
