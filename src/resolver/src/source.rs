//! Backend mapping sources
//!
//! Each configuration backend is an external collaborator that produces a
//! [`MappingSet`] on demand. Parsing a file, watching a config object or
//! listing custom resources all happen behind this trait.

use crate::error::{MapperError, Result};
use async_trait::async_trait;
use iamk_core::{BackendKind, Config, MappingSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Producer of one backend's mappings
#[async_trait]
pub trait MappingSource: Send + Sync {
    /// Backend this source serves
    fn kind(&self) -> BackendKind;

    /// Fetch the backend's current mappings
    async fn fetch(&self) -> Result<MappingSet>;
}

#[derive(Debug, Clone)]
enum SourceState {
    Ready(MappingSet),
    Failing(String),
}

/// In-memory mapping source
///
/// Embedders push updates into it from their own watchers; tests use it to
/// simulate healthy and failing backends.
pub struct InMemoryMappingSource {
    kind: BackendKind,
    state: Arc<RwLock<SourceState>>,
}

impl InMemoryMappingSource {
    pub fn new(kind: BackendKind, mappings: MappingSet) -> Self {
        Self {
            kind,
            state: Arc::new(RwLock::new(SourceState::Ready(mappings))),
        }
    }

    /// Replace the served mappings
    pub async fn set(&self, mappings: MappingSet) {
        *self.state.write().await = SourceState::Ready(mappings);
    }

    /// Make every following fetch fail with `reason`
    pub async fn fail(&self, reason: impl Into<String>) {
        *self.state.write().await = SourceState::Failing(reason.into());
    }
}

#[async_trait]
impl MappingSource for InMemoryMappingSource {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn fetch(&self) -> Result<MappingSet> {
        match &*self.state.read().await {
            SourceState::Ready(mappings) => Ok(mappings.clone()),
            SourceState::Failing(reason) => Err(MapperError::BackendUnavailable {
                backend: self.kind,
                reason: reason.clone(),
            }),
        }
    }
}

/// Serves the mappings embedded in an already loaded [`Config`]
///
/// This is the shape of the mounted-file backend: the loader parsed the
/// file, the mappings come straight out of it.
pub struct ConfigMappingSource {
    kind: BackendKind,
    mappings: MappingSet,
}

impl ConfigMappingSource {
    pub fn new(config: &Config) -> Self {
        Self::with_kind(BackendKind::MountedFile, config)
    }

    pub fn with_kind(kind: BackendKind, config: &Config) -> Self {
        Self {
            kind,
            mappings: config.mapping_set(),
        }
    }
}

#[async_trait]
impl MappingSource for ConfigMappingSource {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn fetch(&self) -> Result<MappingSet> {
        Ok(self.mappings.clone())
    }
}
