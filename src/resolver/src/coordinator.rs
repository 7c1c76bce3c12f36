//! Backend merge coordinator
//!
//! Fetches every configured backend, merges the results in backend order
//! and publishes the new index with a single atomic swap.
//!
//! ```text
//! sources (backend order) ──fetch+timeout──▶ merge ──▶ IndexHandle::publish
//!                                              │
//!                                              └──▶ backend health / metrics
//! ```
//!
//! Failure policy:
//! - a backend that fails, times out or carries invalid data is skipped;
//! - if every backend fails on the first build, `initialize` returns an
//!   error and the caller must treat it as fatal;
//! - if every backend fails on a later rebuild, the previous index stays
//!   published and `reload` returns an error for alerting.

use crate::error::{MapperError, Result};
use crate::index::MappingIndex;
use crate::merge::{merge, BackendHealth, MergeContext, MergeReport};
use crate::metrics::ResolverMetrics;
use crate::resolver::IdentityResolver;
use crate::scrub::Scrubber;
use crate::snapshot::IndexHandle;
use crate::source::MappingSource;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use iamk_core::types::validate_backend_order;
use iamk_core::{AccountId, BackendKind, Config, CoreError, MappingSet};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default per-backend fetch deadline
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Partition auto-mapped callers must belong to
    pub partition_id: String,

    /// Mapping sets tagged for another cluster are rejected
    pub cluster_id: String,

    /// Backends in precedence order
    pub backend_order: Vec<BackendKind>,

    /// Deadline for a single backend fetch
    pub fetch_timeout: Duration,

    /// Accounts redacted in log output
    pub scrubbed_accounts: Vec<AccountId>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            partition_id: iamk_core::config::DEFAULT_PARTITION.to_string(),
            cluster_id: String::new(),
            backend_order: vec![BackendKind::MountedFile],
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            scrubbed_accounts: Vec::new(),
        }
    }
}

impl CoordinatorConfig {
    /// Derive coordinator settings from a loaded [`Config`]
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            partition_id: config.partition_id.clone(),
            cluster_id: config.cluster_id.clone(),
            backend_order: config.backend_order()?,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            scrubbed_accounts: config.scrubbed_aws_accounts.clone(),
        })
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Last known state of one backend
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub health: BackendHealth,
    pub last_attempt: DateTime<Utc>,
    pub last_success: Option<DateTime<Utc>>,
}

/// Why a rebuild was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTrigger {
    /// A watched backend reported a change
    BackendChanged(BackendKind),
    /// Periodic or operator-requested resync
    Resync,
}

pub struct MappingCoordinator {
    config: CoordinatorConfig,
    /// Sources in backend order
    sources: Vec<Arc<dyn MappingSource>>,
    index: Arc<IndexHandle>,
    health: DashMap<BackendKind, BackendStatus>,
    generation: AtomicU64,
    /// Serializes rebuilds; never taken on the resolve path
    build_lock: Mutex<()>,
    scrubber: Scrubber,
    metrics: Arc<ResolverMetrics>,
}

impl MappingCoordinator {
    /// Create a coordinator
    ///
    /// Every backend in the order needs exactly one source. Sources for
    /// backends outside the order are ignored.
    pub fn new(config: CoordinatorConfig, sources: Vec<Arc<dyn MappingSource>>) -> Result<Self> {
        validate_backend_order(&config.backend_order)?;
        if config.partition_id.trim().is_empty() {
            return Err(MapperError::Core(CoreError::Configuration(
                "partition ID cannot be empty".to_string(),
            )));
        }

        let mut ordered = Vec::with_capacity(config.backend_order.len());
        for backend in &config.backend_order {
            let mut matching = sources.iter().filter(|s| s.kind() == *backend);
            let source = matching.next().ok_or(MapperError::MissingSource(*backend))?;
            if matching.next().is_some() {
                return Err(MapperError::Core(CoreError::Configuration(format!(
                    "more than one source registered for backend {}",
                    backend
                ))));
            }
            ordered.push(Arc::clone(source));
        }

        for source in &sources {
            if !config.backend_order.contains(&source.kind()) {
                debug!("Ignoring source for backend {} (not in backend order)", source.kind());
            }
        }

        let scrubber = Scrubber::new(config.scrubbed_accounts.iter().cloned());

        Ok(Self {
            config,
            sources: ordered,
            index: Arc::new(IndexHandle::new()),
            health: DashMap::new(),
            generation: AtomicU64::new(0),
            build_lock: Mutex::new(()),
            scrubber,
            metrics: Arc::new(ResolverMetrics::new()),
        })
    }

    /// First build
    ///
    /// An error here means no index could ever be built and the process
    /// should not start serving.
    pub async fn initialize(&self) -> Result<MergeReport> {
        info!(
            "Building initial mapping index from backends [{}]",
            self.backend_names()
        );
        self.reload().await.map_err(|e| {
            if !self.index.is_ready() {
                error!("Initial mapping index build failed: {}", e);
            }
            e
        })
    }

    /// Rebuild with the configured fetch timeout
    pub async fn reload(&self) -> Result<MergeReport> {
        self.reload_with_timeout(self.config.fetch_timeout).await
    }

    /// Rebuild with a caller-supplied per-backend deadline
    pub async fn reload_with_timeout(&self, timeout: Duration) -> Result<MergeReport> {
        let _guard = self.build_lock.lock().await;
        let start = Instant::now();

        let fetched = self.fetch_all(timeout).await;
        let generation = self.generation.load(Ordering::SeqCst) + 1;
        let ctx = MergeContext {
            partition_id: &self.config.partition_id,
            cluster_id: &self.config.cluster_id,
            scrubber: &self.scrubber,
        };

        let (result, report) = merge(&ctx, fetched, generation);
        self.record_health(&report);

        match result {
            Ok(index) => {
                let rules = index.len();
                self.generation.store(generation, Ordering::SeqCst);
                self.index.publish(Arc::new(index));
                self.metrics.record_reload(report.conflicts.len());

                if report.is_degraded() {
                    warn!(
                        "Published mapping index generation {} ({} rules) without backends {:?}",
                        generation,
                        rules,
                        report.failed_backends()
                    );
                } else {
                    info!(
                        "Published mapping index generation {} ({} rules, {} conflicts) in {:?}",
                        generation,
                        rules,
                        report.conflicts.len(),
                        start.elapsed()
                    );
                }
                Ok(report)
            }
            Err(e) => {
                self.metrics.record_failed_reload();
                if self.index.is_ready() {
                    error!(
                        "Mapping index rebuild failed, still serving generation {}: {}",
                        self.index.generation(),
                        e
                    );
                }
                Err(e)
            }
        }
    }

    /// Fetch every source concurrently, results in backend order
    async fn fetch_all(&self, timeout: Duration) -> Vec<(BackendKind, Result<MappingSet>)> {
        let fetches = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                let backend = source.kind();
                let result = match tokio::time::timeout(timeout, source.fetch()).await {
                    Ok(result) => result,
                    Err(_) => Err(MapperError::BackendTimeout { backend, timeout }),
                };
                (backend, result)
            }
        });
        join_all(fetches).await
    }

    fn record_health(&self, report: &MergeReport) {
        for entry in &report.backends {
            let last_success = if entry.health.is_healthy() {
                Some(entry.checked_at)
            } else {
                self.health.get(&entry.backend).and_then(|s| s.last_success)
            };
            self.health.insert(
                entry.backend,
                BackendStatus {
                    health: entry.health.clone(),
                    last_attempt: entry.checked_at,
                    last_success,
                },
            );
        }
    }

    /// Rebuild on every trigger until the sender side is dropped
    ///
    /// Triggers that queue up while a rebuild runs are coalesced into one.
    pub fn spawn_reload_loop(self: Arc<Self>, mut triggers: mpsc::Receiver<ReloadTrigger>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(trigger) = triggers.recv().await {
                let mut coalesced = 0;
                while triggers.try_recv().is_ok() {
                    coalesced += 1;
                }
                debug!("Reload triggered by {:?} ({} coalesced)", trigger, coalesced);

                if let Err(e) = self.reload().await {
                    warn!("Triggered reload failed: {}", e);
                }
            }
            debug!("Reload trigger channel closed, stopping reload loop");
        })
    }

    /// Resolver reading this coordinator's published index
    pub fn resolver(&self) -> IdentityResolver {
        IdentityResolver::new(Arc::clone(&self.index), self.scrubber.clone(), Arc::clone(&self.metrics))
    }

    /// Current index snapshot
    pub fn snapshot(&self) -> Option<Arc<MappingIndex>> {
        self.index.load()
    }

    pub fn is_ready(&self) -> bool {
        self.index.is_ready()
    }

    /// Last known status of each backend, in backend order
    pub fn backend_status(&self) -> Vec<(BackendKind, Option<BackendStatus>)> {
        self.config
            .backend_order
            .iter()
            .map(|b| (*b, self.health.get(b).map(|s| s.clone())))
            .collect()
    }

    pub fn metrics(&self) -> &ResolverMetrics {
        &self.metrics
    }

    pub fn scrubber(&self) -> &Scrubber {
        &self.scrubber
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn backend_names(&self) -> String {
        self.config
            .backend_order
            .iter()
            .map(BackendKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
