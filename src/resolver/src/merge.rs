//! Merge of per-backend mapping sets into one index
//!
//! The merge is an ordered reduction: backends are folded in `backend_order`,
//! rules within a backend in declaration order. A backend that failed to
//! fetch, targets another cluster, or carries invalid data contributes
//! nothing; the rest are still merged.

use crate::error::{MapperError, Result};
use crate::index::{IndexBuilder, MappingConflict, MappingIndex};
use crate::scrub::Scrubber;
use chrono::{DateTime, Utc};
use iamk_core::{BackendKind, MappingSet};
use serde::Serialize;
use tracing::{debug, warn};

/// Health of one backend in one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendHealth {
    Healthy { mappings: usize },
    Failed { reason: String },
}

impl BackendHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

/// Per-backend entry of a [`MergeReport`]
#[derive(Debug, Clone, Serialize)]
pub struct BackendReport {
    pub backend: BackendKind,
    pub health: BackendHealth,
    pub checked_at: DateTime<Utc>,
}

/// Outcome of one merge
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub generation: u64,
    pub backends: Vec<BackendReport>,
    pub conflicts: Vec<MappingConflict>,
}

impl MergeReport {
    pub fn healthy_backends(&self) -> usize {
        self.backends.iter().filter(|b| b.health.is_healthy()).count()
    }

    pub fn failed_backends(&self) -> Vec<BackendKind> {
        self.backends
            .iter()
            .filter(|b| !b.health.is_healthy())
            .map(|b| b.backend)
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.healthy_backends() < self.backends.len()
    }
}

/// Merge inputs common to every build
#[derive(Debug, Clone)]
pub struct MergeContext<'a> {
    pub partition_id: &'a str,
    pub cluster_id: &'a str,
    pub scrubber: &'a Scrubber,
}

/// Merge fetched mapping sets into a new index
///
/// `fetched` must already be in backend order. The report is produced even
/// when the merge fails; the index is an error only when no backend
/// contributed, in which case the caller keeps its previous index.
pub fn merge(
    ctx: &MergeContext<'_>,
    fetched: Vec<(BackendKind, Result<MappingSet>)>,
    generation: u64,
) -> (Result<MappingIndex>, MergeReport) {
    let mut builder = IndexBuilder::new(ctx.partition_id);
    let mut backends = Vec::with_capacity(fetched.len());
    let mut conflicts = Vec::new();

    for (backend, result) in fetched {
        let checked_at = Utc::now();
        let health = match result.and_then(|set| accept(ctx, backend, set)) {
            Ok(set) => {
                let mappings = set.len();
                for mapping in set.identity_mappings() {
                    // `accept` already rejected duplicates and bad rules; an
                    // insert error left here only skips that one rule
                    match builder.insert(mapping, backend) {
                        Ok(Some(conflict)) => {
                            warn!(
                                "Mapping conflict for {} {}: keeping {}, ignoring {}",
                                conflict.kind,
                                ctx.scrubber.display(&conflict.arn),
                                conflict.kept,
                                conflict.dropped
                            );
                            conflicts.push(conflict);
                        }
                        Ok(None) => {}
                        Err(e) => warn!(
                            "Backend {} rule rejected: {}",
                            backend,
                            ctx.scrubber.scrub_text(&e.to_string())
                        ),
                    }
                }
                for account in &set.auto_mapped_accounts {
                    if let Err(e) = builder.add_auto_mapped_account(account) {
                        warn!(
                            "Backend {} auto-mapped account rejected: {}",
                            backend,
                            ctx.scrubber.scrub_text(&e.to_string())
                        );
                    }
                }
                debug!("Backend {} contributed {} mappings", backend, mappings);
                BackendHealth::Healthy { mappings }
            }
            Err(e) => {
                let reason = ctx.scrubber.scrub_text(&e.to_string());
                warn!("Backend {} excluded from build: {}", backend, reason);
                BackendHealth::Failed { reason }
            }
        };

        backends.push(BackendReport {
            backend,
            health,
            checked_at,
        });
    }

    let report = MergeReport {
        generation,
        backends,
        conflicts,
    };

    if report.healthy_backends() == 0 {
        let summary = report
            .backends
            .iter()
            .map(|b| match &b.health {
                BackendHealth::Failed { reason } => format!("{}: {}", b.backend, reason),
                BackendHealth::Healthy { .. } => b.backend.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ");
        let summary = if summary.is_empty() {
            "no backends configured".to_string()
        } else {
            summary
        };
        return (Err(MapperError::AllBackendsFailed(summary)), report);
    }

    (Ok(builder.build(generation)), report)
}

/// Check one backend's set before any of it reaches the index
fn accept(ctx: &MergeContext<'_>, backend: BackendKind, set: MappingSet) -> Result<MappingSet> {
    if let Some(cluster_id) = &set.cluster_id {
        if cluster_id != ctx.cluster_id {
            return Err(MapperError::BackendUnavailable {
                backend,
                reason: format!(
                    "mappings are for cluster '{}', this cluster is '{}'",
                    cluster_id, ctx.cluster_id
                ),
            });
        }
    }
    set.validate()?;
    Ok(set)
}
