//! # IAMK Identity Resolver
//!
//! Maps verified AWS IAM callers onto Kubernetes identities.
//!
//! ## Features
//!
//! - **Path-insensitive ARN matching** with exact paths taking precedence
//! - **Username and group templates** (`{{AccountID}}`, `{{SessionName}}`)
//! - **Multi-backend merge** in a configured order, tolerating backend failures
//! - **Lock-free reads** of an atomically published mapping index
//! - **Account scrubbing** for log output
//!
//! ## Example
//!
//! ```rust
//! use iamk_core::{BackendKind, MappingSet, RoleMapping};
//! use iamk_resolver::{
//!     CoordinatorConfig, InMemoryMappingSource, MappingCoordinator, MappingSource, Outcome,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mappings = MappingSet::new().with_role(RoleMapping::new(
//!         "arn:aws:iam::123456789012:role/KubernetesAdmin",
//!         "admin:{{SessionName}}",
//!         vec!["system:masters".to_string()],
//!     ));
//!     let source: Arc<dyn MappingSource> =
//!         Arc::new(InMemoryMappingSource::new(BackendKind::MountedFile, mappings));
//!
//!     let coordinator = MappingCoordinator::new(CoordinatorConfig::default(), vec![source])?;
//!     coordinator.initialize().await?;
//!
//!     let resolution = coordinator.resolver().resolve(
//!         "arn:aws:sts::123456789012:assumed-role/KubernetesAdmin/alice",
//!         "123456789012",
//!         "alice",
//!     );
//!     assert_eq!(resolution.outcome, Outcome::Allowed);
//!     assert_eq!(resolution.identity.unwrap().username, "admin:alice");
//!
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod error;
pub mod expander;
pub mod index;
pub mod matcher;
pub mod merge;
pub mod metrics;
pub mod resolution;
pub mod resolver;
pub mod scrub;
pub mod snapshot;
pub mod source;

// Re-export commonly used types
pub use coordinator::{BackendStatus, CoordinatorConfig, MappingCoordinator, ReloadTrigger};
pub use error::{MapperError, Result};
pub use index::{IndexBuilder, MappingConflict, MappingIndex};
pub use matcher::{match_arn, MatchFields, MatchOutcome, Precision};
pub use merge::{BackendHealth, MergeReport};
pub use metrics::{MetricsSnapshot, ResolverMetrics};
pub use resolution::{Identity, MatchedRule, Outcome, Resolution};
pub use resolver::{resolve_with_index, IdentityResolver};
pub use scrub::{scrub, Scrubber};
pub use snapshot::IndexHandle;
pub use source::{ConfigMappingSource, InMemoryMappingSource, MappingSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
