//! # IAMK Core
//!
//! Shared data model for the IAM identity mapper: ARNs, mapping rules,
//! templates and the validated configuration handed over by loaders.

pub mod arn;
pub mod config;
pub mod error;
pub mod template;
pub mod types;

// Re-export commonly used types
pub use arn::{Arn, ResourceKind};
pub use config::Config;
pub use error::{CoreError, Result};
pub use template::{Segment, Template, TemplateToken};
pub use types::{
    AccountId, BackendKind, IdentityMapping, MappingSet, PrincipalKind, RoleMapping, UserMapping,
};
