//! Identity resolver
//!
//! Public entry point: turns a verified caller (ARN, account, session name)
//! into a platform identity. Resolution is a pure in-memory computation
//! over one index snapshot and always yields an [`Outcome`]; anything that
//! goes wrong fails closed.
//!
//! # Example
//!
//! ```rust
//! use iamk_core::{BackendKind, MappingSet, RoleMapping};
//! use iamk_resolver::index::IndexBuilder;
//! use iamk_resolver::resolver::resolve_with_index;
//! use iamk_resolver::Outcome;
//!
//! let set = MappingSet::new().with_role(RoleMapping::new(
//!     "arn:aws:iam::123456789012:role/Bastion",
//!     "{{SessionName}}@bastion",
//!     vec!["system:masters".to_string()],
//! ));
//!
//! let mut builder = IndexBuilder::new("aws");
//! for mapping in set.identity_mappings() {
//!     builder.insert(mapping, BackendKind::MountedFile).unwrap();
//! }
//! let index = builder.build(1);
//!
//! let resolution = resolve_with_index(
//!     &index,
//!     "arn:aws:iam::123456789012:role/Bastion",
//!     "123456789012",
//!     "i-0abc",
//! );
//! assert_eq!(resolution.outcome, Outcome::Allowed);
//! assert_eq!(resolution.identity.unwrap().username, "i-0abc@bastion");
//! ```

use crate::expander::expand_identity;
use crate::index::{MappingIndex, ResolvedMapping};
use crate::matcher::MatchFields;
use crate::metrics::ResolverMetrics;
use crate::resolution::{Identity, MatchedRule, Outcome, Resolution};
use crate::scrub::Scrubber;
use crate::snapshot::IndexHandle;
use iamk_core::{Arn, PrincipalKind};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolve a caller against one index snapshot
///
/// The verified triple is trusted as given. Lookup and `{{AccountID}}` use
/// the account that owns the ARN; `account_id` is reported on the identity
/// and falls back to the ARN's account when empty.
pub fn resolve_with_index(
    index: &MappingIndex,
    candidate_arn: &str,
    account_id: &str,
    session_name: &str,
) -> Resolution {
    let generation = index.generation();

    let arn = match Arn::parse(candidate_arn) {
        Ok(arn) => arn,
        Err(e) => return Resolution::malformed(e.to_string(), None, generation),
    };

    let account_id = if account_id.is_empty() {
        arn.account_id()
    } else {
        account_id
    };

    let session = match session_for(&arn, session_name) {
        Ok(session) => session,
        Err(reason) => return Resolution::malformed(reason, None, generation),
    };

    let canonical = arn.canonical_string();

    match index.lookup(&arn) {
        None => Resolution::denied("no mapping for caller", generation),

        Some(ResolvedMapping::AutoMapped { username }) => Resolution::allowed(
            Identity {
                username,
                groups: Vec::new(),
                arn: canonical,
                account_id: account_id.to_string(),
                session_name: session,
            },
            MatchedRule::AutoMapped {
                account_id: arn.account_id().to_string(),
            },
            generation,
        ),

        Some(ResolvedMapping::Explicit { rule, precision }) => {
            let matched = MatchedRule::explicit(rule, precision);
            let fields = MatchFields::from_candidate(&arn).with_session_name(session.clone());

            match expand_identity(&rule.username, &rule.groups, &fields) {
                Ok((username, groups)) => Resolution::allowed(
                    Identity {
                        username,
                        groups,
                        arn: canonical,
                        account_id: account_id.to_string(),
                        session_name: session,
                    },
                    matched,
                    generation,
                ),
                Err(e) => Resolution::malformed(
                    format!("mapping '{}' could not be expanded: {}", rule.mapping.identity_arn, e),
                    Some(matched),
                    generation,
                ),
            }
        }
    }
}

/// Session name used for templating
///
/// Users never have one. For roles the caller-supplied value wins, but it
/// must agree with a session carried in an assumed-role ARN.
fn session_for(arn: &Arn, supplied: &str) -> std::result::Result<Option<String>, String> {
    if arn.principal_kind() == Some(PrincipalKind::User) {
        return Ok(None);
    }

    let supplied = Some(supplied).filter(|s| !s.is_empty());
    match (supplied, arn.session_name()) {
        (Some(s), Some(from_arn)) if s != from_arn => Err(format!(
            "session name '{}' does not match the caller ARN session '{}'",
            s, from_arn
        )),
        (Some(s), _) => Ok(Some(s.to_string())),
        (None, from_arn) => Ok(from_arn.map(str::to_string)),
    }
}

/// Resolver bound to a published index handle
///
/// Cheap to clone; every clone reads the same handle.
#[derive(Clone)]
pub struct IdentityResolver {
    index: Arc<IndexHandle>,
    scrubber: Scrubber,
    metrics: Arc<ResolverMetrics>,
}

impl IdentityResolver {
    pub fn new(index: Arc<IndexHandle>, scrubber: Scrubber, metrics: Arc<ResolverMetrics>) -> Self {
        Self {
            index,
            scrubber,
            metrics,
        }
    }

    /// Resolve a verified caller
    ///
    /// Takes one snapshot up front; a concurrent reload does not affect a
    /// resolution already in progress.
    pub fn resolve(&self, candidate_arn: &str, account_id: &str, session_name: &str) -> Resolution {
        let resolution = match self.index.load() {
            Some(index) => resolve_with_index(&index, candidate_arn, account_id, session_name),
            None => Resolution::denied("no mapping index loaded", 0),
        };

        self.metrics.record_outcome(resolution.outcome);

        match resolution.outcome {
            Outcome::Allowed => {
                if let Some(identity) = &resolution.identity {
                    debug!(
                        "Resolved {} to user={} groups=[{}] (generation {})",
                        self.scrubber.display(candidate_arn),
                        self.scrubber.scrub_text(&identity.username),
                        self.scrubber.scrub_text(&identity.groups.join(", ")),
                        resolution.generation
                    );
                }
            }
            Outcome::Denied => debug!(
                "Denied {}: {}",
                self.scrubber.display(candidate_arn),
                self.scrubber.scrub_text(&resolution.reason)
            ),
            Outcome::Malformed => warn!(
                "Malformed resolution for {}: {}",
                self.scrubber.display(candidate_arn),
                self.scrubber.scrub_text(&resolution.reason)
            ),
        }

        resolution
    }

    pub fn metrics(&self) -> &ResolverMetrics {
        &self.metrics
    }

    pub fn scrubber(&self) -> &Scrubber {
        &self.scrubber
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBuilder;
    use iamk_core::{BackendKind, MappingSet, RoleMapping, UserMapping};
    use tracing_test::traced_test;

    fn index() -> MappingIndex {
        let set = MappingSet::new()
            .with_role(RoleMapping::new(
                "arn:aws:iam::123456789012:role/Bastion",
                "{{SessionName}}@bastion",
                vec!["system:masters".to_string()],
            ))
            .with_role(RoleMapping::new(
                "arn:aws:iam::123456789012:role/Nodes",
                "system:node:{{SessionName}}",
                vec!["system:bootstrappers".to_string(), "system:nodes".to_string()],
            ))
            .with_role(RoleMapping::new(
                "arn:aws:iam::123456789012:role/Account",
                "acct-{{AccountID}}",
                vec![],
            ))
            .with_user(UserMapping::new(
                "arn:aws:iam::123456789012:user/Test",
                "test",
                vec!["developers".to_string()],
            ))
            .with_auto_mapped_account("210987654321");

        let mut builder = IndexBuilder::new("aws");
        for mapping in set.identity_mappings() {
            builder.insert(mapping, BackendKind::MountedFile).unwrap();
        }
        for account in &set.auto_mapped_accounts {
            builder.add_auto_mapped_account(account).unwrap();
        }
        builder.build(7)
    }

    #[test]
    fn test_bastion_example() {
        let r = resolve_with_index(
            &index(),
            "arn:aws:iam::123456789012:role/Bastion",
            "123456789012",
            "i-0abc",
        );
        assert_eq!(r.outcome, Outcome::Allowed);
        let identity = r.identity.unwrap();
        assert_eq!(identity.username, "i-0abc@bastion");
        assert_eq!(identity.groups, vec!["system:masters".to_string()]);
        assert_eq!(r.generation, 7);
    }

    #[test]
    fn test_wrong_account_denied() {
        let r = resolve_with_index(
            &index(),
            "arn:aws:iam::999999999999:role/Bastion",
            "999999999999",
            "i-0abc",
        );
        assert_eq!(r.outcome, Outcome::Denied);
        assert!(r.identity.is_none());
    }

    #[test]
    fn test_malformed_arn() {
        let r = resolve_with_index(&index(), "arn:aws:iam::role/Bastion", "123456789012", "");
        assert_eq!(r.outcome, Outcome::Malformed);
    }

    #[test]
    fn test_supplied_account_is_trusted() {
        let r = resolve_with_index(
            &index(),
            "arn:aws:iam::123456789012:role/Bastion",
            "210987654321",
            "i-0abc",
        );
        assert_eq!(r.outcome, Outcome::Allowed);
        let identity = r.identity.unwrap();
        assert_eq!(identity.username, "i-0abc@bastion");
        assert_eq!(identity.groups, vec!["system:masters".to_string()]);
        assert_eq!(identity.account_id, "210987654321");

        // Templates take the account that owns the role
        let r = resolve_with_index(
            &index(),
            "arn:aws:iam::123456789012:role/Account",
            "210987654321",
            "",
        );
        assert_eq!(r.identity.unwrap().username, "acct-123456789012");
    }

    #[test]
    fn test_assumed_role_session_from_arn() {
        let r = resolve_with_index(
            &index(),
            "arn:aws:sts::123456789012:assumed-role/Nodes/i-0def",
            "123456789012",
            "",
        );
        assert_eq!(r.outcome, Outcome::Allowed);
        let identity = r.identity.unwrap();
        assert_eq!(identity.username, "system:node:i-0def");
        assert_eq!(identity.arn, "arn:aws:iam::123456789012:role/Nodes");
        assert_eq!(identity.session_name.as_deref(), Some("i-0def"));
    }

    #[test]
    fn test_session_mismatch_is_malformed() {
        let r = resolve_with_index(
            &index(),
            "arn:aws:sts::123456789012:assumed-role/Nodes/i-0def",
            "123456789012",
            "i-other",
        );
        assert_eq!(r.outcome, Outcome::Malformed);
    }

    #[test]
    fn test_missing_session_name_is_malformed() {
        let r = resolve_with_index(
            &index(),
            "arn:aws:iam::123456789012:role/Bastion",
            "123456789012",
            "",
        );
        assert_eq!(r.outcome, Outcome::Malformed);
        assert!(matches!(r.matched, Some(MatchedRule::Explicit { .. })));
        assert!(r.reason.contains("arn:aws:iam::123456789012:role/Bastion"));
    }

    #[test]
    fn test_account_template() {
        let r = resolve_with_index(
            &index(),
            "arn:aws:iam::123456789012:role/ops/Account",
            "123456789012",
            "",
        );
        assert_eq!(r.outcome, Outcome::Allowed);
        assert_eq!(r.identity.unwrap().username, "acct-123456789012");
    }

    #[test]
    fn test_user_ignores_supplied_session() {
        let r = resolve_with_index(
            &index(),
            "arn:aws:iam::123456789012:user/Test",
            "123456789012",
            "ignored",
        );
        assert_eq!(r.outcome, Outcome::Allowed);
        let identity = r.identity.unwrap();
        assert_eq!(identity.username, "test");
        assert_eq!(identity.session_name, None);
    }

    #[test]
    fn test_auto_mapped() {
        let r = resolve_with_index(
            &index(),
            "arn:aws:iam::210987654321:user/alice",
            "210987654321",
            "",
        );
        assert_eq!(r.outcome, Outcome::Allowed);
        assert_eq!(
            r.matched,
            Some(MatchedRule::AutoMapped {
                account_id: "210987654321".to_string()
            })
        );
        let identity = r.identity.unwrap();
        assert_eq!(identity.username, "arn:aws:iam::210987654321:user/alice");
        assert!(identity.groups.is_empty());
    }

    #[test]
    fn test_resolver_without_index_denies() {
        let resolver = IdentityResolver::new(
            Arc::new(IndexHandle::new()),
            Scrubber::default(),
            Arc::new(ResolverMetrics::new()),
        );
        let r = resolver.resolve("arn:aws:iam::123456789012:role/Bastion", "123456789012", "s");
        assert_eq!(r.outcome, Outcome::Denied);
        assert_eq!(resolver.metrics().snapshot().denied, 1);
    }

    #[test]
    fn test_resolver_returns_unscrubbed_identity() {
        let resolver = IdentityResolver::new(
            Arc::new(IndexHandle::with_index(index())),
            Scrubber::new(["123456789012"]),
            Arc::new(ResolverMetrics::new()),
        );
        let r = resolver.resolve("arn:aws:iam::123456789012:user/Test", "123456789012", "");
        assert_eq!(r.identity.unwrap().arn, "arn:aws:iam::123456789012:user/Test");
        assert_eq!(resolver.metrics().snapshot().allowed, 1);
    }

    #[traced_test]
    #[test]
    fn test_allowed_log_is_scrubbed() {
        let mut builder = IndexBuilder::new("aws");
        builder.add_auto_mapped_account("123456789012").unwrap();
        builder
            .insert(
                RoleMapping::new(
                    "arn:aws:iam::123456789012:role/Tenant",
                    "tenant-{{AccountID}}",
                    vec!["tenant:{{AccountID}}".to_string()],
                )
                .into(),
                BackendKind::MountedFile,
            )
            .unwrap();

        let resolver = IdentityResolver::new(
            Arc::new(IndexHandle::with_index(builder.build(1))),
            Scrubber::new(["123456789012"]),
            Arc::new(ResolverMetrics::new()),
        );

        let auto = resolver.resolve("arn:aws:iam::123456789012:user/alice", "123456789012", "");
        assert_eq!(auto.identity.unwrap().username, "arn:aws:iam::123456789012:user/alice");

        let templated = resolver.resolve("arn:aws:iam::123456789012:role/Tenant", "123456789012", "");
        assert_eq!(templated.identity.unwrap().groups, vec!["tenant:123456789012".to_string()]);

        let malformed = resolver.resolve("arn:aws:iam::123456789012:role/", "123456789012", "");
        assert_eq!(malformed.outcome, Outcome::Malformed);

        assert!(logs_contain("Resolved arn:***:user/*** to user=arn:***:user/***"));
        assert!(logs_contain("groups=[tenant:***]"));
        assert!(!logs_contain("123456789012"));
        assert!(!logs_contain("alice"));
    }
}
