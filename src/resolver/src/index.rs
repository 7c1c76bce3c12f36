//! Mapping index
//!
//! Immutable lookup structure built from merged role mappings, user mappings
//! and auto-mapped accounts. Role and user rules live in separate tables
//! keyed by `(partition, account, name)`, so resolving an ARN is one hash
//! lookup plus a scan of the (usually single-entry) bucket.
//!
//! Precedence inside a bucket: a rule whose full resource path equals the
//! caller's wins over one that only matched by name; among equals the rule
//! declared first wins.

use crate::matcher::{match_parsed, Precision};
use chrono::{DateTime, Utc};
use iamk_core::arn::is_account_id;
use iamk_core::{
    AccountId, Arn, BackendKind, CoreError, IdentityMapping, PrincipalKind, Template,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A validated rule ready for lookup
#[derive(Debug, Clone)]
pub struct IndexedRule {
    pub mapping: IdentityMapping,
    pub arn: Arn,
    pub username: Template,
    pub groups: Vec<Template>,
    /// Backend that contributed this rule
    pub source: BackendKind,
    /// Position in merge order
    pub ordinal: usize,
}

/// Same ARN defined by two backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingConflict {
    pub kind: PrincipalKind,
    pub arn: String,
    /// Backend whose rule is in the index
    pub kept: BackendKind,
    /// Backend whose rule was discarded
    pub dropped: BackendKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NameKey {
    partition: String,
    account_id: String,
    name: String,
}

impl NameKey {
    fn of(arn: &Arn) -> Self {
        Self {
            partition: arn.partition().to_string(),
            account_id: arn.account_id().to_string(),
            name: arn.name().to_string(),
        }
    }
}

/// Result of an index lookup
#[derive(Debug, Clone)]
pub enum ResolvedMapping<'a> {
    /// An explicit role or user rule matched
    Explicit {
        rule: &'a IndexedRule,
        precision: Precision,
    },
    /// No rule matched but the account is auto-mapped
    AutoMapped { username: String },
}

/// Immutable mapping index snapshot
#[derive(Debug)]
pub struct MappingIndex {
    generation: u64,
    partition_id: String,
    roles: HashMap<NameKey, Vec<IndexedRule>>,
    users: HashMap<NameKey, Vec<IndexedRule>>,
    auto_mapped: HashSet<AccountId>,
    rule_count: usize,
    built_at: DateTime<Utc>,
}

impl MappingIndex {
    /// Index with no rules
    pub fn empty(partition_id: impl Into<String>) -> Self {
        IndexBuilder::new(partition_id).build(0)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Number of explicit rules
    pub fn len(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0 && self.auto_mapped.is_empty()
    }

    pub fn is_auto_mapped(&self, account_id: &str) -> bool {
        self.auto_mapped.contains(account_id)
    }

    /// All rules, ordered by merge position
    pub fn rules(&self) -> Vec<&IndexedRule> {
        let mut rules: Vec<&IndexedRule> = self
            .roles
            .values()
            .chain(self.users.values())
            .flatten()
            .collect();
        rules.sort_by_key(|r| r.ordinal);
        rules
    }

    /// Find the rule for a caller ARN
    ///
    /// `None` is the normal "no mapping" outcome.
    pub fn lookup(&self, candidate: &Arn) -> Option<ResolvedMapping<'_>> {
        let canonical = candidate.canonical();

        let table = match canonical.principal_kind() {
            Some(PrincipalKind::Role) => Some(&self.roles),
            Some(PrincipalKind::User) => Some(&self.users),
            None => None,
        };

        if let Some(bucket) = table.and_then(|t| t.get(&NameKey::of(&canonical))) {
            let mut best: Option<(&IndexedRule, Precision)> = None;
            for rule in bucket {
                let Some(precision) = match_parsed(&rule.arn, &canonical) else {
                    continue;
                };
                // Bucket is in declaration order; only a strictly better
                // precision may replace an earlier rule
                if best.map_or(true, |(_, p)| precision > p) {
                    best = Some((rule, precision));
                }
                if precision == Precision::Exact {
                    break;
                }
            }

            if let Some((rule, precision)) = best {
                return Some(ResolvedMapping::Explicit { rule, precision });
            }
        }

        if canonical.partition() == self.partition_id && self.is_auto_mapped(canonical.account_id())
        {
            return Some(ResolvedMapping::AutoMapped {
                username: canonical.to_string(),
            });
        }

        None
    }
}

/// Builds a [`MappingIndex`] one rule at a time
///
/// Rules must be inserted in precedence order: backend order first, then
/// declaration order within a backend.
#[derive(Debug)]
pub struct IndexBuilder {
    partition_id: String,
    roles: HashMap<NameKey, Vec<IndexedRule>>,
    users: HashMap<NameKey, Vec<IndexedRule>>,
    auto_mapped: HashSet<AccountId>,
    seen: HashMap<(PrincipalKind, String), BackendKind>,
    next_ordinal: usize,
}

impl IndexBuilder {
    pub fn new(partition_id: impl Into<String>) -> Self {
        Self {
            partition_id: partition_id.into(),
            roles: HashMap::new(),
            users: HashMap::new(),
            auto_mapped: HashSet::new(),
            seen: HashMap::new(),
            next_ordinal: 0,
        }
    }

    /// Insert one rule
    ///
    /// If another backend already contributed the same ARN the earlier rule
    /// stays and the conflict is returned. The same ARN twice from one
    /// backend is a configuration error.
    pub fn insert(
        &mut self,
        mapping: IdentityMapping,
        source: BackendKind,
    ) -> Result<Option<MappingConflict>, CoreError> {
        let arn = mapping.parse_arn()?;
        let (username, groups) = mapping.parse_templates()?;

        let seen_key = (mapping.kind, arn.to_string());
        if let Some(&kept) = self.seen.get(&seen_key) {
            if kept == source {
                return Err(CoreError::DuplicateArn(mapping.identity_arn));
            }
            return Ok(Some(MappingConflict {
                kind: mapping.kind,
                arn: seen_key.1,
                kept,
                dropped: source,
            }));
        }
        self.seen.insert(seen_key, source);

        let table = match mapping.kind {
            PrincipalKind::Role => &mut self.roles,
            PrincipalKind::User => &mut self.users,
        };

        let rule = IndexedRule {
            arn,
            username,
            groups,
            source,
            ordinal: self.next_ordinal,
            mapping,
        };
        self.next_ordinal += 1;

        table.entry(NameKey::of(&rule.arn)).or_default().push(rule);
        Ok(None)
    }

    /// Mark an account as auto-mapped
    pub fn add_auto_mapped_account(&mut self, account_id: &str) -> Result<(), CoreError> {
        if !is_account_id(account_id) {
            return Err(CoreError::Configuration(format!(
                "auto-mapped account '{}' is not a 12 digit account ID",
                account_id
            )));
        }
        self.auto_mapped.insert(account_id.to_string());
        Ok(())
    }

    pub fn build(self, generation: u64) -> MappingIndex {
        MappingIndex {
            generation,
            partition_id: self.partition_id,
            roles: self.roles,
            users: self.users,
            auto_mapped: self.auto_mapped,
            rule_count: self.next_ordinal,
            built_at: Utc::now(),
        }
    }
}
