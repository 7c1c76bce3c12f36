//! Resolution result types

use crate::index::IndexedRule;
use crate::matcher::Precision;
use iamk_core::{BackendKind, PrincipalKind};
use serde::{Deserialize, Serialize};

/// Final outcome of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A mapping applied; the identity is set
    Allowed,
    /// No mapping applies to this caller
    Denied,
    /// Caller input or the matched mapping could not be used
    Malformed,
}

/// Platform identity handed to the downstream authorizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub groups: Vec<String>,
    /// Canonical ARN of the caller
    pub arn: String,
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
}

/// Rule that produced an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchedRule {
    Explicit {
        kind: PrincipalKind,
        arn: String,
        source: BackendKind,
        precision: Precision,
    },
    AutoMapped {
        account_id: String,
    },
}

impl MatchedRule {
    pub(crate) fn explicit(rule: &IndexedRule, precision: Precision) -> Self {
        Self::Explicit {
            kind: rule.mapping.kind,
            arn: rule.mapping.identity_arn.clone(),
            source: rule.source,
            precision,
        }
    }
}

/// Everything the response encoder and the audit sink need
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub outcome: Outcome,

    /// Only set when `outcome` is `Allowed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchedRule>,

    pub reason: String,

    /// Index generation the resolution ran against
    pub generation: u64,
}

impl Resolution {
    pub fn allowed(identity: Identity, matched: MatchedRule, generation: u64) -> Self {
        Self {
            outcome: Outcome::Allowed,
            identity: Some(identity),
            matched: Some(matched),
            reason: "mapping applied".to_string(),
            generation,
        }
    }

    pub fn denied(reason: impl Into<String>, generation: u64) -> Self {
        Self {
            outcome: Outcome::Denied,
            identity: None,
            matched: None,
            reason: reason.into(),
            generation,
        }
    }

    pub fn malformed(reason: impl Into<String>, matched: Option<MatchedRule>, generation: u64) -> Self {
        Self {
            outcome: Outcome::Malformed,
            identity: None,
            matched,
            reason: reason.into(),
            generation,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome == Outcome::Allowed
    }
}
