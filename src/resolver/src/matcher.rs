//! ARN matcher
//!
//! A configured pattern matches a caller ARN when partition, account ID,
//! resource type and final resource name are all equal (case-sensitive).
//! The path between `role/`/`user/` and the name is ignored on both sides,
//! so `role/Foo` matches `role/team/Foo` and vice versa. There is no other
//! wildcarding.
//!
//! Callers arriving through STS (`assumed-role/Foo/session`) are compared in
//! their canonical IAM form (`role/Foo`). The session name is extracted for
//! templating but never takes part in the match.
//!
//! # Examples
//!
//! ```
//! use iamk_resolver::matcher::{match_arn, Precision};
//!
//! let outcome = match_arn(
//!     "arn:aws:iam::111111111111:role/Foo",
//!     "arn:aws:sts::111111111111:assumed-role/Foo/i-0abc",
//! );
//! assert!(outcome.matched());
//! assert_eq!(outcome.precision(), Some(Precision::Exact));
//! assert_eq!(outcome.fields().unwrap().session_name.as_deref(), Some("i-0abc"));
//!
//! let outcome = match_arn(
//!     "arn:aws:iam::111111111111:role/Foo",
//!     "arn:aws:iam::111111111111:role/team/Foo",
//! );
//! assert_eq!(outcome.precision(), Some(Precision::PathIgnored));
//! ```

use iamk_core::{Arn, ResourceKind};
use serde::Serialize;

/// Fields extracted from a caller ARN for template expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchFields {
    pub partition: String,
    pub account_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub session_name: Option<String>,
}

impl MatchFields {
    /// Extract fields from a caller ARN (canonicalized first)
    pub fn from_candidate(candidate: &Arn) -> Self {
        let canonical = candidate.canonical();
        Self {
            partition: canonical.partition().to_string(),
            account_id: canonical.account_id().to_string(),
            resource_type: canonical.kind().to_string(),
            resource_id: canonical.name().to_string(),
            session_name: canonical.session_name().map(str::to_string),
        }
    }

    /// Replace the session name
    pub fn with_session_name(mut self, session_name: Option<String>) -> Self {
        self.session_name = session_name;
        self
    }
}

/// How closely a pattern matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// Only the final name matched; paths differ
    PathIgnored,
    /// The full resource, path included, matched
    Exact,
}

/// Result of matching one pattern against one caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    NoMatch,
    Matched { precision: Precision, fields: MatchFields },
}

impl MatchOutcome {
    pub fn matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    pub fn precision(&self) -> Option<Precision> {
        match self {
            Self::Matched { precision, .. } => Some(*precision),
            Self::NoMatch => None,
        }
    }

    pub fn fields(&self) -> Option<&MatchFields> {
        match self {
            Self::Matched { fields, .. } => Some(fields),
            Self::NoMatch => None,
        }
    }
}

/// Match a pattern string against a caller ARN string
///
/// Either side failing to parse is a plain `NoMatch`.
pub fn match_arn(pattern: &str, candidate: &str) -> MatchOutcome {
    let (Ok(pattern), Ok(candidate)) = (Arn::parse(pattern), Arn::parse(candidate)) else {
        return MatchOutcome::NoMatch;
    };

    match match_parsed(&pattern, &candidate) {
        Some(precision) => MatchOutcome::Matched {
            precision,
            fields: MatchFields::from_candidate(&candidate),
        },
        None => MatchOutcome::NoMatch,
    }
}

/// Match already parsed ARNs
///
/// Returns `None` when the pattern does not apply to the candidate.
pub fn match_parsed(pattern: &Arn, candidate: &Arn) -> Option<Precision> {
    let candidate = candidate.canonical();

    if !matches!(pattern.kind(), ResourceKind::Role | ResourceKind::User) {
        return None;
    }

    if pattern.partition() != candidate.partition()
        || pattern.account_id() != candidate.account_id()
        || pattern.kind() != candidate.kind()
        || pattern.name() != candidate.name()
    {
        return None;
    }

    if pattern.path() == candidate.path() {
        Some(Precision::Exact)
    } else {
        Some(Precision::PathIgnored)
    }
}
