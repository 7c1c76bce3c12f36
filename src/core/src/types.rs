//! Mapping rule types
//!
//! Role and user mappings share one contract (match key + username template +
//! group templates). They are kept as separate serde types so configuration
//! files stay readable, and are converted into the tagged
//! [`IdentityMapping`] for everything downstream.

use crate::arn::Arn;
use crate::error::{CoreError, Result};
use crate::template::{Template, TemplateToken};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Account identifier (12 digits)
pub type AccountId = String;

/// Principal type a mapping applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Role,
    User,
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role => write!(f, "role"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Mapping of an IAM role ARN to a username and groups
///
/// The username and group entries are templates that may contain
/// `{{AccountID}}` and `{{SessionName}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleMapping {
    /// Role ARN (e.g. "arn:aws:iam::000000000000:role/Foo")
    #[serde(rename = "roleARN", alias = "rolearn", alias = "roleArn")]
    pub role_arn: String,

    /// Username template
    pub username: String,

    /// Group templates (e.g. `system:masters`)
    #[serde(default)]
    pub groups: Vec<String>,
}

impl RoleMapping {
    pub fn new(role_arn: impl Into<String>, username: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            username: username.into(),
            groups,
        }
    }
}

/// Static mapping of an IAM user ARN to a username and groups
///
/// Users have no session, so `{{SessionName}}` is rejected here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMapping {
    /// User ARN (e.g. "arn:aws:iam::000000000000:user/Test")
    #[serde(rename = "userARN", alias = "userarn", alias = "userArn")]
    pub user_arn: String,

    /// Username template
    pub username: String,

    /// Group templates
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserMapping {
    pub fn new(user_arn: impl Into<String>, username: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            user_arn: user_arn.into(),
            username: username.into(),
            groups,
        }
    }
}

/// A mapping rule of either principal kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityMapping {
    pub kind: PrincipalKind,

    #[serde(rename = "identityARN")]
    pub identity_arn: String,

    pub username: String,

    #[serde(default)]
    pub groups: Vec<String>,
}

impl IdentityMapping {
    /// Parse the match key and check it names a principal of `self.kind`
    pub fn parse_arn(&self) -> Result<Arn> {
        let arn = Arn::parse(&self.identity_arn)?;
        match arn.principal_kind() {
            Some(kind) if kind == self.kind && arn.session_name().is_none() => Ok(arn),
            _ => Err(CoreError::Configuration(format!(
                "{} mapping ARN '{}' does not name an IAM {}",
                self.kind, self.identity_arn, self.kind
            ))),
        }
    }

    /// Parse the username template and every group template
    ///
    /// `{{SessionName}}` is refused for user mappings.
    pub fn parse_templates(&self) -> Result<(Template, Vec<Template>)> {
        let username = self.checked_template(&self.username)?;
        if username.is_empty() {
            return Err(CoreError::Configuration(format!(
                "mapping for '{}' has an empty username",
                self.identity_arn
            )));
        }
        let groups = self
            .groups
            .iter()
            .map(|g| self.checked_template(g))
            .collect::<Result<Vec<_>>>()?;
        Ok((username, groups))
    }

    /// Full validation of one mapping rule
    pub fn validate(&self) -> Result<()> {
        self.parse_arn()?;
        self.parse_templates()?;
        Ok(())
    }

    fn checked_template(&self, raw: &str) -> Result<Template> {
        let template = Template::parse(raw)?;
        if self.kind == PrincipalKind::User && template.uses(TemplateToken::SessionName) {
            return Err(CoreError::Configuration(format!(
                "user mapping for '{}' cannot use {{{{SessionName}}}} in '{}'",
                self.identity_arn, raw
            )));
        }
        Ok(template)
    }
}

impl From<RoleMapping> for IdentityMapping {
    fn from(m: RoleMapping) -> Self {
        Self {
            kind: PrincipalKind::Role,
            identity_arn: m.role_arn,
            username: m.username,
            groups: m.groups,
        }
    }
}

impl From<UserMapping> for IdentityMapping {
    fn from(m: UserMapping) -> Self {
        Self {
            kind: PrincipalKind::User,
            identity_arn: m.user_arn,
            username: m.username,
            groups: m.groups,
        }
    }
}

/// Configuration backend names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendKind {
    /// Mappings from the mounted configuration file
    MountedFile,
    /// Mappings from the cluster config object (`aws-auth` style)
    #[serde(rename = "EKSConfigMap")]
    EksConfigMap,
    /// Mappings from cluster custom resources
    #[serde(rename = "CRD")]
    Crd,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::MountedFile, Self::EksConfigMap, Self::Crd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MountedFile => "MountedFile",
            Self::EksConfigMap => "EKSConfigMap",
            Self::Crd => "CRD",
        }
    }

    /// Parse an ordered, comma separated backend list (`MountedFile,CRD`)
    pub fn parse_order(list: &str) -> Result<Vec<BackendKind>> {
        let order = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(BackendKind::from_str)
            .collect::<Result<Vec<_>>>()?;
        validate_backend_order(&order)?;
        Ok(order)
    }
}

impl FromStr for BackendKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownBackend(s.to_string()))
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend order must be non-empty and list each backend once
pub fn validate_backend_order(order: &[BackendKind]) -> Result<()> {
    if order.is_empty() {
        return Err(CoreError::Configuration("backend mode cannot be empty".to_string()));
    }
    let mut seen = HashSet::new();
    for kind in order {
        if !seen.insert(*kind) {
            return Err(CoreError::Configuration(format!(
                "backend '{}' listed more than once",
                kind
            )));
        }
    }
    Ok(())
}

/// Everything one backend contributes to the index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSet {
    /// Cluster these mappings were written for; `None` means any cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,

    #[serde(default)]
    pub role_mappings: Vec<RoleMapping>,

    #[serde(default)]
    pub user_mappings: Vec<UserMapping>,

    #[serde(default, rename = "autoMappedAWSAccounts", alias = "mapAccounts")]
    pub auto_mapped_accounts: Vec<AccountId>,
}

impl MappingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, mapping: RoleMapping) -> Self {
        self.role_mappings.push(mapping);
        self
    }

    pub fn with_user(mut self, mapping: UserMapping) -> Self {
        self.user_mappings.push(mapping);
        self
    }

    pub fn with_auto_mapped_account(mut self, account: impl Into<String>) -> Self {
        self.auto_mapped_accounts.push(account.into());
        self
    }

    pub fn with_cluster_id(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    /// Number of explicit mapping rules
    pub fn len(&self) -> usize {
        self.role_mappings.len() + self.user_mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.auto_mapped_accounts.is_empty()
    }

    /// All rules in declaration order, role mappings first
    pub fn identity_mappings(&self) -> impl Iterator<Item = IdentityMapping> + '_ {
        self.role_mappings
            .iter()
            .cloned()
            .map(IdentityMapping::from)
            .chain(self.user_mappings.iter().cloned().map(IdentityMapping::from))
    }

    /// Check every rule, reject duplicate ARNs within each list and
    /// malformed account IDs
    pub fn validate(&self) -> Result<()> {
        let mut roles = HashSet::new();
        let mut users = HashSet::new();

        for mapping in self.identity_mappings() {
            let arn = mapping.parse_arn()?;
            mapping.parse_templates()?;

            let seen = match mapping.kind {
                PrincipalKind::Role => &mut roles,
                PrincipalKind::User => &mut users,
            };
            if !seen.insert(arn.to_string()) {
                return Err(CoreError::DuplicateArn(mapping.identity_arn.clone()));
            }
        }

        for account in &self.auto_mapped_accounts {
            if !crate::arn::is_account_id(account) {
                return Err(CoreError::Configuration(format!(
                    "auto-mapped account '{}' is not a 12 digit account ID",
                    account
                )));
            }
        }

        Ok(())
    }
}
