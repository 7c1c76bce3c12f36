//! ARN parsing
//!
//! An ARN has six colon-separated fields:
//!
//! ```text
//! arn:partition:service:region:account-id:resource
//! ```
//!
//! The resource field is decomposed further into a type (`role`, `user`,
//! `assumed-role`, ...), an optional path and a final name. For example
//! `role/team/ops/Deployer` has type `role`, path `team/ops/` and name
//! `Deployer`.
//!
//! # Examples
//!
//! ```
//! use iamk_core::arn::{Arn, ResourceKind};
//!
//! let arn = Arn::parse("arn:aws:sts::123456789012:assumed-role/Bastion/i-0abc").unwrap();
//! assert_eq!(arn.kind(), &ResourceKind::AssumedRole);
//! assert_eq!(arn.session_name(), Some("i-0abc"));
//!
//! let role = arn.canonical();
//! assert_eq!(role.to_string(), "arn:aws:iam::123456789012:role/Bastion");
//! ```

use crate::error::{CoreError, Result};
use crate::types::PrincipalKind;
use std::fmt;
use std::str::FromStr;

/// Length of an AWS account identifier
pub const ACCOUNT_ID_LEN: usize = 12;

/// Resource type of a parsed ARN
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `role/[path/]Name`
    Role,
    /// `user/[path/]Name`
    User,
    /// `assumed-role/Role/Session` (STS)
    AssumedRole,
    /// `federated-user/Name` (STS)
    FederatedUser,
    /// Account root principal
    Root,
    /// Anything else; kept verbatim
    Other(String),
}

impl ResourceKind {
    /// The resource type as it appears in the ARN
    pub fn as_str(&self) -> &str {
        match self {
            Self::Role => "role",
            Self::User => "user",
            Self::AssumedRole => "assumed-role",
            Self::FederatedUser => "federated-user",
            Self::Root => "root",
            Self::Other(s) => s,
        }
    }

    fn from_type(s: &str) -> Self {
        match s {
            "role" => Self::Role,
            "user" => Self::User,
            "assumed-role" => Self::AssumedRole,
            "federated-user" => Self::FederatedUser,
            "root" => Self::Root,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed ARN
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
    partition: String,
    service: String,
    region: String,
    account_id: String,
    kind: ResourceKind,
    /// Path between the type and the name, with trailing slash ("" if none)
    path: String,
    name: String,
    session_name: Option<String>,
}

impl Arn {
    /// Parse an ARN string
    ///
    /// Fails on a wrong field count, an empty partition/service/account or
    /// resource, an account ID that is not twelve digits, and on role/user
    /// ARNs without a name.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let fields: Vec<&str> = s.splitn(6, ':').collect();
        if fields.len() != 6 {
            return Err(CoreError::invalid_arn(s, "expected 6 colon-separated fields"));
        }
        if fields[0] != "arn" {
            return Err(CoreError::invalid_arn(s, "missing 'arn' prefix"));
        }

        let (partition, service, region, account_id, resource) =
            (fields[1], fields[2], fields[3], fields[4], fields[5]);

        if partition.is_empty() {
            return Err(CoreError::invalid_arn(s, "empty partition"));
        }
        if service.is_empty() {
            return Err(CoreError::invalid_arn(s, "empty service"));
        }
        if !is_account_id(account_id) {
            return Err(CoreError::invalid_arn(
                s,
                format!("account ID must be {} digits", ACCOUNT_ID_LEN),
            ));
        }
        if resource.is_empty() {
            return Err(CoreError::invalid_arn(s, "empty resource"));
        }

        let (kind, path, name, session_name) = match resource.split_once('/') {
            None => {
                let kind = ResourceKind::from_type(resource);
                if kind != ResourceKind::Root {
                    return Err(CoreError::invalid_arn(s, "resource has no name"));
                }
                (kind, String::new(), String::new(), None)
            }
            Some((ty, rest)) => {
                let kind = ResourceKind::from_type(ty);
                match kind {
                    ResourceKind::Role | ResourceKind::User => {
                        expect_service(s, service, "iam")?;
                        if !region.is_empty() {
                            return Err(CoreError::invalid_arn(s, "IAM ARNs have no region"));
                        }
                        let (path, name) = match rest.rfind('/') {
                            Some(idx) => (&rest[..=idx], &rest[idx + 1..]),
                            None => ("", rest),
                        };
                        if name.is_empty() {
                            return Err(CoreError::invalid_arn(s, "resource has no name"));
                        }
                        if path.split('/').filter(|seg| !seg.is_empty()).count()
                            != path.matches('/').count()
                        {
                            return Err(CoreError::invalid_arn(s, "empty path segment"));
                        }
                        (kind, path.to_string(), name.to_string(), None)
                    }
                    ResourceKind::AssumedRole => {
                        expect_service(s, service, "sts")?;
                        let (role, session) = rest.split_once('/').ok_or_else(|| {
                            CoreError::invalid_arn(s, "assumed-role without session name")
                        })?;
                        if role.is_empty() || session.is_empty() || session.contains('/') {
                            return Err(CoreError::invalid_arn(
                                s,
                                "assumed-role must be 'assumed-role/<role>/<session>'",
                            ));
                        }
                        (kind, String::new(), role.to_string(), Some(session.to_string()))
                    }
                    _ => {
                        if rest.is_empty() {
                            return Err(CoreError::invalid_arn(s, "resource has no name"));
                        }
                        (kind, String::new(), rest.to_string(), None)
                    }
                }
            }
        };

        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            kind,
            path,
            name,
            session_name,
        })
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Path between resource type and name, including the trailing slash
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final name segment of the resource
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session name, only present on STS assumed-role ARNs
    pub fn session_name(&self) -> Option<&str> {
        self.session_name.as_deref()
    }

    /// Full resource field (`role/team/Foo`, `assumed-role/Foo/sess`, ...)
    pub fn resource(&self) -> String {
        match &self.kind {
            ResourceKind::Root => "root".to_string(),
            ResourceKind::AssumedRole => format!(
                "assumed-role/{}/{}",
                self.name,
                self.session_name.as_deref().unwrap_or_default()
            ),
            kind => format!("{}/{}{}", kind, self.path, self.name),
        }
    }

    /// The principal kind this ARN maps through, if any
    ///
    /// Assumed roles resolve through role mappings.
    pub fn principal_kind(&self) -> Option<PrincipalKind> {
        match self.kind {
            ResourceKind::Role | ResourceKind::AssumedRole => Some(PrincipalKind::Role),
            ResourceKind::User => Some(PrincipalKind::User),
            _ => None,
        }
    }

    /// Canonical IAM form of this ARN
    ///
    /// `arn:aws:sts::ACCT:assumed-role/Role/Session` becomes
    /// `arn:aws:iam::ACCT:role/Role`. Every other ARN is returned unchanged.
    /// The session name is carried over so it stays available for templating.
    pub fn canonical(&self) -> Self {
        match self.kind {
            ResourceKind::AssumedRole => Self {
                partition: self.partition.clone(),
                service: "iam".to_string(),
                region: String::new(),
                account_id: self.account_id.clone(),
                kind: ResourceKind::Role,
                path: String::new(),
                name: self.name.clone(),
                session_name: self.session_name.clone(),
            },
            _ => self.clone(),
        }
    }

    /// Canonical ARN string without session name
    pub fn canonical_string(&self) -> String {
        self.canonical().to_string()
    }
}

impl FromStr for Arn {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition,
            self.service,
            self.region,
            self.account_id,
            self.resource()
        )
    }
}

/// Returns true for a twelve digit account identifier
pub fn is_account_id(s: &str) -> bool {
    s.len() == ACCOUNT_ID_LEN && s.bytes().all(|b| b.is_ascii_digit())
}

fn expect_service(arn: &str, service: &str, expected: &str) -> Result<()> {
    if service != expected {
        return Err(CoreError::invalid_arn(
            arn,
            format!("service '{}' does not issue this resource type, expected '{}'", service, expected),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        let arn = Arn::parse("arn:aws:iam::123456789012:role/Bastion").unwrap();
        assert_eq!(arn.partition(), "aws");
        assert_eq!(arn.account_id(), "123456789012");
        assert_eq!(arn.kind(), &ResourceKind::Role);
        assert_eq!(arn.path(), "");
        assert_eq!(arn.name(), "Bastion");
        assert_eq!(arn.session_name(), None);
    }

    #[test]
    fn test_parse_role_with_path() {
        let arn = Arn::parse("arn:aws:iam::111111111111:role/team/ops/Foo").unwrap();
        assert_eq!(arn.path(), "team/ops/");
        assert_eq!(arn.name(), "Foo");
        assert_eq!(arn.resource(), "role/team/ops/Foo");
        assert_eq!(arn.to_string(), "arn:aws:iam::111111111111:role/team/ops/Foo");
    }

    #[test]
    fn test_parse_user() {
        let arn = Arn::parse("arn:aws-cn:iam::000000000000:user/Test").unwrap();
        assert_eq!(arn.partition(), "aws-cn");
        assert_eq!(arn.kind(), &ResourceKind::User);
        assert_eq!(arn.principal_kind(), Some(PrincipalKind::User));
    }

    #[test]
    fn test_parse_assumed_role() {
        let arn = Arn::parse("arn:aws:sts::123456789012:assumed-role/Bastion/i-0abc").unwrap();
        assert_eq!(arn.kind(), &ResourceKind::AssumedRole);
        assert_eq!(arn.name(), "Bastion");
        assert_eq!(arn.session_name(), Some("i-0abc"));
        assert_eq!(arn.principal_kind(), Some(PrincipalKind::Role));

        let canonical = arn.canonical();
        assert_eq!(canonical.kind(), &ResourceKind::Role);
        assert_eq!(canonical.session_name(), Some("i-0abc"));
        assert_eq!(arn.canonical_string(), "arn:aws:iam::123456789012:role/Bastion");
    }

    #[test]
    fn test_parse_root_and_federated() {
        let root = Arn::parse("arn:aws:iam::123456789012:root").unwrap();
        assert_eq!(root.kind(), &ResourceKind::Root);
        assert_eq!(root.principal_kind(), None);
        assert_eq!(root.to_string(), "arn:aws:iam::123456789012:root");

        let fed = Arn::parse("arn:aws:sts::123456789012:federated-user/bob").unwrap();
        assert_eq!(fed.kind(), &ResourceKind::FederatedUser);
        assert_eq!(fed.principal_kind(), None);
    }

    #[test]
    fn test_malformed_arns() {
        let cases = [
            "",
            "arn:aws:iam::123456789012",
            "nra:aws:iam::123456789012:role/Foo",
            "arn::iam::123456789012:role/Foo",
            "arn:aws:::123456789012:role/Foo",
            "arn:aws:iam:::role/Foo",
            "arn:aws:iam::12345:role/Foo",
            "arn:aws:iam::12345678901a:role/Foo",
            "arn:aws:iam::123456789012:",
            "arn:aws:iam::123456789012:role/",
            "arn:aws:iam::123456789012:role//Foo",
            "arn:aws:iam::123456789012:role",
            "arn:aws:sts::123456789012:role/Foo",
            "arn:aws:sts::123456789012:assumed-role/Foo",
            "arn:aws:sts::123456789012:assumed-role/Foo/",
            "arn:aws:iam:us-east-1:123456789012:role/Foo",
        ];

        for case in cases {
            assert!(
                matches!(Arn::parse(case), Err(CoreError::InvalidArn { .. })),
                "expected '{}' to be rejected",
                case
            );
        }
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let arn = Arn::parse("  arn:aws:iam::123456789012:user/Test\n").unwrap();
        assert_eq!(arn.to_string(), "arn:aws:iam::123456789012:user/Test");
    }
}
