//! Mapper configuration
//!
//! `Config` is what the external loader hands over. It is validated once and
//! then only read.

use crate::arn::is_account_id;
use crate::error::{CoreError, Result};
use crate::types::{
    validate_backend_order, AccountId, BackendKind, MappingSet, RoleMapping, UserMapping,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default AWS partition
pub const DEFAULT_PARTITION: &str = "aws";

fn default_partition() -> String {
    DEFAULT_PARTITION.to_string()
}

fn default_backend_mode() -> Vec<String> {
    vec![BackendKind::MountedFile.to_string()]
}

/// Configuration consumed by the identity mapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Partition credentials are valid in (`aws`, `aws-cn`, `aws-us-gov`, ...)
    #[serde(rename = "partitionID", default = "default_partition")]
    pub partition_id: String,

    /// Unique-per-cluster identifier
    #[serde(rename = "clusterID", default)]
    pub cluster_id: String,

    #[serde(default)]
    pub role_mappings: Vec<RoleMapping>,

    #[serde(default)]
    pub user_mappings: Vec<UserMapping>,

    /// Accounts whose principals are mapped without an explicit rule
    #[serde(rename = "autoMappedAWSAccounts", default)]
    pub auto_mapped_aws_accounts: Vec<AccountId>,

    /// Accounts whose ARNs are redacted in logs
    #[serde(rename = "scrubbedAWSAccounts", default)]
    pub scrubbed_aws_accounts: Vec<AccountId>,

    /// Ordered list of backends to read mappings from
    #[serde(default = "default_backend_mode")]
    pub backend_mode: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            partition_id: default_partition(),
            cluster_id: String::new(),
            role_mappings: Vec::new(),
            user_mappings: Vec::new(),
            auto_mapped_aws_accounts: Vec::new(),
            scrubbed_aws_accounts: Vec::new(),
            backend_mode: default_backend_mode(),
        }
    }
}

impl Config {
    /// Parsed backend order
    pub fn backend_order(&self) -> Result<Vec<BackendKind>> {
        let order = self
            .backend_mode
            .iter()
            .map(|name| BackendKind::from_str(name.trim()))
            .collect::<Result<Vec<_>>>()?;
        validate_backend_order(&order)?;
        Ok(order)
    }

    /// The mappings carried directly in this config
    pub fn mapping_set(&self) -> MappingSet {
        MappingSet {
            cluster_id: None,
            role_mappings: self.role_mappings.clone(),
            user_mappings: self.user_mappings.clone(),
            auto_mapped_accounts: self.auto_mapped_aws_accounts.clone(),
        }
    }

    /// Enforce the configuration invariants
    pub fn validate(&self) -> Result<()> {
        if self.partition_id.trim().is_empty() {
            return Err(CoreError::Configuration("partition ID cannot be empty".to_string()));
        }

        self.backend_order()?;
        self.mapping_set().validate()?;

        for account in &self.scrubbed_aws_accounts {
            if !is_account_id(account) {
                return Err(CoreError::Configuration(format!(
                    "scrubbed account '{}' is not a 12 digit account ID",
                    account
                )));
            }
        }

        Ok(())
    }
}
