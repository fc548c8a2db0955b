//! Deployment target (account + region) and ARN helpers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The account/region scope in which stacks and parameters see each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentTarget {
    /// Cloud account id.
    pub account: String,
    /// Region name.
    pub region: String,
}

impl DeploymentTarget {
    /// Creates a new deployment target.
    #[must_use]
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    /// Builds a regional ARN, e.g. `arn:aws:es:us-east-1:123:domain/logs`.
    #[must_use]
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!("arn:aws:{service}:{}:{}:{resource}", self.region, self.account)
    }

    /// Builds a global ARN (no region), as used by IAM.
    #[must_use]
    pub fn global_arn(&self, service: &str, resource: &str) -> String {
        format!("arn:aws:{service}::{}:{resource}", self.account)
    }

    /// ARN of a role in this account.
    #[must_use]
    pub fn role_arn(&self, role_name: &str) -> String {
        self.global_arn("iam", &format!("role/{role_name}"))
    }

    /// ARN of a search domain, optionally with a sub path such as `*`.
    #[must_use]
    pub fn search_domain_arn(&self, domain: &str, path: Option<&str>) -> String {
        match path {
            Some(path) => self.arn("es", &format!("domain/{domain}/{path}")),
            None => self.arn("es", &format!("domain/{domain}")),
        }
    }
}

/// S3 ARNs carry neither region nor account.
#[must_use]
pub fn bucket_arn(bucket: &str, key_pattern: Option<&str>) -> String {
    match key_pattern {
        Some(pattern) => format!("arn:aws:s3:::{bucket}/{pattern}"),
        None => format!("arn:aws:s3:::{bucket}"),
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.region)
    }
}
