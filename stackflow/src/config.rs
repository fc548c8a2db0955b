//! Deployment configuration.
//!
//! Values come from serde defaults, then an optional JSON file, then
//! `STACKFLOW_*` environment variables.

use crate::errors::ConfigError;
use crate::plan::FailureMode;
use crate::target::DeploymentTarget;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "STACKFLOW_";

mod defaults {
    pub fn name() -> String {
        "ecs-elk".to_string()
    }

    pub fn account() -> String {
        "000000000000".to_string()
    }

    pub fn region() -> String {
        "us-east-1".to_string()
    }

    pub fn security_group_id() -> String {
        "sg-00000000".to_string()
    }

    pub fn repo_name() -> String {
        "ecs-in-elk".to_string()
    }

    pub fn es_domain_name() -> String {
        "keehyun-vpc-es".to_string()
    }

    pub fn es_index_name() -> String {
        "firehose".to_string()
    }

    pub fn es_type_name() -> String {
        "logs".to_string()
    }

    pub fn delivery_stream_name() -> String {
        "keehyun-firehose".to_string()
    }

    pub fn backup_bucket_name() -> String {
        "firehose-log-storage".to_string()
    }

    pub fn kibana_key_name() -> String {
        "eksworkshop".to_string()
    }

    pub fn private_subnet_ids() -> Vec<String> {
        vec!["subnet-private-a".to_string(), "subnet-private-b".to_string()]
    }

    pub fn public_subnet_ids() -> Vec<String> {
        vec!["subnet-public-a".to_string(), "subnet-public-b".to_string()]
    }
}

/// Typed settings handed to every blueprint stack builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlueprintConfig {
    /// Private subnets of the existing VPC, one per availability zone used.
    #[serde(default = "defaults::private_subnet_ids")]
    pub private_subnet_ids: Vec<String>,

    /// Public subnets of the VPC.
    #[serde(default = "defaults::public_subnet_ids")]
    pub public_subnet_ids: Vec<String>,

    /// Existing security group shared by those resources.
    #[serde(default = "defaults::security_group_id")]
    pub security_group_id: String,

    /// Container repository name.
    #[serde(default = "defaults::repo_name")]
    pub repo_name: String,

    /// Search domain name.
    #[serde(default = "defaults::es_domain_name")]
    pub es_domain_name: String,

    /// Index the delivery stream writes to.
    #[serde(default = "defaults::es_index_name")]
    pub es_index_name: String,

    /// Document type of the index.
    #[serde(default = "defaults::es_type_name")]
    pub es_type_name: String,

    /// Delivery stream name.
    #[serde(default = "defaults::delivery_stream_name")]
    pub delivery_stream_name: String,

    /// Bucket that receives backup copies of delivered records.
    #[serde(default = "defaults::backup_bucket_name")]
    pub backup_bucket_name: String,

    /// Key pair of the Kibana proxy instance.
    #[serde(default = "defaults::kibana_key_name")]
    pub kibana_key_name: String,
}

impl Default for BlueprintConfig {
    fn default() -> Self {
        Self {
            private_subnet_ids: defaults::private_subnet_ids(),
            public_subnet_ids: defaults::public_subnet_ids(),
            security_group_id: defaults::security_group_id(),
            repo_name: defaults::repo_name(),
            es_domain_name: defaults::es_domain_name(),
            es_index_name: defaults::es_index_name(),
            es_type_name: defaults::es_type_name(),
            delivery_stream_name: defaults::delivery_stream_name(),
            backup_bucket_name: defaults::backup_bucket_name(),
            kibana_key_name: defaults::kibana_key_name(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Deployment name.
    #[serde(default = "defaults::name")]
    pub name: String,

    /// Target account id.
    #[serde(default = "defaults::account")]
    pub account: String,

    /// Target region.
    #[serde(default = "defaults::region")]
    pub region: String,

    /// What to do when a stack fails.
    #[serde(default)]
    pub failure_mode: FailureMode,

    /// Blueprint settings.
    #[serde(default)]
    pub blueprint: BlueprintConfig,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            name: defaults::name(),
            account: defaults::account(),
            region: defaults::region(),
            failure_mode: FailureMode::default(),
            blueprint: BlueprintConfig::default(),
        }
    }
}

impl DeploymentConfig {
    /// Parses configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or has unknown fields.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_json_str(&raw)
    }

    /// Loads the file if given, otherwise defaults, then applies the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an override is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies `STACKFLOW_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override makes the configuration invalid.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        let fields: [(&str, &mut String); 11] = [
            ("NAME", &mut self.name),
            ("ACCOUNT", &mut self.account),
            ("REGION", &mut self.region),
            ("SECURITY_GROUP_ID", &mut self.blueprint.security_group_id),
            ("REPO_NAME", &mut self.blueprint.repo_name),
            ("ES_DOMAIN_NAME", &mut self.blueprint.es_domain_name),
            ("ES_INDEX_NAME", &mut self.blueprint.es_index_name),
            ("ES_TYPE_NAME", &mut self.blueprint.es_type_name),
            ("DELIVERY_STREAM_NAME", &mut self.blueprint.delivery_stream_name),
            ("BACKUP_BUCKET_NAME", &mut self.blueprint.backup_bucket_name),
            ("KIBANA_KEY_NAME", &mut self.blueprint.kibana_key_name),
        ];
        for (suffix, field) in fields {
            if let Some(value) = var(suffix) {
                debug!(variable = %format!("{ENV_PREFIX}{suffix}"), "Applying environment override");
                *field = value;
            }
        }

        let subnets: [(&str, &mut Vec<String>); 2] = [
            ("PRIVATE_SUBNET_IDS", &mut self.blueprint.private_subnet_ids),
            ("PUBLIC_SUBNET_IDS", &mut self.blueprint.public_subnet_ids),
        ];
        for (suffix, field) in subnets {
            if let Some(value) = var(suffix) {
                *field = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }

        if let Some(mode) = var("FAILURE_MODE") {
            self.failure_mode = mode
                .parse()
                .map_err(|reason: String| ConfigError::invalid("failure_mode", reason))?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Returns the deployment target.
    #[must_use]
    pub fn target(&self) -> DeploymentTarget {
        DeploymentTarget::new(&self.account, &self.region)
    }

    /// Checks that required values are usable.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("name", &self.name),
            ("account", &self.account),
            ("region", &self.region),
            ("blueprint.security_group_id", &self.blueprint.security_group_id),
            ("blueprint.repo_name", &self.blueprint.repo_name),
            ("blueprint.es_domain_name", &self.blueprint.es_domain_name),
            ("blueprint.delivery_stream_name", &self.blueprint.delivery_stream_name),
            ("blueprint.backup_bucket_name", &self.blueprint.backup_bucket_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
        }

        if self.blueprint.private_subnet_ids.len() < 2 {
            return Err(ConfigError::invalid(
                "blueprint.private_subnet_ids",
                "the search domain spans two availability zones and needs two private subnets",
            ));
        }
        if self.blueprint.public_subnet_ids.is_empty() {
            return Err(ConfigError::invalid("blueprint.public_subnet_ids", "must not be empty"));
        }

        if !self.account.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::invalid("account", "must be numeric"));
        }

        Ok(())
    }
}
