//! VPC search domain behind Cognito, with a proxy instance for Kibana.

use super::{keys, security_groups, tags, ES_ADMIN_ROLE_NAME};
use crate::config::BlueprintConfig;
use crate::errors::StackBuildError;
use crate::resources::iam::policy_document;
use crate::resources::{PolicyStatement, Principal, ResourceSpec, RoleSpec};
use crate::stacks::{StackBuilder, StackContext};
use serde_json::json;
use std::sync::Arc;

const ENGINE_VERSION: &str = "7.7";
const NODE_TYPE: &str = "r5.large.elasticsearch";
const MASTER_NODES: u32 = 3;
const DATA_NODES: u32 = 4;
const PROXY_INSTANCE_TYPE: &str = "t3.medium";
const AMAZON_LINUX_2: &str = "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2}}";

/// Log streams shipped by the domain.
const LOG_TYPES: [(&str, &str); 4] = [
    ("ES_APPLICATION_LOGS", "application"),
    ("AUDIT_LOGS", "audit"),
    ("INDEX_SLOW_LOGS", "index-slow"),
    ("SEARCH_SLOW_LOGS", "search-slow"),
];

/// The search domain.
///
/// Reads the user pool and identity pool ids from `auth` and publishes the
/// domain endpoint.
#[derive(Debug, Clone)]
pub struct SearchStack {
    config: Arc<BlueprintConfig>,
}

impl SearchStack {
    /// Creates the stack.
    #[must_use]
    pub fn new(config: Arc<BlueprintConfig>) -> Self {
        Self { config }
    }

    fn log_publishing(&self, ctx: &StackContext) -> serde_json::Value {
        let mut options = serde_json::Map::new();
        for (kind, suffix) in LOG_TYPES {
            let group = format!(
                "log-group:/aws/aes/domains/{}/{suffix}-logs",
                self.config.es_domain_name
            );
            options.insert(
                kind.to_string(),
                json!({
                    "Enabled": true,
                    "CloudWatchLogsLogGroupArn": ctx.target().arn("logs", &group),
                }),
            );
        }
        serde_json::Value::Object(options)
    }
}

impl StackBuilder for SearchStack {
    fn build(&self, ctx: &mut StackContext) -> Result<(), StackBuildError> {
        let user_pool_id = ctx.input(keys::USER_POOL_ID)?;
        let identity_pool_id = ctx.input(keys::IDENTITY_POOL_ID)?;
        let config = &self.config;

        let cognito_role = RoleSpec::new("KeehyunCognitoVPCESRole", Principal::service("es.amazonaws.com"))
            .with_managed_policy("AmazonESCognitoAccess");
        let cognito_role = ctx.add_role("KeehyunCognitoVPCESRole", &cognito_role)?.attr("Arn");

        let admin_arn = ctx.target().role_arn(ES_ADMIN_ROLE_NAME);
        let access_policy = PolicyStatement::allow(
            ["es:*"],
            [ctx.target().search_domain_arn(&config.es_domain_name, Some("*"))],
        )
        .with_principal(Principal::arn(admin_arn.clone()));

        let log_publishing = self.log_publishing(ctx);
        let domain = ctx
            .add_resource(
                ResourceSpec::new("KeehyunVPCES", "AWS::Elasticsearch::Domain")
                    .with_properties(json!({
                        "DomainName": config.es_domain_name,
                        "ElasticsearchVersion": ENGINE_VERSION,
                        "DomainEndpointOptions": {"EnforceHTTPS": true},
                        "NodeToNodeEncryptionOptions": {"Enabled": true},
                        "EncryptionAtRestOptions": {"Enabled": true},
                        "AdvancedSecurityOptions": {
                            "Enabled": true,
                            "InternalUserDatabaseEnabled": false,
                            "MasterUserOptions": {"MasterUserARN": admin_arn},
                        },
                        "CognitoOptions": {
                            "Enabled": true,
                            "UserPoolId": user_pool_id.as_str(),
                            "IdentityPoolId": identity_pool_id.as_str(),
                            "RoleArn": cognito_role.to_json(),
                        },
                        "VPCOptions": {
                            "SubnetIds": config.private_subnet_ids,
                            "SecurityGroupIds": security_groups(config),
                        },
                        "ElasticsearchClusterConfig": {
                            "DedicatedMasterEnabled": true,
                            "DedicatedMasterType": NODE_TYPE,
                            "DedicatedMasterCount": MASTER_NODES,
                            "InstanceType": NODE_TYPE,
                            "InstanceCount": DATA_NODES,
                            "ZoneAwarenessEnabled": true,
                            "ZoneAwarenessConfig": {"AvailabilityZoneCount": 2},
                        },
                        "LogPublishingOptions": log_publishing,
                        "AccessPolicies": policy_document(&[access_policy]),
                        "Tags": tags(None),
                    }))
                    .depends_on("KeehyunCognitoVPCESRole"),
            )?
            .attr("DomainEndpoint");

        let subnet = config.public_subnet_ids.first().cloned().unwrap_or_default();
        ctx.add_resource(
            ResourceSpec::new("KibanaProxyInstance", "AWS::EC2::Instance").with_properties(json!({
                "InstanceType": PROXY_INSTANCE_TYPE,
                "ImageId": AMAZON_LINUX_2,
                "KeyName": config.kibana_key_name,
                "SubnetId": subnet,
                "SecurityGroupIds": security_groups(config),
                "Tags": tags(Some("KibanaProxyInstance")),
            })),
        )?;

        ctx.add_output("Output", domain.clone());
        ctx.publish_parameter(keys::VPC_ES_DOMAIN_ENDPOINT, domain)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterKey, ParameterValue};
    use crate::stacks::{ProducedValue, StackInputs};
    use crate::target::DeploymentTarget;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn inputs(with_pools: bool) -> StackInputs {
        let mut produced = HashMap::new();
        if with_pools {
            for (key, value) in [(keys::USER_POOL_ID, "us-east-1_abc"), (keys::IDENTITY_POOL_ID, "us-east-1:id")] {
                produced.insert(
                    ParameterKey::new(key).unwrap(),
                    ProducedValue {
                        producer: "auth".to_string(),
                        value: ParameterValue::string(value),
                    },
                );
            }
        }
        StackInputs::new(produced, ["auth".to_string()].into(), "search")
    }

    fn build(with_pools: bool) -> Result<crate::resources::StackTemplate, StackBuildError> {
        let mut ctx = StackContext::new(
            "search",
            DeploymentTarget::new("123456789012", "us-east-1"),
            inputs(with_pools),
        );
        SearchStack::new(Arc::new(BlueprintConfig::default())).build(&mut ctx)?;
        Ok(ctx.into_template())
    }

    #[test]
    fn test_domain_uses_pool_ids() {
        let template = build(true).unwrap();
        let domain = template.resource("KeehyunVPCES").unwrap();

        assert_eq!(domain.properties["CognitoOptions"]["UserPoolId"], "us-east-1_abc");
        assert_eq!(domain.properties["CognitoOptions"]["IdentityPoolId"], "us-east-1:id");
        assert_eq!(
            domain.properties["AdvancedSecurityOptions"]["MasterUserOptions"]["MasterUserARN"],
            "arn:aws:iam::123456789012:role/KeehyunCognitoESAdminRole"
        );
        assert_eq!(domain.properties["ElasticsearchClusterConfig"]["InstanceCount"], 4);
        assert_eq!(domain.properties["VPCOptions"]["SubnetIds"][1], "subnet-private-b");
        assert_eq!(
            domain.properties["LogPublishingOptions"].as_object().unwrap().len(),
            4
        );
    }

    #[test]
    fn test_publishes_endpoint() {
        let template = build(true).unwrap();
        assert_eq!(template.parameters[0].key.as_str(), keys::VPC_ES_DOMAIN_ENDPOINT);
        assert_eq!(template.parameters[0].value.to_string(), "${Token[KeehyunVPCES.DomainEndpoint]}");

        let proxy = template.resource("KibanaProxyInstance").unwrap();
        assert_eq!(proxy.properties["SubnetId"], "subnet-public-a");
        assert_eq!(proxy.properties["KeyName"], "eksworkshop");
    }

    #[test]
    fn test_missing_pool_id_fails() {
        let err = build(false).unwrap_err();
        assert!(matches!(err, StackBuildError::ParameterNotFound(ref e) if e.key == keys::USER_POOL_ID));
    }
}
