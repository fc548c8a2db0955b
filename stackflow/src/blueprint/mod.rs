//! The ECS + ELK logging deployment.
//!
//! Five stacks: a container registry, Cognito authentication, a VPC search
//! domain with a Kibana proxy, an ECS service that ships logs through
//! Firelens, and a Firehose delivery stream into the search domain.
//!
//! | Stack | Depends on | Publishes |
//! |---|---|---|
//! | `ecr` | | |
//! | `auth` | | `user-pool-id`, `user-pool-arn`, `identity-pool-id` |
//! | `search` | `auth` | `vpc-es-domain-endpoint` |
//! | `ecs` | `search` | |
//! | `firehose` | `search` | |

mod auth;
mod ecr;
mod ecs;
mod firehose;
mod search;

pub use auth::AuthStack;
pub use ecr::EcrStack;
pub use ecs::EcsStack;
pub use firehose::FirehoseStack;
pub use search::SearchStack;

use crate::config::{BlueprintConfig, DeploymentConfig};
use crate::errors::PlanError;
use crate::plan::{DeploymentPlan, DeploymentPlanBuilder, StackSpec};
use std::sync::Arc;

/// Stack names.
pub mod stacks {
    /// Container registry.
    pub const ECR: &str = "ecr";
    /// Cognito user and identity pools.
    pub const AUTH: &str = "auth";
    /// VPC search domain.
    pub const SEARCH: &str = "search";
    /// ECS cluster and service.
    pub const ECS: &str = "ecs";
    /// Firehose delivery stream.
    pub const FIREHOSE: &str = "firehose";
}

/// Keys exchanged between the stacks.
pub mod keys {
    /// Cognito user pool id.
    pub const USER_POOL_ID: &str = "user-pool-id";
    /// Cognito user pool ARN.
    pub const USER_POOL_ARN: &str = "user-pool-arn";
    /// Cognito identity pool id.
    pub const IDENTITY_POOL_ID: &str = "identity-pool-id";
    /// Endpoint of the VPC search domain.
    pub const VPC_ES_DOMAIN_ENDPOINT: &str = "vpc-es-domain-endpoint";
}

/// Name of the role mapped to the search domain's master user.
pub const ES_ADMIN_ROLE_NAME: &str = "KeehyunCognitoESAdminRole";

/// Value of the `Owner` tag.
const OWNER: &str = "keehyun";

/// Declares the five stacks with their edges and parameter flow.
///
/// # Errors
///
/// Returns an error if a declaration is rejected.
pub fn ecs_elk_plan(config: &DeploymentConfig) -> Result<DeploymentPlanBuilder, PlanError> {
    let blueprint = Arc::new(config.blueprint.clone());
    let mut builder = DeploymentPlanBuilder::new(&config.name);

    builder.declare(StackSpec::new(stacks::ECR, Arc::new(EcrStack::new(blueprint.clone()))))?;
    builder.declare(
        StackSpec::new(stacks::AUTH, Arc::new(AuthStack::new(blueprint.clone())))
            .with_export(keys::USER_POOL_ID)
            .with_export(keys::USER_POOL_ARN)
            .with_export(keys::IDENTITY_POOL_ID),
    )?;
    builder.declare(
        StackSpec::new(stacks::SEARCH, Arc::new(SearchStack::new(blueprint.clone())))
            .with_dependency(stacks::AUTH)
            .with_export(keys::VPC_ES_DOMAIN_ENDPOINT)
            .with_requirement(keys::USER_POOL_ID)
            .with_requirement(keys::IDENTITY_POOL_ID),
    )?;
    builder.declare(
        StackSpec::new(stacks::ECS, Arc::new(EcsStack::new(blueprint.clone())))
            .with_dependency(stacks::SEARCH)
            .with_requirement(keys::VPC_ES_DOMAIN_ENDPOINT),
    )?;
    builder.declare(
        StackSpec::new(stacks::FIREHOSE, Arc::new(FirehoseStack::new(blueprint)))
            .with_dependency(stacks::SEARCH),
    )?;

    Ok(builder)
}

/// Builds the validated plan.
///
/// # Errors
///
/// Returns an error if the plan is invalid.
pub fn ecs_elk_deployment(config: &DeploymentConfig) -> Result<DeploymentPlan, PlanError> {
    ecs_elk_plan(config)?.build()
}

fn tags(name: Option<&str>) -> serde_json::Value {
    let mut tags = vec![serde_json::json!({"Key": "Owner", "Value": OWNER})];
    if let Some(name) = name {
        tags.push(serde_json::json!({"Key": "Name", "Value": name}));
    }
    serde_json::Value::Array(tags)
}

fn security_groups(config: &BlueprintConfig) -> serde_json::Value {
    serde_json::json!([config.security_group_id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::{Deployer, StackStatus};
    use crate::engine::InMemoryEngine;
    use crate::params::{InMemoryParameterStore, ParameterKey, ParameterStore};
    use crate::testing::assert_order_respects_dependencies;
    use pretty_assertions::assert_eq;

    fn config() -> DeploymentConfig {
        DeploymentConfig {
            account: "123456789012".to_string(),
            ..DeploymentConfig::default()
        }
    }

    #[test]
    fn test_plan_shape() {
        let plan = ecs_elk_deployment(&config()).unwrap();

        assert_eq!(plan.name(), "ecs-elk");
        assert_eq!(plan.stack_count(), 5);
        assert_order_respects_dependencies(&plan);
        assert_eq!(plan.dependents_of(stacks::SEARCH), vec![stacks::ECS, stacks::FIREHOSE]);
        assert_eq!(plan.producers().get(keys::IDENTITY_POOL_ID), Some(&stacks::AUTH));
    }

    #[test]
    fn test_synth_all_stacks() {
        let config = config();
        let deployer = Deployer::new(
            ecs_elk_deployment(&config).unwrap(),
            Arc::new(InMemoryEngine::new()),
            Arc::new(InMemoryParameterStore::new()),
            config.target(),
        );

        let templates = deployer.synth().unwrap();
        let names: Vec<&str> = templates.iter().map(|t| t.stack_name.as_str()).collect();
        assert_eq!(names, deployer.plan().deployment_order());

        let search = templates.iter().find(|t| t.stack_name == stacks::SEARCH).unwrap();
        let cognito = &search.to_json()["Resources"]["KeehyunVPCES"]["Properties"]["CognitoOptions"];
        assert_eq!(cognito["UserPoolId"], "${Token[KeehyunUserPool.Ref]}");
    }

    #[tokio::test]
    async fn test_simulated_deployment() {
        let config = config();
        let store = Arc::new(InMemoryParameterStore::new());
        let deployer = Deployer::new(
            ecs_elk_deployment(&config).unwrap(),
            Arc::new(InMemoryEngine::new()),
            store.clone(),
            config.target(),
        );

        let report = deployer.deploy().await;
        assert!(report.succeeded(), "{report:#?}");
        assert_eq!(report.stacks_with_status(StackStatus::Deployed).len(), 5);

        let stored: Vec<String> = store
            .list(&config.target())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.key.to_string())
            .collect();
        assert_eq!(
            stored,
            vec![
                keys::IDENTITY_POOL_ID,
                keys::USER_POOL_ARN,
                keys::USER_POOL_ID,
                keys::VPC_ES_DOMAIN_ENDPOINT,
            ]
        );

        let pool_id = store
            .get(&config.target(), &ParameterKey::new(keys::USER_POOL_ID).unwrap())
            .await
            .unwrap();
        assert!(pool_id.value.as_str().starts_with("us-east-1_"));
    }
}
