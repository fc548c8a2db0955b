//! Fargate service whose container logs are routed through Firelens.

use super::{keys, security_groups, tags};
use crate::config::BlueprintConfig;
use crate::errors::StackBuildError;
use crate::resources::{PolicyStatement, Principal, ResourceSpec, RoleSpec};
use crate::stacks::{StackBuilder, StackContext};
use serde_json::json;
use std::sync::Arc;

const CLUSTER_NAME: &str = "KeehyunECSCluster";
const SERVICE_NAME: &str = "KeehyunECSService";
const TASK_FAMILY: &str = "nginx-firelens-test";
const LOG_ROUTER_IMAGE: &str = "amazon/aws-for-fluent-bit:latest";

const ECR_PULL: [&str; 4] = [
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];

const LOG_WRITE: [&str; 4] = [
    "logs:CreateLogStream",
    "logs:CreateLogGroup",
    "logs:PutLogEvents",
    "logs:DescribeLogStreams",
];

const CONTAINER_AGENT: [&str; 9] = [
    "ec2:DescribeTags",
    "ecs:CreateCluster",
    "ecs:DeregisterContainerInstance",
    "ecs:DiscoverPollEndpoint",
    "ecs:Poll",
    "ecs:RegisterContainerInstance",
    "ecs:StartTelemetrySession",
    "ecs:UpdateContainerInstancesState",
    "ecs:Submit*",
];

/// The ECS cluster and its single nginx service.
///
/// Reads the search endpoint from `search` and hands it to the log router.
#[derive(Debug, Clone)]
pub struct EcsStack {
    config: Arc<BlueprintConfig>,
}

impl EcsStack {
    /// Creates the stack.
    #[must_use]
    pub fn new(config: Arc<BlueprintConfig>) -> Self {
        Self { config }
    }
}

fn task_principal() -> Principal {
    Principal::service("ecs-tasks.amazonaws.com")
}

impl StackBuilder for EcsStack {
    fn build(&self, ctx: &mut StackContext) -> Result<(), StackBuildError> {
        let endpoint = ctx.input(keys::VPC_ES_DOMAIN_ENDPOINT)?;
        let region = ctx.target().region.clone();

        let cluster = ctx
            .add_resource(
                ResourceSpec::new(CLUSTER_NAME, "AWS::ECS::Cluster")
                    .with_property("ClusterName", json!(CLUSTER_NAME)),
            )?
            .reference();

        let execution_role = RoleSpec::new("ECSTaskExecutionRole", task_principal())
            .with_statement(PolicyStatement::allow(ECR_PULL.into_iter().chain(LOG_WRITE), ["*"]));
        let execution_role = ctx.add_role("ECSTaskExecutionRole", &execution_role)?.attr("Arn");

        let task_actions = CONTAINER_AGENT
            .into_iter()
            .chain(ECR_PULL)
            .chain(LOG_WRITE)
            .chain(["es:ESHttp*"]);
        let task_role = RoleSpec::new("ECSInstanceRole", task_principal())
            .with_statement(PolicyStatement::allow(task_actions, ["*"]));
        let task_role = ctx.add_role("ECSInstanceRole", &task_role)?.attr("Arn");

        let nginx = json!({
            "Name": "nginx-test",
            "Image": "nginx",
            "Essential": true,
            "MemoryReservation": 100,
            "PortMappings": [{"ContainerPort": 80, "Protocol": "tcp"}],
            "LogConfiguration": {
                "LogDriver": "awsfirelens",
                "Options": {
                    "Name": "cloudwatch",
                    "region": region,
                    "log_group_name": format!("/aws/ecs/containerinsights/{CLUSTER_NAME}/application"),
                    "auto_create_group": "true",
                    "log_stream_name": "nginx-test",
                },
            },
        });
        let log_router = json!({
            "Name": "log_router",
            "Image": LOG_ROUTER_IMAGE,
            "Essential": true,
            "FirelensConfiguration": {"Type": "fluentbit"},
            "Environment": [{"Name": "ES_ENDPOINT", "Value": endpoint.as_str()}],
            "LogConfiguration": {
                "LogDriver": "awslogs",
                "Options": {
                    "awslogs-region": region,
                    "awslogs-stream-prefix": "firelens",
                },
            },
        });

        let task = ctx
            .add_resource(
                ResourceSpec::new("NginxFirelensTest", "AWS::ECS::TaskDefinition").with_properties(json!({
                    "Family": TASK_FAMILY,
                    "Cpu": "512",
                    "Memory": "1024",
                    "NetworkMode": "awsvpc",
                    "RequiresCompatibilities": ["FARGATE"],
                    "ExecutionRoleArn": execution_role.to_json(),
                    "TaskRoleArn": task_role.to_json(),
                    "ContainerDefinitions": [nginx, log_router],
                })),
            )?
            .reference();

        ctx.add_resource(
            ResourceSpec::new(SERVICE_NAME, "AWS::ECS::Service").with_properties(json!({
                "ServiceName": SERVICE_NAME,
                "Cluster": cluster.to_json(),
                "TaskDefinition": task.to_json(),
                "LaunchType": "FARGATE",
                "DesiredCount": 1,
                "EnableECSManagedTags": true,
                "NetworkConfiguration": {
                    "AwsvpcConfiguration": {
                        "AssignPublicIp": "ENABLED",
                        "Subnets": self.config.public_subnet_ids,
                        "SecurityGroups": security_groups(&self.config),
                    }
                },
                "Tags": tags(None),
            })),
        )?;
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

    fn build(producer: &str) -> Result<crate::resources::StackTemplate, StackBuildError> {
        let mut produced = HashMap::new();
        produced.insert(
            ParameterKey::new(keys::VPC_ES_DOMAIN_ENDPOINT).unwrap(),
            ProducedValue {
                producer: producer.to_string(),
                value: ParameterValue::string("vpc-logs-1.us-east-1.es.amazonaws.com"),
            },
        );
        let inputs = StackInputs::new(produced, ["search".to_string(), "auth".to_string()].into(), "ecs");
        let mut ctx = StackContext::new("ecs", DeploymentTarget::new("123456789012", "us-east-1"), inputs);
        EcsStack::new(Arc::new(BlueprintConfig::default())).build(&mut ctx)?;
        Ok(ctx.into_template())
    }

    #[test]
    fn test_log_router_receives_endpoint() {
        let template = build("search").unwrap();
        let task = template.resource("NginxFirelensTest").unwrap();
        let containers = &task.properties["ContainerDefinitions"];

        assert_eq!(containers[0]["LogConfiguration"]["LogDriver"], "awsfirelens");
        assert_eq!(
            containers[0]["LogConfiguration"]["Options"]["log_group_name"],
            "/aws/ecs/containerinsights/KeehyunECSCluster/application"
        );
        assert_eq!(containers[1]["FirelensConfiguration"]["Type"], "fluentbit");
        assert_eq!(
            containers[1]["Environment"][0]["Value"],
            "vpc-logs-1.us-east-1.es.amazonaws.com"
        );
    }

    #[test]
    fn test_service_runs_in_public_subnets() {
        let template = build("search").unwrap();
        let service = template.resource(SERVICE_NAME).unwrap();
        let network = &service.properties["NetworkConfiguration"]["AwsvpcConfiguration"];

        assert_eq!(network["AssignPublicIp"], "ENABLED");
        assert_eq!(network["Subnets"][0], "subnet-public-a");
        assert_eq!(service.properties["DesiredCount"], 1);
    }

    #[test]
    fn test_task_role_can_reach_search() {
        let template = build("search").unwrap();
        let role = template.resource("ECSInstanceRole").unwrap();
        let actions = &role.properties["Policies"][0]["PolicyDocument"]["Statement"][0]["Action"];
        assert_eq!(actions.as_array().unwrap().len(), 18);
        assert!(actions.as_array().unwrap().contains(&json!("es:ESHttp*")));
    }

    #[test]
    fn test_endpoint_from_unrelated_stack_is_rejected() {
        let err = build("firehose").unwrap_err();
        assert!(matches!(err, StackBuildError::UndeclaredDependency(_)));
    }
}
