//! Firehose delivery stream into the search domain, backed up to S3.

use super::{security_groups, tags};
use crate::config::BlueprintConfig;
use crate::errors::StackBuildError;
use crate::resources::{PolicyStatement, Principal, ResourceSpec, RoleSpec};
use crate::stacks::{StackBuilder, StackContext};
use crate::target::{bucket_arn, DeploymentTarget};
use serde_json::json;
use std::sync::Arc;

const DELIVERY_ROLE: &str = "KinesisFirehoseDeliveryRole";
const S3_LOG_STREAM: &str = "S3Delivery";
const ES_LOG_STREAM: &str = "ElasticsearchDelivery";

/// The delivery stream, its role, log group and backup bucket.
#[derive(Debug, Clone)]
pub struct FirehoseStack {
    config: Arc<BlueprintConfig>,
}

impl FirehoseStack {
    /// Creates the stack.
    #[must_use]
    pub fn new(config: Arc<BlueprintConfig>) -> Self {
        Self { config }
    }

    fn log_group_name(&self) -> String {
        format!("/aws/kinesisfirehose/{}", self.config.delivery_stream_name)
    }

    fn delivery_role(&self, target: &DeploymentTarget) -> RoleSpec {
        let config = &self.config;
        let domain = |path: Option<&str>| target.search_domain_arn(&config.es_domain_name, path);
        let index = &config.es_index_name;

        let read_paths = [
            "_all/_settings".to_string(),
            "_cluster/stats".to_string(),
            format!("{index}*/_mapping/{index}"),
            "_nodes".to_string(),
            "_nodes/stats".to_string(),
            "_nodes/*/stats".to_string(),
            "_stats".to_string(),
            format!("{index}*/_stats"),
        ];

        RoleSpec::new(DELIVERY_ROLE, Principal::service("firehose.amazonaws.com"))
            .with_statement(PolicyStatement::allow(
                [
                    "ec2:DescribeVpcs",
                    "ec2:DescribeVpcAttribute",
                    "ec2:DescribeSubnets",
                    "ec2:DescribeSecurityGroups",
                    "ec2:DescribeNetworkInterfaces",
                    "ec2:CreateNetworkInterface",
                    "ec2:CreateNetworkInterfacePermission",
                    "ec2:DeleteNetworkInterface",
                ],
                ["*"],
            ))
            .with_statement(PolicyStatement::allow(
                [
                    "s3:AbortMultipartUpload",
                    "s3:GetBucketLocation",
                    "s3:GetObject",
                    "s3:ListBucket",
                    "s3:ListBucketMultipartUploads",
                    "s3:PutObject",
                ],
                [
                    bucket_arn(&config.backup_bucket_name, None),
                    bucket_arn(&config.backup_bucket_name, Some("*")),
                ],
            ))
            .with_statement(PolicyStatement::allow(
                [
                    "es:DescribeElasticsearchDomain",
                    "es:DescribeElasticsearchDomains",
                    "es:DescribeElasticsearchDomainConfig",
                    "es:ESHttpPost",
                    "es:ESHttpPut",
                ],
                [domain(None), domain(Some("*"))],
            ))
            .with_statement(PolicyStatement::allow(
                ["es:ESHttpGet"],
                read_paths.iter().map(|path| domain(Some(path.as_str()))),
            ))
            .with_statement(PolicyStatement::allow(
                [
                    "kinesis:DescribeStream",
                    "kinesis:GetShardIterator",
                    "kinesis:GetRecords",
                    "kinesis:ListShards",
                ],
                [target.arn("kinesis", &format!("stream/{}", config.delivery_stream_name))],
            ))
            .with_statement(PolicyStatement::allow(
                ["logs:PutLogEvents"],
                [target.arn("logs", &format!("log-group{}:log-stream:*", self.log_group_name()))],
            ))
    }
}

impl StackBuilder for FirehoseStack {
    fn build(&self, ctx: &mut StackContext) -> Result<(), StackBuildError> {
        let config = &self.config;
        let log_group = self.log_group_name();

        ctx.add_resource(
            ResourceSpec::new("KinesisFirehoseLogGroup", "AWS::Logs::LogGroup")
                .with_property("LogGroupName", json!(log_group)),
        )?;
        for (logical_id, stream) in [("S3LogStream", S3_LOG_STREAM), ("ESLogStream", ES_LOG_STREAM)] {
            ctx.add_resource(
                ResourceSpec::new(logical_id, "AWS::Logs::LogStream")
                    .with_properties(json!({"LogGroupName": log_group, "LogStreamName": stream}))
                    .depends_on("KinesisFirehoseLogGroup"),
            )?;
        }

        let bucket = ctx
            .add_resource(
                ResourceSpec::new("FirehoseBackupBucket", "AWS::S3::Bucket")
                    .with_property("BucketName", json!(config.backup_bucket_name)),
            )?
            .attr("Arn");

        let role = self.delivery_role(ctx.target());
        let role = ctx.add_role(DELIVERY_ROLE, &role)?.attr("Arn");

        let logging = |stream: &str| json!({"Enabled": true, "LogGroupName": log_group, "LogStreamName": stream});
        let domain_arn = ctx.target().search_domain_arn(&config.es_domain_name, None);

        ctx.add_resource(
            ResourceSpec::new("KeehyunFirehose", "AWS::KinesisFirehose::DeliveryStream")
                .with_properties(json!({
                    "DeliveryStreamName": config.delivery_stream_name,
                    "DeliveryStreamType": "DirectPut",
                    "ElasticsearchDestinationConfiguration": {
                        "IndexName": config.es_index_name,
                        "RoleARN": role.to_json(),
                        "IndexRotationPeriod": "OneHour",
                        "S3BackupMode": "AllDocuments",
                        "S3Configuration": {
                            "BucketARN": bucket.to_json(),
                            "RoleARN": role.to_json(),
                            "CloudWatchLoggingOptions": logging(S3_LOG_STREAM),
                        },
                        "DomainARN": domain_arn,
                        "VpcConfiguration": {
                            "RoleARN": role.to_json(),
                            "SecurityGroupIds": security_groups(config),
                            "SubnetIds": config.private_subnet_ids,
                        },
                        "CloudWatchLoggingOptions": logging(ES_LOG_STREAM),
                    },
                    "Tags": tags(None),
                }))
                .depends_on(DELIVERY_ROLE),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::StackInputs;
    use pretty_assertions::assert_eq;

    fn build() -> crate::resources::StackTemplate {
        let mut ctx = StackContext::new(
            "firehose",
            DeploymentTarget::new("123456789012", "us-east-1"),
            StackInputs::default(),
        );
        FirehoseStack::new(Arc::new(BlueprintConfig::default()))
            .build(&mut ctx)
            .unwrap();
        ctx.into_template()
    }

    #[test]
    fn test_delivery_stream() {
        let template = build();
        let stream = template.resource("KeehyunFirehose").unwrap();
        let destination = &stream.properties["ElasticsearchDestinationConfiguration"];

        assert_eq!(stream.properties["DeliveryStreamName"], "keehyun-firehose");
        assert_eq!(destination["IndexName"], "firehose");
        assert_eq!(destination["IndexRotationPeriod"], "OneHour");
        assert_eq!(
            destination["DomainARN"],
            "arn:aws:es:us-east-1:123456789012:domain/keehyun-vpc-es"
        );
        assert_eq!(
            destination["CloudWatchLoggingOptions"]["LogGroupName"],
            "/aws/kinesisfirehose/keehyun-firehose"
        );
        assert_eq!(stream.depends_on, vec![DELIVERY_ROLE]);
        assert_eq!(stream.properties["Tags"][0]["Value"], "keehyun");
    }

    #[test]
    fn test_delivery_role_statements() {
        let template = build();
        let role = template.resource(DELIVERY_ROLE).unwrap();
        let statements = role.properties["Policies"][0]["PolicyDocument"]["Statement"]
            .as_array()
            .unwrap()
            .clone();

        assert_eq!(statements.len(), 6);
        assert_eq!(statements[1]["Resource"][1], "arn:aws:s3:::firehose-log-storage/*");
        assert_eq!(
            statements[3]["Resource"][2],
            "arn:aws:es:us-east-1:123456789012:domain/keehyun-vpc-es/firehose*/_mapping/firehose"
        );
        assert_eq!(
            statements[5]["Resource"],
            "arn:aws:logs:us-east-1:123456789012:log-group/aws/kinesisfirehose/keehyun-firehose:log-stream:*"
        );
    }

    #[test]
    fn test_reads_no_parameters() {
        let template = build();
        assert!(template.parameters.is_empty());
        assert_eq!(template.resources.len(), 6);
    }
}
