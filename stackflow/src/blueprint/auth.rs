//! Cognito user pool, identity pool and the roles federated through it.

use super::{keys, ES_ADMIN_ROLE_NAME};
use crate::config::BlueprintConfig;
use crate::errors::StackBuildError;
use crate::resources::{PolicyStatement, Principal, ResourceSpec, RoleSpec};
use crate::stacks::{StackBuilder, StackContext};
use serde_json::json;
use std::sync::Arc;

const DOMAIN_PREFIX: &str = "keehyun";

/// Sign-in for the Kibana dashboards.
#[derive(Debug, Clone)]
pub struct AuthStack {
    config: Arc<BlueprintConfig>,
}

impl AuthStack {
    /// Creates the stack.
    #[must_use]
    pub fn new(config: Arc<BlueprintConfig>) -> Self {
        Self { config }
    }
}

impl StackBuilder for AuthStack {
    fn build(&self, ctx: &mut StackContext) -> Result<(), StackBuildError> {
        let pool = ctx
            .add_resource(
                ResourceSpec::new("KeehyunUserPool", "AWS::Cognito::UserPool").with_properties(json!({
                    "UsernameAttributes": ["email"],
                    "AutoVerifiedAttributes": ["email"],
                    "Policies": {
                        "PasswordPolicy": {
                            "MinimumLength": 8,
                            "RequireLowercase": true,
                            "RequireNumbers": true,
                            "RequireUppercase": false,
                            "RequireSymbols": false,
                            "TemporaryPasswordValidityDays": 3,
                        }
                    },
                    "AccountRecoverySetting": {
                        "RecoveryMechanisms": [{"Name": "verified_email", "Priority": 1}]
                    },
                })),
            )?
            .clone();

        let client = ctx
            .add_resource(
                ResourceSpec::new("KeehyunUserPoolAppClient", "AWS::Cognito::UserPoolClient").with_properties(
                    json!({
                        "UserPoolId": pool.reference().to_json(),
                        "GenerateSecret": false,
                    }),
                ),
            )?
            .reference();

        ctx.add_resource(
            ResourceSpec::new("KeehyunUserPoolDomain", "AWS::Cognito::UserPoolDomain").with_properties(json!({
                "UserPoolId": pool.reference().to_json(),
                "Domain": DOMAIN_PREFIX,
            })),
        )?;

        let identity_pool = ctx
            .add_resource(
                ResourceSpec::new("KeehyunIdentityPool", "AWS::Cognito::IdentityPool").with_properties(json!({
                    "AllowUnauthenticatedIdentities": false,
                    "CognitoIdentityProviders": [{
                        "ClientId": client.to_json(),
                        "ProviderName": pool.attr("ProviderName").to_json(),
                    }],
                })),
            )?
            .reference();
        let pool_ref = identity_pool.to_json();

        let unauthenticated = RoleSpec::new(
            "KeehyunCognitoDefaultUnauthenticatedRole",
            Principal::identity_pool(&pool_ref, "unauthenticated"),
        )
        .with_statement(PolicyStatement::allow(["mobileanalytics:PutEvents", "cognito-sync:*"], ["*"]));
        let unauthenticated = ctx.add_role("KeehyunCognitoDefaultUnauthenticatedRole", &unauthenticated)?.attr("Arn");

        let authenticated = RoleSpec::new(
            "KeehyunCognitoDefaultAuthenticatedRole",
            Principal::identity_pool(&pool_ref, "authenticated"),
        )
        .with_statement(PolicyStatement::allow(
            ["mobileanalytics:PutEvents", "cognito-sync:*", "cognito-identity:*"],
            ["*"],
        ));
        let authenticated = ctx.add_role("KeehyunCognitoDefaultAuthenticatedRole", &authenticated)?.attr("Arn");

        let domain_paths = ctx.target().search_domain_arn(&self.config.es_domain_name, Some("*"));
        let admin = RoleSpec::new(ES_ADMIN_ROLE_NAME, Principal::identity_pool(&pool_ref, "authenticated"))
            .with_statement(PolicyStatement::allow(["es:ESHttp*"], [domain_paths]));
        let admin = ctx.add_role(ES_ADMIN_ROLE_NAME, &admin)?.attr("Arn");

        ctx.add_resource(
            ResourceSpec::new("DefaultValid", "AWS::Cognito::IdentityPoolRoleAttachment").with_properties(json!({
                "IdentityPoolId": pool_ref,
                "Roles": {
                    "unauthenticated": unauthenticated.to_json(),
                    "authenticated": authenticated.to_json(),
                },
            })),
        )?;

        ctx.add_resource(
            ResourceSpec::new("ESAdminGroup", "AWS::Cognito::UserPoolGroup").with_properties(json!({
                "GroupName": "ESAdmin",
                "UserPoolId": pool.reference().to_json(),
                "Precedence": 0,
                "RoleArn": admin.to_json(),
            })),
        )?;

        ctx.add_output("UserPoolID", pool.reference());
        ctx.add_output("AppClientID", client);

        ctx.publish_parameter(keys::USER_POOL_ID, pool.reference())?;
        ctx.publish_parameter(keys::USER_POOL_ARN, pool.attr("Arn"))?;
        ctx.publish_parameter(keys::IDENTITY_POOL_ID, identity_pool)?;
        Ok(())
    }
}
