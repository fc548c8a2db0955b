//! IAM policy statements, principals and roles.

use super::ResourceSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a statement grants or denies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Effect {
    /// Grant the actions.
    #[default]
    Allow,
    /// Deny the actions.
    Deny,
}

impl Effect {
    fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
        }
    }
}

/// Who a statement or trust policy applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    /// A service principal such as `ecs-tasks.amazonaws.com`.
    Service(String),
    /// An identity provider, assumed with a web identity and conditions.
    Federated {
        /// The provider, e.g. `cognito-identity.amazonaws.com`.
        provider: String,
        /// Condition block of the trust policy.
        conditions: serde_json::Value,
        /// The assume-role action.
        assume_role_action: String,
    },
    /// A role or user ARN.
    Arn(String),
}

impl Principal {
    /// Service principal shorthand.
    #[must_use]
    pub fn service(name: impl Into<String>) -> Self {
        Self::Service(name.into())
    }

    /// ARN principal shorthand.
    #[must_use]
    pub fn arn(arn: impl Into<String>) -> Self {
        Self::Arn(arn.into())
    }

    /// Identity pool principal restricted to one pool and one `amr` value
    /// (`authenticated` or `unauthenticated`).
    #[must_use]
    pub fn identity_pool(pool_ref: &serde_json::Value, amr: &str) -> Self {
        Self::Federated {
            provider: "cognito-identity.amazonaws.com".to_string(),
            conditions: serde_json::json!({
                "StringEquals": { "cognito-identity.amazonaws.com:aud": pool_ref },
                "ForAnyValue:StringLike": { "cognito-identity.amazonaws.com:amr": amr },
            }),
            assume_role_action: "sts:AssumeRoleWithWebIdentity".to_string(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Service(_) => "Service",
            Self::Federated { .. } => "Federated",
            Self::Arn(_) => "AWS",
        }
    }

    fn id(&self) -> &str {
        match self {
            Self::Service(s) | Self::Arn(s) => s,
            Self::Federated { provider, .. } => provider,
        }
    }

    /// The trust policy statement that lets this principal assume a role.
    #[must_use]
    pub fn assume_role_statement(&self) -> serde_json::Value {
        let mut principal = serde_json::Map::new();
        principal.insert(self.kind().to_string(), serde_json::json!(self.id()));
        let mut statement = serde_json::json!({
            "Effect": "Allow",
            "Principal": principal,
        });
        match self {
            Self::Federated {
                conditions,
                assume_role_action,
                ..
            } => {
                statement["Action"] = serde_json::json!(assume_role_action);
                statement["Condition"] = conditions.clone();
            }
            _ => statement["Action"] = serde_json::json!("sts:AssumeRole"),
        }
        statement
    }
}

/// One statement of a policy document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Allow or deny.
    pub effect: Effect,
    /// Actions such as `es:ESHttp*`.
    pub actions: Vec<String>,
    /// Resource ARNs or `*`.
    pub resources: Vec<String>,
    /// Principals, for resource-based policies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub principals: Vec<Principal>,
    /// Condition block, e.g. `{"StringEquals": {...}}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<serde_json::Value>,
}

impl PolicyStatement {
    /// An `Allow` statement for `actions` on `resources`.
    #[must_use]
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
            principals: Vec::new(),
            conditions: None,
        }
    }

    /// Adds a principal.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.push(principal);
        self
    }

    /// Sets the condition block.
    #[must_use]
    pub fn with_conditions(mut self, conditions: serde_json::Value) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Renders the statement in policy document shape.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut statement = serde_json::json!({
            "Effect": self.effect.as_str(),
            "Action": collapse(&self.actions),
            "Resource": collapse(&self.resources),
        });
        if !self.principals.is_empty() {
            let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
            for principal in &self.principals {
                grouped
                    .entry(principal.kind())
                    .or_default()
                    .push(principal.id().to_string());
            }
            let principal: serde_json::Map<String, serde_json::Value> = grouped
                .into_iter()
                .map(|(kind, ids)| (kind.to_string(), collapse(&ids)))
                .collect();
            statement["Principal"] = serde_json::Value::Object(principal);
        }
        if let Some(conditions) = &self.conditions {
            statement["Condition"] = conditions.clone();
        }
        statement
    }
}

/// Renders a full policy document from statements.
#[must_use]
pub fn policy_document(statements: &[PolicyStatement]) -> serde_json::Value {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": statements.iter().map(PolicyStatement::to_json).collect::<Vec<_>>(),
    })
}

fn collapse(items: &[String]) -> serde_json::Value {
    match items {
        [single] => serde_json::json!(single),
        many => serde_json::json!(many),
    }
}

/// An IAM role with a trust principal, inline statements and managed policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    /// Physical role name.
    pub role_name: String,
    /// Who may assume the role.
    pub assumed_by: Principal,
    /// Inline policy statements.
    #[serde(default)]
    pub statements: Vec<PolicyStatement>,
    /// Managed policy names.
    #[serde(default)]
    pub managed_policies: Vec<String>,
}

impl RoleSpec {
    /// Creates a role.
    #[must_use]
    pub fn new(role_name: impl Into<String>, assumed_by: Principal) -> Self {
        Self {
            role_name: role_name.into(),
            assumed_by,
            statements: Vec::new(),
            managed_policies: Vec::new(),
        }
    }

    /// Adds an inline statement.
    #[must_use]
    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Attaches a provider managed policy by name.
    #[must_use]
    pub fn with_managed_policy(mut self, name: impl Into<String>) -> Self {
        self.managed_policies.push(name.into());
        self
    }

    /// Renders the role as a declarative resource.
    #[must_use]
    pub fn to_resource(&self, logical_id: impl Into<String>) -> ResourceSpec {
        let mut resource = ResourceSpec::new(logical_id, "AWS::IAM::Role")
            .with_property("RoleName", serde_json::json!(self.role_name))
            .with_property(
                "AssumeRolePolicyDocument",
                serde_json::json!({
                    "Version": "2012-10-17",
                    "Statement": [self.assumed_by.assume_role_statement()],
                }),
            );

        if !self.statements.is_empty() {
            resource = resource.with_property(
                "Policies",
                serde_json::json!([{
                    "PolicyName": format!("{}DefaultPolicy", self.role_name),
                    "PolicyDocument": policy_document(&self.statements),
                }]),
            );
        }
        if !self.managed_policies.is_empty() {
            let arns: Vec<String> = self
                .managed_policies
                .iter()
                .map(|name| format!("arn:aws:iam::aws:policy/{name}"))
                .collect();
            resource = resource.with_property("ManagedPolicyArns", serde_json::json!(arns));
        }
        resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_statement_collapses_single_items() {
        let statement = PolicyStatement::allow(["es:ESHttp*"], ["*"]);
        assert_eq!(
            statement.to_json(),
            serde_json::json!({"Effect": "Allow", "Action": "es:ESHttp*", "Resource": "*"})
        );
    }

    #[test]
    fn test_statement_with_arn_principal() {
        let statement = PolicyStatement::allow(["es:*"], ["arn:domain/*"])
            .with_principal(Principal::arn("arn:aws:iam::1:role/Admin"));
        let json = statement.to_json();
        assert_eq!(json["Principal"]["AWS"], "arn:aws:iam::1:role/Admin");
    }

    #[test]
    fn test_statement_with_conditions() {
        let statement = PolicyStatement::allow(["s3:PutObject"], ["arn:aws:s3:::logs/*"])
            .with_conditions(serde_json::json!({"Bool": {"aws:SecureTransport": "true"}}));
        let json = statement.to_json();
        assert_eq!(json["Condition"]["Bool"]["aws:SecureTransport"], "true");
        assert!(PolicyStatement::allow(["s3:GetObject"], ["*"]).to_json().get("Condition").is_none());
    }

    #[test]
    fn test_federated_trust_statement() {
        let principal = Principal::identity_pool(&serde_json::json!({"Ref": "IdentityPool"}), "authenticated");
        let trust = principal.assume_role_statement();

        assert_eq!(trust["Action"], "sts:AssumeRoleWithWebIdentity");
        assert_eq!(trust["Principal"]["Federated"], "cognito-identity.amazonaws.com");
        assert_eq!(
            trust["Condition"]["ForAnyValue:StringLike"]["cognito-identity.amazonaws.com:amr"],
            "authenticated"
        );
    }

    #[test]
    fn test_role_to_resource() {
        let role = RoleSpec::new("ECSTaskExecutionRole", Principal::service("ecs-tasks.amazonaws.com"))
            .with_statement(PolicyStatement::allow(["logs:PutLogEvents"], ["*"]))
            .with_managed_policy("AmazonESCognitoAccess");

        let resource = role.to_resource("ExecutionRole");
        assert_eq!(resource.resource_type, "AWS::IAM::Role");
        assert_eq!(resource.properties["RoleName"], "ECSTaskExecutionRole");
        assert_eq!(
            resource.properties["ManagedPolicyArns"][0],
            "arn:aws:iam::aws:policy/AmazonESCognitoAccess"
        );
        assert_eq!(
            resource.properties["AssumeRolePolicyDocument"]["Statement"][0]["Action"],
            "sts:AssumeRole"
        );
    }
}
