//! Stack templates: everything the engine needs to provision one stack.

use super::{OutputValue, ResourceSpec};
use crate::params::{ParameterKey, ParameterKind};
use crate::target::DeploymentTarget;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A named stack output, visible in the engine's console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutputSpec {
    /// Output name.
    pub name: String,
    /// Output value.
    pub value: OutputValue,
}

/// A parameter the stack publishes to the shared store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterResource {
    /// The key.
    pub key: ParameterKey,
    /// The value kind.
    #[serde(default)]
    pub kind: ParameterKind,
    /// The value, usually an attribute of one of the stack's resources.
    pub value: OutputValue,
}

impl ParameterResource {
    /// Logical id used when the parameter is rendered as a resource.
    #[must_use]
    pub fn logical_id(&self) -> String {
        let mut id = String::from("Parameter");
        let mut upper = true;
        for c in self.key.as_str().chars() {
            if c.is_ascii_alphanumeric() {
                if upper {
                    id.push(c.to_ascii_uppercase());
                } else {
                    id.push(c);
                }
                upper = false;
            } else {
                upper = true;
            }
        }
        id
    }

    fn to_resource(&self) -> ResourceSpec {
        let ty = match self.kind {
            ParameterKind::String => "String",
            ParameterKind::StringList => "StringList",
        };
        ResourceSpec::new(self.logical_id(), "AWS::SSM::Parameter")
            .with_property("Name", serde_json::json!(self.key.as_str()))
            .with_property("Type", serde_json::json!(ty))
            .with_property("Value", self.value.to_json())
    }
}

/// The declarative description of one stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackTemplate {
    /// Stack name.
    pub stack_name: String,
    /// Where it is deployed.
    pub target: DeploymentTarget,
    /// Stacks that are provisioned before this one.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Declared resources, in declaration order.
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    /// Named outputs.
    #[serde(default)]
    pub outputs: Vec<StackOutputSpec>,
    /// Parameters published to the shared store.
    #[serde(default)]
    pub parameters: Vec<ParameterResource>,
}

impl StackTemplate {
    /// Creates an empty template.
    #[must_use]
    pub fn new(stack_name: impl Into<String>, target: DeploymentTarget) -> Self {
        Self {
            stack_name: stack_name.into(),
            target,
            dependencies: Vec::new(),
            resources: Vec::new(),
            outputs: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Finds a resource by logical id.
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    /// Number of resources, counting published parameters.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len() + self.parameters.len()
    }

    /// Renders the template document.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut resources = serde_json::Map::new();
        for resource in &self.resources {
            resources.insert(resource.logical_id.clone(), resource.to_json());
        }
        for parameter in &self.parameters {
            let resource = parameter.to_resource();
            resources.insert(resource.logical_id.clone(), resource.to_json());
        }

        let outputs: serde_json::Map<String, serde_json::Value> = self
            .outputs
            .iter()
            .map(|o| (o.name.clone(), serde_json::json!({ "Value": o.value.to_json() })))
            .collect();

        serde_json::json!({
            "StackName": self.stack_name,
            "Account": self.target.account,
            "Region": self.target.region,
            "Dependencies": self.dependencies,
            "Resources": resources,
            "Outputs": outputs,
        })
    }

    /// SHA-256 of the rendered document, hex encoded.
    ///
    /// Two templates with the same fingerprint provision identically.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let rendered = self.to_json().to_string();
        hex::encode(Sha256::digest(rendered.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::AttributeRef;

    fn template() -> StackTemplate {
        let mut template = StackTemplate::new("auth", DeploymentTarget::new("1", "us-east-1"));
        template
            .resources
            .push(ResourceSpec::new("UserPool", "AWS::Cognito::UserPool"));
        template.parameters.push(ParameterResource {
            key: ParameterKey::new("user-pool-id").unwrap(),
            kind: ParameterKind::String,
            value: AttributeRef::new("UserPool", "Ref").into(),
        });
        template
    }

    #[test]
    fn test_parameter_logical_id() {
        let template = template();
        assert_eq!(template.parameters[0].logical_id(), "ParameterUserPoolId");
    }

    #[test]
    fn test_to_json_renders_parameters_as_resources() {
        let json = template().to_json();
        let param = &json["Resources"]["ParameterUserPoolId"];

        assert_eq!(param["Type"], "AWS::SSM::Parameter");
        assert_eq!(param["Properties"]["Name"], "user-pool-id");
        assert_eq!(param["Properties"]["Value"], serde_json::json!({"Ref": "UserPool"}));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = template();
        let mut b = template();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.resources.push(ResourceSpec::new("Client", "AWS::Cognito::UserPoolClient"));
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
