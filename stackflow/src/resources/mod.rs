//! Declarative resource descriptions handed to the provisioning engine.
//!
//! This module provides:
//! - `ResourceSpec`, one resource of a stack
//! - `AttributeRef` and `OutputValue` for values only known after provisioning
//! - IAM statements and roles
//! - `StackTemplate`, the unit submitted to the engine

pub mod iam;
mod template;

pub use iam::{Effect, PolicyStatement, Principal, RoleSpec};
pub use template::{ParameterResource, StackOutputSpec, StackTemplate};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute values reported by the engine, keyed by logical id then attribute.
pub type ResolvedAttributes = BTreeMap<String, BTreeMap<String, String>>;

/// The attribute name that stands for a resource's primary reference.
pub const REF_ATTRIBUTE: &str = "Ref";

/// One declared resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Unique id within the stack.
    pub logical_id: String,
    /// Provider type, e.g. `AWS::ECR::Repository`.
    pub resource_type: String,
    /// Provider properties.
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Logical ids of resources in the same stack that must exist first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ResourceSpec {
    /// Creates a resource with no properties.
    #[must_use]
    pub fn new(logical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            properties: serde_json::Map::new(),
            depends_on: Vec::new(),
        }
    }

    /// Sets one property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Merges an object of properties. Non-object values are ignored.
    #[must_use]
    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = properties {
            self.properties.extend(map);
        }
        self
    }

    /// Adds an intra-stack ordering edge.
    #[must_use]
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    /// Refers to one of this resource's attributes.
    #[must_use]
    pub fn attr(&self, attribute: impl Into<String>) -> AttributeRef {
        AttributeRef::new(&self.logical_id, attribute)
    }

    /// Refers to this resource's primary reference.
    #[must_use]
    pub fn reference(&self) -> AttributeRef {
        AttributeRef::new(&self.logical_id, REF_ATTRIBUTE)
    }

    /// Renders the resource in template shape.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "Type": self.resource_type,
            "Properties": self.properties,
        });
        if !self.depends_on.is_empty() {
            body["DependsOn"] = serde_json::json!(self.depends_on);
        }
        body
    }
}

/// A reference to a resource attribute that the engine resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeRef {
    /// The referenced resource.
    pub logical_id: String,
    /// The attribute name, or `Ref`.
    pub attribute: String,
}

impl AttributeRef {
    /// Creates a reference.
    #[must_use]
    pub fn new(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    /// Renders as an intrinsic function.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        if self.attribute == REF_ATTRIBUTE {
            serde_json::json!({ "Ref": self.logical_id })
        } else {
            serde_json::json!({ "Fn::GetAtt": [self.logical_id, self.attribute] })
        }
    }

    /// Looks the attribute up in an engine report.
    #[must_use]
    pub fn resolve<'a>(&self, attributes: &'a ResolvedAttributes) -> Option<&'a str> {
        attributes
            .get(&self.logical_id)
            .and_then(|attrs| attrs.get(&self.attribute))
            .map(String::as_str)
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{Token[{}.{}]}}", self.logical_id, self.attribute)
    }
}

/// A value that is either known at build time or resolved after provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputValue {
    /// Known while building.
    Literal(String),
    /// Known once the engine reports the attribute.
    Attribute(AttributeRef),
}

impl OutputValue {
    /// Renders for a template.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Literal(value) => serde_json::json!(value),
            Self::Attribute(attr) => attr.to_json(),
        }
    }

    /// Resolves against an engine report.
    #[must_use]
    pub fn resolve(&self, attributes: &ResolvedAttributes) -> Option<String> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Attribute(attr) => attr.resolve(attributes).map(str::to_string),
        }
    }
}

impl From<AttributeRef> for OutputValue {
    fn from(attr: AttributeRef) -> Self {
        Self::Attribute(attr)
    }
}

impl From<String> for OutputValue {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for OutputValue {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(value),
            Self::Attribute(attr) => fmt::Display::fmt(attr, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_ref_json() {
        let pool = ResourceSpec::new("UserPool", "AWS::Cognito::UserPool");
        assert_eq!(pool.reference().to_json(), serde_json::json!({"Ref": "UserPool"}));
        assert_eq!(
            pool.attr("Arn").to_json(),
            serde_json::json!({"Fn::GetAtt": ["UserPool", "Arn"]})
        );
        assert_eq!(pool.attr("Arn").to_string(), "${Token[UserPool.Arn]}");
    }

    #[test]
    fn test_output_value_resolve() {
        let mut attrs = ResolvedAttributes::new();
        attrs
            .entry("UserPool".to_string())
            .or_default()
            .insert("Ref".to_string(), "us-east-1_abc".to_string());

        let value = OutputValue::from(AttributeRef::new("UserPool", "Ref"));
        assert_eq!(value.resolve(&attrs), Some("us-east-1_abc".to_string()));

        let missing = OutputValue::from(AttributeRef::new("UserPool", "Arn"));
        assert_eq!(missing.resolve(&attrs), None);

        assert_eq!(OutputValue::from("x").resolve(&attrs), Some("x".to_string()));
    }

    #[test]
    fn test_resource_to_json() {
        let repo = ResourceSpec::new("Repo", "AWS::ECR::Repository")
            .with_properties(serde_json::json!({"RepositoryName": "app"}))
            .depends_on("Other");

        let json = repo.to_json();
        assert_eq!(json["Type"], "AWS::ECR::Repository");
        assert_eq!(json["Properties"]["RepositoryName"], "app");
        assert_eq!(json["DependsOn"][0], "Other");
    }
}
