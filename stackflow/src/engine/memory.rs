//! In-memory provisioning engine.

use super::{ProvisionReport, ProvisioningEngine};
use crate::errors::ProvisioningError;
use crate::resources::{OutputValue, ResolvedAttributes, ResourceSpec, StackTemplate, REF_ATTRIBUTE};
use crate::target::DeploymentTarget;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

/// A call made against the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `provision` was called for the stack.
    Provision(String),
    /// `destroy` was called for the stack.
    Destroy(String),
}

#[derive(Debug, Clone)]
struct DeployedStack {
    fingerprint: String,
    attributes: ResolvedAttributes,
}

/// Engine that simulates provisioning without touching any cloud.
///
/// Each resource gets a generated physical id and the attributes its type
/// normally exposes. Attributes referenced by the template but not known for
/// the type are derived from the physical id.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    deployed: Mutex<HashMap<(DeploymentTarget, String), DeployedStack>>,
    calls: Mutex<Vec<EngineCall>>,
    failing: Mutex<HashSet<String>>,
}

impl InMemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `provision` of `stack_name` fail.
    pub fn fail_stack(&self, stack_name: impl Into<String>) {
        self.failing.lock().insert(stack_name.into());
    }

    /// Clears a failure set by `fail_stack`.
    pub fn heal_stack(&self, stack_name: &str) {
        self.failing.lock().remove(stack_name);
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Returns true if the stack is currently deployed to `target`.
    #[must_use]
    pub fn is_deployed(&self, target: &DeploymentTarget, stack_name: &str) -> bool {
        self.deployed
            .lock()
            .contains_key(&(target.clone(), stack_name.to_string()))
    }

    /// Returns the names of deployed stacks, sorted.
    #[must_use]
    pub fn deployed_stacks(&self) -> Vec<String> {
        let mut names: Vec<String> = self.deployed.lock().keys().map(|(_, name)| name.clone()).collect();
        names.sort();
        names
    }

    fn simulate(template: &StackTemplate) -> ResolvedAttributes {
        let mut attributes: ResolvedAttributes = template
            .resources
            .iter()
            .map(|resource| (resource.logical_id.clone(), resource_attributes(template, resource)))
            .collect();

        for parameter in &template.parameters {
            let mut attrs = BTreeMap::new();
            attrs.insert(REF_ATTRIBUTE.to_string(), parameter.key.to_string());
            attributes.insert(parameter.logical_id(), attrs);
        }

        let referenced = template
            .outputs
            .iter()
            .map(|o| &o.value)
            .chain(template.parameters.iter().map(|p| &p.value));
        for value in referenced {
            if let OutputValue::Attribute(attr) = value {
                if let Some(attrs) = attributes.get_mut(&attr.logical_id) {
                    let physical = attrs.get(REF_ATTRIBUTE).cloned().unwrap_or_default();
                    attrs
                        .entry(attr.attribute.clone())
                        .or_insert_with(|| format!("{physical}.{}", attr.attribute));
                }
            }
        }

        attributes
    }
}

#[async_trait]
impl ProvisioningEngine for InMemoryEngine {
    async fn provision(&self, template: &StackTemplate) -> Result<ProvisionReport, ProvisioningError> {
        let stack_name = template.stack_name.clone();
        self.calls.lock().push(EngineCall::Provision(stack_name.clone()));

        if self.failing.lock().contains(&stack_name) {
            return Err(ProvisioningError::new(stack_name, "simulated provisioning failure"));
        }

        let fingerprint = template.fingerprint();
        let key = (template.target.clone(), stack_name.clone());
        let mut deployed = self.deployed.lock();

        if let Some(existing) = deployed.get(&key) {
            if existing.fingerprint == fingerprint {
                debug!(stack = %stack_name, "Template unchanged, skipping update");
                return Ok(ProvisionReport {
                    stack_name,
                    attributes: existing.attributes.clone(),
                    unchanged: true,
                    fingerprint,
                });
            }
        }

        let attributes = Self::simulate(template);
        info!(
            stack = %stack_name,
            target = %template.target,
            resources = template.resource_count(),
            "Stack provisioned"
        );
        deployed.insert(
            key,
            DeployedStack {
                fingerprint: fingerprint.clone(),
                attributes: attributes.clone(),
            },
        );

        Ok(ProvisionReport {
            stack_name,
            attributes,
            unchanged: false,
            fingerprint,
        })
    }

    async fn destroy(&self, target: &DeploymentTarget, stack_name: &str) -> Result<(), ProvisioningError> {
        self.calls.lock().push(EngineCall::Destroy(stack_name.to_string()));

        let removed = self
            .deployed
            .lock()
            .remove(&(target.clone(), stack_name.to_string()));
        if removed.is_none() {
            debug!(stack = %stack_name, "Destroy requested for a stack that is not deployed");
        }
        Ok(())
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn resource_attributes(template: &StackTemplate, resource: &ResourceSpec) -> BTreeMap<String, String> {
    let target = &template.target;
    let id = &resource.logical_id;
    let named = |prop: &str| {
        resource
            .properties
            .get(prop)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    };

    let mut attrs = BTreeMap::new();
    let mut put = |name: &str, value: String| {
        attrs.insert(name.to_string(), value);
    };

    match resource.resource_type.as_str() {
        "AWS::Cognito::UserPool" => {
            let pool_id = format!("{}_{}", target.region, short_id());
            put("Arn", target.arn("cognito-idp", &format!("userpool/{pool_id}")));
            put("ProviderName", format!("cognito-idp.{}.amazonaws.com/{pool_id}", target.region));
            put(REF_ATTRIBUTE, pool_id);
        }
        "AWS::Cognito::IdentityPool" => {
            put(REF_ATTRIBUTE, format!("{}:{}", target.region, Uuid::new_v4()));
        }
        "AWS::Elasticsearch::Domain" => {
            let name = named("DomainName").unwrap_or_else(|| id.to_lowercase());
            put("Arn", target.search_domain_arn(&name, None));
            put("DomainArn", target.search_domain_arn(&name, None));
            put(
                "DomainEndpoint",
                format!("vpc-{name}-{}.{}.es.amazonaws.com", short_id(), target.region),
            );
            put(REF_ATTRIBUTE, name);
        }
        "AWS::ECR::Repository" => {
            let name = named("RepositoryName").unwrap_or_else(|| id.to_lowercase());
            put("Arn", target.arn("ecr", &format!("repository/{name}")));
            put(
                "RepositoryUri",
                format!("{}.dkr.ecr.{}.amazonaws.com/{name}", target.account, target.region),
            );
            put(REF_ATTRIBUTE, name);
        }
        "AWS::IAM::Role" => {
            let name = named("RoleName").unwrap_or_else(|| format!("{}-{id}-{}", template.stack_name, short_id()));
            put("Arn", target.role_arn(&name));
            put("RoleId", format!("AROA{}", short_id().to_uppercase()));
            put(REF_ATTRIBUTE, name);
        }
        "AWS::S3::Bucket" => {
            let name = named("BucketName").unwrap_or_else(|| format!("{}-{}", id.to_lowercase(), short_id()));
            put("Arn", crate::target::bucket_arn(&name, None));
            put("DomainName", format!("{name}.s3.amazonaws.com"));
            put(REF_ATTRIBUTE, name);
        }
        other => {
            let physical = format!("{}-{id}-{}", template.stack_name, short_id());
            let service = other.split("::").nth(1).unwrap_or("resource").to_lowercase();
            put("Arn", target.arn(&service, &physical));
            put(REF_ATTRIBUTE, physical);
        }
    }

    attrs
}
