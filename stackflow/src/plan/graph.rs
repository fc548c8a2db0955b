//! Validated deployment plans.

use super::StackSpec;
use crate::errors::{codes, ContractErrorInfo, PlanError};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A validated, acyclic set of stacks with a fixed deployment order.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// The deployment name.
    name: String,
    /// Stack specifications.
    stacks: HashMap<String, StackSpec>,
    /// Deployment order (topologically sorted).
    deployment_order: Vec<String>,
}

impl DeploymentPlan {
    pub(crate) fn new(name: String, stacks: HashMap<String, StackSpec>, deployment_order: Vec<String>) -> Self {
        Self {
            name,
            stacks,
            deployment_order,
        }
    }

    /// Returns the deployment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stacks.
    #[must_use]
    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }

    /// Returns the deployment order.
    #[must_use]
    pub fn deployment_order(&self) -> &[String] {
        &self.deployment_order
    }

    /// Returns the teardown order: the deployment order reversed.
    #[must_use]
    pub fn teardown_order(&self) -> Vec<String> {
        self.deployment_order.iter().rev().cloned().collect()
    }

    /// Returns a stack by name.
    #[must_use]
    pub fn stack(&self, name: &str) -> Option<&StackSpec> {
        self.stacks.get(name)
    }

    /// Returns the direct dependencies of a stack.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.stacks
            .get(name)
            .map_or(&[], |spec| spec.dependencies.as_slice())
    }

    /// Returns every stack that must be deployed before `name`.
    #[must_use]
    pub fn transitive_dependencies(&self, name: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = self.dependencies_of(name).iter().map(String::as_str).collect();

        while let Some(current) = stack.pop() {
            if seen.insert(current.to_string()) {
                stack.extend(self.dependencies_of(current).iter().map(String::as_str));
            }
        }
        seen
    }

    /// Returns the stacks that directly depend on `name`, in deployment order.
    #[must_use]
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.deployment_order
            .iter()
            .filter(|other| self.stacks[other.as_str()].depends_on(name))
            .map(String::as_str)
            .collect()
    }

    /// Maps each declared export key to the stack that publishes it.
    #[must_use]
    pub fn producers(&self) -> BTreeMap<&str, &str> {
        let mut producers = BTreeMap::new();
        for name in &self.deployment_order {
            for key in &self.stacks[name].exports {
                producers.entry(key.as_str()).or_insert(name.as_str());
            }
        }
        producers
    }

    /// Checks the declared parameter flow against the dependency edges.
    ///
    /// # Errors
    ///
    /// Returns an error if two stacks export the same key, a required key has
    /// no producer, or the producer is not a transitive dependency of the
    /// reader.
    pub fn validate_parameter_flow(&self) -> Result<(), PlanError> {
        let mut producers: HashMap<&str, &str> = HashMap::new();
        for name in &self.deployment_order {
            for key in &self.stacks[name].exports {
                if let Some(existing) = producers.insert(key.as_str(), name.as_str()) {
                    return Err(PlanError::new(format!(
                        "Parameter '{key}' is exported by both '{existing}' and '{name}'"
                    ))
                    .with_stacks(vec![existing.to_string(), name.clone()])
                    .with_error_info(
                        ContractErrorInfo::new(codes::EXPORT_CONFLICT, format!("Duplicate export '{key}'"))
                            .with_fix_hint("Each parameter key must have exactly one owning stack.")
                            .with_context_entry("key", key.as_str()),
                    ));
                }
            }
        }

        for name in &self.deployment_order {
            let spec = &self.stacks[name];
            if spec.requires.is_empty() {
                continue;
            }
            let upstream = self.transitive_dependencies(name);

            for key in &spec.requires {
                let Some(producer) = producers.get(key.as_str()) else {
                    return Err(PlanError::new(format!(
                        "Stack '{name}' requires '{key}' but no stack exports it"
                    ))
                    .with_stacks(vec![name.clone()])
                    .with_error_info(
                        ContractErrorInfo::new(codes::NO_PRODUCER, format!("No producer for '{key}'"))
                            .with_fix_hint("Export the key from a dependency, or declare it as an import.")
                            .with_context_entry("key", key.as_str()),
                    ));
                };

                if !upstream.contains(*producer) {
                    return Err(PlanError::new(format!(
                        "Stack '{name}' reads '{key}' from '{producer}' without depending on it"
                    ))
                    .with_stacks(vec![name.clone(), (*producer).to_string()])
                    .with_error_info(
                        ContractErrorInfo::new(
                            codes::UNORDERED_READ,
                            format!("'{name}' is not ordered after '{producer}'"),
                        )
                        .with_fix_hint(format!(
                            "Add a dependency from '{name}' on '{producer}', or import the key from the shared store."
                        ))
                        .with_context_entry("key", key.as_str()),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Converts the plan shape to JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let stacks: Vec<serde_json::Value> = self
            .deployment_order
            .iter()
            .map(|name| {
                let spec = &self.stacks[name];
                serde_json::json!({
                    "name": name,
                    "dependencies": spec.dependencies,
                    "exports": spec.exports,
                    "requires": spec.requires,
                    "imports": spec.imports,
                })
            })
            .collect();

        serde_json::json!({
            "name": self.name,
            "order": self.deployment_order,
            "stacks": stacks,
        })
    }
}
