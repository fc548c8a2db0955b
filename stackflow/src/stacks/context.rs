//! The context handed to a stack builder.

use super::StackInputs;
use crate::errors::{ParameterNotFoundError, StackBuildError};
use crate::params::{ParameterKey, ParameterKind, ParameterValue};
use crate::resources::{OutputValue, ParameterResource, ResourceSpec, RoleSpec, StackOutputSpec, StackTemplate};
use crate::target::DeploymentTarget;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Everything a builder can see and declare while constructing one stack.
///
/// Values from other stacks reach the builder through two distinct paths:
/// `input` for parameters produced earlier in this deployment by a
/// dependency, and `import` for keys fetched from the shared store before the
/// builder ran.
#[derive(Debug)]
pub struct StackContext {
    inputs: StackInputs,
    imports: HashMap<ParameterKey, ParameterValue>,
    exports: HashSet<ParameterKey>,
    template: StackTemplate,
}

impl StackContext {
    /// Creates a context for `stack_name`.
    #[must_use]
    pub fn new(stack_name: impl Into<String>, target: DeploymentTarget, inputs: StackInputs) -> Self {
        Self {
            inputs,
            imports: HashMap::new(),
            exports: HashSet::new(),
            template: StackTemplate::new(stack_name, target),
        }
    }

    /// Supplies values prefetched from the shared store.
    #[must_use]
    pub fn with_imports(mut self, imports: HashMap<ParameterKey, ParameterValue>) -> Self {
        self.imports = imports;
        self
    }

    /// Restricts `publish_parameter` to a declared set of keys.
    ///
    /// An empty set leaves publishing unrestricted.
    #[must_use]
    pub fn with_exports(mut self, exports: HashSet<ParameterKey>) -> Self {
        self.exports = exports;
        self
    }

    /// Records the stacks this one is ordered after.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.template.dependencies = dependencies;
        self
    }

    /// Returns the stack name.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        &self.template.stack_name
    }

    /// Returns the deployment target.
    #[must_use]
    pub fn target(&self) -> &DeploymentTarget {
        &self.template.target
    }

    /// Returns the template declared so far.
    #[must_use]
    pub fn template(&self) -> &StackTemplate {
        &self.template
    }

    /// Declares a resource and returns it for attribute references.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateResource` if the logical id is already taken.
    pub fn add_resource(&mut self, resource: ResourceSpec) -> Result<&ResourceSpec, StackBuildError> {
        if self.logical_id_taken(&resource.logical_id) {
            return Err(StackBuildError::DuplicateResource {
                stack: self.template.stack_name.clone(),
                logical_id: resource.logical_id,
            });
        }
        trace!(
            stack = %self.template.stack_name,
            logical_id = %resource.logical_id,
            resource_type = %resource.resource_type,
            "Resource declared"
        );
        self.template.resources.push(resource);
        let index = self.template.resources.len() - 1;
        Ok(&self.template.resources[index])
    }

    /// Declares an IAM role.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateResource` if the logical id is already taken.
    pub fn add_role(&mut self, logical_id: &str, role: &RoleSpec) -> Result<&ResourceSpec, StackBuildError> {
        self.add_resource(role.to_resource(logical_id))
    }

    /// Declares a named stack output.
    pub fn add_output(&mut self, name: impl Into<String>, value: impl Into<OutputValue>) {
        self.template.outputs.push(StackOutputSpec {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Publishes a string parameter to the shared store once provisioned.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed or not among the declared
    /// exports. Republishing a key is `DuplicatePublish`, and a key whose
    /// logical id is already taken is `DuplicateResource`.
    pub fn publish_parameter(&mut self, key: &str, value: impl Into<OutputValue>) -> Result<(), StackBuildError> {
        self.publish_parameter_with_kind(key, ParameterKind::String, value)
    }

    /// Publishes a parameter of the given kind.
    ///
    /// # Errors
    ///
    /// See [`StackContext::publish_parameter`].
    pub fn publish_parameter_with_kind(
        &mut self,
        key: &str,
        kind: ParameterKind,
        value: impl Into<OutputValue>,
    ) -> Result<(), StackBuildError> {
        let key = ParameterKey::new(key)?;
        let stack = &self.template.stack_name;

        if !self.exports.is_empty() && !self.exports.contains(&key) {
            return Err(StackBuildError::UndeclaredExport {
                stack: stack.clone(),
                key: key.to_string(),
            });
        }
        if self.template.parameters.iter().any(|p| p.key == key) {
            return Err(StackBuildError::DuplicatePublish {
                stack: stack.clone(),
                key: key.to_string(),
            });
        }

        let parameter = ParameterResource {
            key,
            kind,
            value: value.into(),
        };
        let logical_id = parameter.logical_id();
        if self.logical_id_taken(&logical_id) {
            return Err(StackBuildError::DuplicateResource {
                stack: stack.clone(),
                logical_id,
            });
        }
        self.template.parameters.push(parameter);
        Ok(())
    }

    /// Reads a parameter produced earlier in this deployment by a dependency.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredDependency` if the producer is not a dependency,
    /// or `ParameterNotFound` if no stack has produced the key.
    pub fn input(&self, key: &str) -> Result<ParameterValue, StackBuildError> {
        let key = ParameterKey::new(key)?;
        self.inputs
            .get(&key)?
            .cloned()
            .ok_or_else(|| self.not_found(&key))
    }

    /// Reads a parameter fetched from the shared store before the build.
    ///
    /// Only keys declared as imports on the stack are fetched.
    ///
    /// # Errors
    ///
    /// Returns `ParameterNotFound` if the key was not declared as an import.
    pub fn import(&self, key: &str) -> Result<ParameterValue, StackBuildError> {
        let key = ParameterKey::new(key)?;
        self.imports.get(&key).cloned().ok_or_else(|| self.not_found(&key))
    }

    /// Reads a parameter from a dependency, falling back to declared imports.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredDependency` if a non-dependency produced the key,
    /// or `ParameterNotFound` if neither path has it.
    pub fn read_parameter(&self, key: &str) -> Result<ParameterValue, StackBuildError> {
        match self.input(key) {
            Err(StackBuildError::ParameterNotFound(_)) => self.import(key),
            other => other,
        }
    }

    /// Finishes the build and returns the template.
    #[must_use]
    pub fn into_template(self) -> StackTemplate {
        self.template
    }

    fn logical_id_taken(&self, logical_id: &str) -> bool {
        self.template.resource(logical_id).is_some()
            || self.template.parameters.iter().any(|p| p.logical_id() == logical_id)
    }

    fn not_found(&self, key: &ParameterKey) -> StackBuildError {
        ParameterNotFoundError::new(key.as_str(), self.template.target.to_string()).into()
    }
}
