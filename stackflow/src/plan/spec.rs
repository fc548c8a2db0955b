//! Stack specifications.

use crate::errors::{codes, ContractErrorInfo, PlanError};
use crate::params::ParameterKey;
use crate::stacks::StackBuilder;
use std::sync::Arc;

/// Specification for a single stack in a deployment.
#[derive(Debug, Clone)]
pub struct StackSpec {
    /// The unique name of the stack.
    pub name: String,
    /// The resource builder.
    pub builder: Arc<dyn StackBuilder>,
    /// Names of stacks this stack depends on, in declaration order.
    pub dependencies: Vec<String>,
    /// Keys this stack publishes.
    pub exports: Vec<String>,
    /// Keys this stack reads from its dependencies.
    pub requires: Vec<String>,
    /// Keys this stack reads from the shared store, tolerating staleness.
    pub imports: Vec<String>,
}

impl StackSpec {
    /// Creates a new stack specification.
    #[must_use]
    pub fn new(name: impl Into<String>, builder: Arc<dyn StackBuilder>) -> Self {
        Self {
            name: name.into(),
            builder,
            dependencies: Vec::new(),
            exports: Vec::new(),
            requires: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies.clear();
        for dep in deps {
            push_unique(&mut self.dependencies, dep.into());
        }
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        push_unique(&mut self.dependencies, dep.into());
        self
    }

    /// Declares a key this stack publishes.
    #[must_use]
    pub fn with_export(mut self, key: impl Into<String>) -> Self {
        push_unique(&mut self.exports, key.into());
        self
    }

    /// Declares a key this stack reads from a dependency.
    #[must_use]
    pub fn with_requirement(mut self, key: impl Into<String>) -> Self {
        push_unique(&mut self.requires, key.into());
        self
    }

    /// Declares a key this stack reads from the shared store.
    #[must_use]
    pub fn with_import(mut self, key: impl Into<String>) -> Self {
        push_unique(&mut self.imports, key.into());
        self
    }

    /// Returns true if `name` is a direct dependency.
    #[must_use]
    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }

    /// Validated export keys.
    #[must_use]
    pub fn export_keys(&self) -> Vec<ParameterKey> {
        parse_keys(&self.exports)
    }

    /// Validated import keys.
    #[must_use]
    pub fn import_keys(&self) -> Vec<ParameterKey> {
        parse_keys(&self.imports)
    }

    /// Validates the stack specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank, the stack depends on itself, or
    /// a declared parameter key is malformed.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.name.trim().is_empty() {
            return Err(PlanError::new("Stack name cannot be empty or whitespace-only")
                .with_error_info(
                    ContractErrorInfo::new(codes::EMPTY_NAME, "Stack name is blank")
                        .with_fix_hint("Give every stack a non-empty name."),
                ));
        }

        if self.depends_on(&self.name) {
            return Err(PlanError::new(format!("Stack '{}' cannot depend on itself", self.name))
                .with_stacks(vec![self.name.clone()])
                .with_error_info(ContractErrorInfo::new(
                    codes::SELF_DEP,
                    format!("Stack '{}' lists itself as a dependency", self.name),
                )));
        }

        for key in self.exports.iter().chain(&self.requires).chain(&self.imports) {
            if let Err(err) = ParameterKey::new(key.as_str()) {
                return Err(PlanError::new(format!("Stack '{}': {err}", self.name))
                    .with_stacks(vec![self.name.clone()])
                    .with_error_info(
                        ContractErrorInfo::new(codes::INVALID_KEY, err.reason)
                            .with_context_entry("key", key.as_str()),
                    ));
            }
        }

        Ok(())
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn parse_keys(keys: &[String]) -> Vec<ParameterKey> {
    keys.iter()
        .filter_map(|k| ParameterKey::new(k.as_str()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::EmptyStackBuilder;

    fn spec(name: &str) -> StackSpec {
        StackSpec::new(name, Arc::new(EmptyStackBuilder))
    }

    #[test]
    fn test_stack_spec_creation() {
        let spec = spec("search")
            .with_dependencies(["auth", "network", "auth"])
            .with_export("vpc-es-domain-endpoint")
            .with_requirement("user-pool-id")
            .with_import("legacy-endpoint");

        assert_eq!(spec.dependencies, vec!["auth", "network"]);
        assert!(spec.depends_on("auth"));
        assert_eq!(spec.export_keys().len(), 1);
        assert_eq!(spec.import_keys()[0].as_str(), "legacy-endpoint");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_stack_spec_self_dependency() {
        let err = spec("auth").with_dependency("auth").validate().unwrap_err();
        assert_eq!(err.code(), Some(codes::SELF_DEP));
    }

    #[test]
    fn test_stack_spec_blank_name() {
        let err = spec("   ").validate().unwrap_err();
        assert_eq!(err.code(), Some(codes::EMPTY_NAME));
    }

    #[test]
    fn test_stack_spec_invalid_key() {
        let err = spec("auth").with_export("user pool").validate().unwrap_err();
        assert_eq!(err.code(), Some(codes::INVALID_KEY));
    }
}
