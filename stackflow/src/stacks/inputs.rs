//! Stack inputs with dependency enforcement.

use crate::errors::UndeclaredDependencyError;
use crate::params::{ParameterKey, ParameterValue};
use std::collections::{HashMap, HashSet};

/// A parameter published earlier in the deployment, with its producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedValue {
    /// The stack that published it.
    pub producer: String,
    /// The value.
    pub value: ParameterValue,
}

/// Immutable view of parameters published by stacks deployed earlier.
///
/// Reading a key produced by a stack that is not among the reader's
/// (transitive) dependencies raises an error.
#[derive(Debug, Clone, Default)]
pub struct StackInputs {
    produced: HashMap<ParameterKey, ProducedValue>,
    dependencies: HashSet<String>,
    stack_name: String,
}

impl StackInputs {
    /// Creates inputs for `stack_name`, which may read from `dependencies`.
    #[must_use]
    pub fn new(
        produced: HashMap<ParameterKey, ProducedValue>,
        dependencies: HashSet<String>,
        stack_name: impl Into<String>,
    ) -> Self {
        Self {
            produced,
            dependencies,
            stack_name: stack_name.into(),
        }
    }

    /// Gets a value.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredDependencyError` if the producer is not a
    /// dependency of this stack.
    pub fn get(&self, key: &ParameterKey) -> Result<Option<&ParameterValue>, UndeclaredDependencyError> {
        match self.produced.get(key) {
            Some(produced) if !self.dependencies.contains(&produced.producer) => Err(
                UndeclaredDependencyError::new(&self.stack_name, key.as_str(), &produced.producer),
            ),
            Some(produced) => Ok(Some(&produced.value)),
            None => Ok(None),
        }
    }
}
