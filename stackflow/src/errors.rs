//! Error types for the stackflow framework.
//!
//! Plan errors are raised while the deployment plan is assembled, before any
//! provisioning call. Parameter and provisioning errors surface while a single
//! stack is being deployed and abort only that stack.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for stackflow operations.
#[derive(Debug, Error)]
pub enum StackflowError {
    /// The deployment plan is invalid.
    #[error("{0}")]
    Plan(#[from] PlanError),

    /// A cycle was detected between stacks.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// A parameter was read before anything published it.
    #[error("{0}")]
    ParameterNotFound(#[from] ParameterNotFoundError),

    /// The shared parameter store failed.
    #[error("{0}")]
    ParameterStore(#[from] ParameterStoreError),

    /// Two stacks published the same parameter key.
    #[error("{0}")]
    ParameterConflict(#[from] ParameterConflictError),

    /// A parameter key does not satisfy the naming rules.
    #[error("{0}")]
    InvalidParameterKey(#[from] InvalidParameterKeyError),

    /// A stack read an output of a stack it does not depend on.
    #[error("{0}")]
    UndeclaredDependency(#[from] UndeclaredDependencyError),

    /// A stack builder failed.
    #[error("{0}")]
    StackBuild(#[from] StackBuildError),

    /// The provisioning engine rejected a stack.
    #[error("{0}")]
    Provisioning(#[from] ProvisioningError),

    /// A cleanup utility failed.
    #[error("{0}")]
    Cleanup(#[from] CleanupError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StackflowError {
    /// Short name of the error kind, used in reports and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Plan(_) => "PlanError",
            Self::CycleDetected(_) => "CycleDetectedError",
            Self::ParameterNotFound(_) | Self::StackBuild(StackBuildError::ParameterNotFound(_)) => {
                "ParameterNotFoundError"
            }
            Self::ParameterStore(_) => "ParameterStoreError",
            Self::ParameterConflict(_) => "ParameterConflictError",
            Self::InvalidParameterKey(_) => "InvalidParameterKeyError",
            Self::UndeclaredDependency(_) | Self::StackBuild(StackBuildError::UndeclaredDependency(_)) => {
                "UndeclaredDependencyError"
            }
            Self::StackBuild(_) => "StackBuildError",
            Self::Provisioning(_) => "ProvisioningError",
            Self::Cleanup(_) => "CleanupError",
            Self::Config(_) => "ConfigError",
            Self::Serialization(_) => "SerializationError",
        }
    }
}

/// Metadata about a plan error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PLAN-004-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }
        serde_json::Value::Object(map)
    }
}

/// Error raised when the deployment plan is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PlanError {
    /// The error message.
    pub message: String,
    /// The stacks involved in the error.
    pub stacks: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PlanError {
    /// Creates a new plan error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stacks: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stacks involved.
    #[must_use]
    pub fn with_stacks(mut self, stacks: Vec<String>) -> Self {
        self.stacks = stacks;
        self
    }

    /// Sets the contract error info, filling in the default fix hint for
    /// its code when none is given.
    #[must_use]
    pub fn with_error_info(mut self, mut info: ContractErrorInfo) -> Self {
        if info.fix_hint.is_none() {
            info.fix_hint = PlanSuggestions::get(&info.code).map(str::to_string);
        }
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// Converts to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("stacks".to_string(), serde_json::json!(self.stacks));
        if let Some(ref info) = self.error_info {
            map.insert("error_info".to_string(), info.to_json());
        }
        serde_json::Value::Object(map)
    }
}

/// Error raised when a cycle is detected between stacks.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected between stacks: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stacks forming the cycle, first stack repeated at the end.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            codes::CYCLE,
            format!("Deployment contains a dependency cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the dependencies in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl From<CycleDetectedError> for PlanError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            stacks: err.cycle_path.clone(),
            error_info: Some(err.error_info),
        }
    }
}

/// Error raised when a parameter is read before anything published it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Parameter '{key}' not found in {scope}")]
pub struct ParameterNotFoundError {
    /// The missing key.
    pub key: String,
    /// The deployment target the lookup was scoped to.
    pub scope: String,
}

impl ParameterNotFoundError {
    /// Creates a new parameter not found error.
    #[must_use]
    pub fn new(key: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            scope: scope.into(),
        }
    }
}

/// Errors raised by a shared parameter store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParameterStoreError {
    /// The key has never been published in this scope.
    #[error("{0}")]
    NotFound(#[from] ParameterNotFoundError),

    /// The backing store could not be reached or rejected the call.
    #[error("Parameter store unavailable: {0}")]
    Backend(String),
}

/// Error raised when a stack publishes a key owned by another stack.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Parameter '{key}' is owned by stack '{owner}' and cannot be published by '{publisher}'")]
pub struct ParameterConflictError {
    /// The contested key.
    pub key: String,
    /// The stack that published the key first.
    pub owner: String,
    /// The stack that attempted to publish it again.
    pub publisher: String,
}

impl ParameterConflictError {
    /// Creates a new parameter conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>, owner: impl Into<String>, publisher: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            owner: owner.into(),
            publisher: publisher.into(),
        }
    }
}

/// Error raised when a parameter key violates the naming rules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid parameter key '{key}': {reason}")]
pub struct InvalidParameterKeyError {
    /// The rejected key.
    pub key: String,
    /// Why it was rejected.
    pub reason: String,
}

impl InvalidParameterKeyError {
    /// Creates a new invalid key error.
    #[must_use]
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised when a stack reads an output of a stack it does not depend on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Undeclared dependency: stack '{stack}' read '{key}' published by '{producer}', which it does not depend on")]
pub struct UndeclaredDependencyError {
    /// The reading stack.
    pub stack: String,
    /// The parameter key.
    pub key: String,
    /// The stack that published the key.
    pub producer: String,
}

impl UndeclaredDependencyError {
    /// Creates a new undeclared dependency error.
    #[must_use]
    pub fn new(stack: impl Into<String>, key: impl Into<String>, producer: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            key: key.into(),
            producer: producer.into(),
        }
    }
}

/// Errors raised by a stack builder while it declares resources.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StackBuildError {
    /// A parameter the builder needs was never published.
    #[error("{0}")]
    ParameterNotFound(#[from] ParameterNotFoundError),

    /// The shared store failed while an import was fetched.
    #[error("{0}")]
    ParameterStore(ParameterStoreError),

    /// The builder read an output outside its dependencies.
    #[error("{0}")]
    UndeclaredDependency(#[from] UndeclaredDependencyError),

    /// The builder used a malformed key.
    #[error("{0}")]
    InvalidKey(#[from] InvalidParameterKeyError),

    /// Two resources in the same stack share a logical id.
    #[error("Duplicate logical id '{logical_id}' in stack '{stack}'")]
    DuplicateResource {
        /// The stack name.
        stack: String,
        /// The repeated logical id.
        logical_id: String,
    },

    /// A parameter was published twice from the same builder run.
    #[error("Stack '{stack}' published parameter '{key}' more than once")]
    DuplicatePublish {
        /// The stack name.
        stack: String,
        /// The repeated key.
        key: String,
    },

    /// A parameter was published that the stack did not declare as an export.
    #[error("Stack '{stack}' published '{key}' which is not among its declared exports")]
    UndeclaredExport {
        /// The stack name.
        stack: String,
        /// The key.
        key: String,
    },

    /// Any other builder failure.
    #[error("Stack build failed: {0}")]
    Other(String),
}

impl From<ParameterStoreError> for StackBuildError {
    fn from(err: ParameterStoreError) -> Self {
        match err {
            ParameterStoreError::NotFound(not_found) => Self::ParameterNotFound(not_found),
            other => Self::ParameterStore(other),
        }
    }
}

impl StackBuildError {
    /// Creates a free-form build error.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Opaque failure reported by the provisioning engine.
///
/// Propagated unchanged; no local recovery or retry is attempted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Provisioning of stack '{stack}' failed: {message}")]
pub struct ProvisioningError {
    /// The stack being provisioned.
    pub stack: String,
    /// The engine's message.
    pub message: String,
}

impl ProvisioningError {
    /// Creates a new provisioning error.
    #[must_use]
    pub fn new(stack: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            message: message.into(),
        }
    }
}

/// Error raised by a cleanup utility.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cleanup of '{resource}' failed: {message}")]
pub struct CleanupError {
    /// The resource being removed.
    pub resource: String,
    /// The provider's message.
    pub message: String,
}

impl CleanupError {
    /// Creates a new cleanup error.
    #[must_use]
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// The file path.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is present but unusable.
    #[error("Invalid config value for '{field}': {reason}")]
    Invalid {
        /// The field name.
        field: String,
        /// Why it is invalid.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Plan error codes.
pub mod codes {
    /// A stack name is empty or whitespace.
    pub const EMPTY_NAME: &str = "PLAN-001-EMPTY_NAME";
    /// Two stacks share a name.
    pub const DUPLICATE: &str = "PLAN-002-DUPLICATE";
    /// A dependency references an unknown or not yet declared stack.
    pub const MISSING_DEP: &str = "PLAN-003-MISSING_DEP";
    /// The dependency graph has a cycle.
    pub const CYCLE: &str = "PLAN-004-CYCLE";
    /// A required parameter is produced by a stack that is not a dependency.
    pub const UNORDERED_READ: &str = "PLAN-005-UNORDERED_READ";
    /// A required parameter is exported by no stack.
    pub const NO_PRODUCER: &str = "PLAN-006-NO_PRODUCER";
    /// Two stacks export the same parameter key.
    pub const EXPORT_CONFLICT: &str = "PLAN-007-EXPORT_CONFLICT";
    /// The plan has no stacks.
    pub const EMPTY: &str = "PLAN-008-EMPTY";
    /// A stack depends on itself.
    pub const SELF_DEP: &str = "PLAN-009-SELF_DEP";
    /// A declared parameter key is malformed.
    pub const INVALID_KEY: &str = "PLAN-010-INVALID_KEY";
}

/// Provides default suggestions for plan error codes.
pub struct PlanSuggestions;

impl PlanSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            codes::CYCLE => Some(
                "Check the explicit dependencies added with add_dependency for circular references.",
            ),
            codes::MISSING_DEP => Some(
                "Declare the dependency before the stack that depends on it. \
                 Check for typos in stack names.",
            ),
            codes::DUPLICATE => Some("Stack names must be unique within a deployment."),
            codes::UNORDERED_READ => Some(
                "Add a dependency edge from the reading stack to the stack that exports the parameter, \
                 or import it from the shared store if eventual consistency is acceptable.",
            ),
            codes::NO_PRODUCER => Some(
                "Declare the key as an export on the producing stack, or import it from the shared store.",
            ),
            codes::EXPORT_CONFLICT => Some("Each parameter key may be exported by exactly one stack."),
            codes::EMPTY => Some("Declare at least one stack before building the plan."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stack", "auth");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stack"), Some(&"auth".to_string()));
    }

    #[test]
    fn test_error_kind() {
        let err: StackflowError = StackBuildError::from(ParameterNotFoundError::new("user-pool-id", "1/us-east-1")).into();
        assert_eq!(err.kind(), "ParameterNotFoundError");

        let err: StackflowError = ProvisioningError::new("auth", "boom").into();
        assert_eq!(err.kind(), "ProvisioningError");
    }

    #[test]
    fn test_plan_error_to_json() {
        let err = PlanError::new("Test error")
            .with_stacks(vec!["auth".to_string(), "search".to_string()]);

        let json = err.to_json();
        assert_eq!(json["message"], "Test error");
        assert_eq!(json["stacks"][1], "search");
        assert!(err.code().is_none());
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);

        assert!(err.to_string().contains("a -> b -> a"));
        assert_eq!(err.error_info.code, codes::CYCLE);

        let plan_err: PlanError = err.into();
        assert_eq!(plan_err.code(), Some(codes::CYCLE));
        assert_eq!(plan_err.stacks.len(), 3);
    }

    #[test]
    fn test_parameter_not_found_message() {
        let err = ParameterNotFoundError::new("user-pool-id", "123456789012/us-east-1");
        assert_eq!(
            err.to_string(),
            "Parameter 'user-pool-id' not found in 123456789012/us-east-1"
        );
    }

    #[test]
    fn test_stack_build_error_from_not_found() {
        let err: StackBuildError = ParameterNotFoundError::new("k", "scope").into();
        assert!(matches!(err, StackBuildError::ParameterNotFound(_)));
    }

    #[test]
    fn test_plan_suggestions() {
        assert!(PlanSuggestions::get(codes::CYCLE).is_some());
        assert!(PlanSuggestions::get(codes::UNORDERED_READ).is_some());
        assert!(PlanSuggestions::get("UNKNOWN").is_none());

        let err = PlanError::new("dup").with_error_info(ContractErrorInfo::new(codes::DUPLICATE, "dup"));
        assert_eq!(
            err.error_info.unwrap().fix_hint.as_deref(),
            PlanSuggestions::get(codes::DUPLICATE)
        );

        let err = PlanError::new("dup")
            .with_error_info(ContractErrorInfo::new(codes::DUPLICATE, "dup").with_fix_hint("Rename it."));
        assert_eq!(err.error_info.unwrap().fix_hint.as_deref(), Some("Rename it."));
    }
}
