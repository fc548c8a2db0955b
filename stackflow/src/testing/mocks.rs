//! Stack builders for testing.

use parking_lot::Mutex;

use crate::errors::StackBuildError;
use crate::resources::ResourceSpec;
use crate::stacks::{StackBuilder, StackContext};

/// A builder that records each build and publishes literal values.
#[derive(Debug, Default)]
pub struct RecordingStackBuilder {
    publishes: Vec<(String, String)>,
    reads: Vec<String>,
    build_count: Mutex<usize>,
    seen: Mutex<Vec<(String, String)>>,
}

impl RecordingStackBuilder {
    /// Creates a builder that declares one placeholder resource.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `key` with a literal value on every build.
    #[must_use]
    pub fn publishing(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.publishes.push((key.into(), value.into()));
        self
    }

    /// Reads `key` from a dependency on every build.
    #[must_use]
    pub fn reading(mut self, key: impl Into<String>) -> Self {
        self.reads.push(key.into());
        self
    }

    /// Returns the number of builds.
    #[must_use]
    pub fn build_count(&self) -> usize {
        *self.build_count.lock()
    }

    /// Returns every (key, value) read, in order.
    #[must_use]
    pub fn values_seen(&self) -> Vec<(String, String)> {
        self.seen.lock().clone()
    }
}

impl StackBuilder for RecordingStackBuilder {
    fn build(&self, ctx: &mut StackContext) -> Result<(), StackBuildError> {
        *self.build_count.lock() += 1;

        for key in &self.reads {
            let value = ctx.input(key)?;
            self.seen.lock().push((key.clone(), value.value));
        }

        let logical_id = format!("{}Placeholder", ctx.stack_name().replace('-', ""));
        ctx.add_resource(ResourceSpec::new(logical_id, "Custom::Placeholder"))?;

        for (key, value) in &self.publishes {
            ctx.publish_parameter(key, value.as_str())?;
        }
        Ok(())
    }
}

/// A builder that always fails.
#[derive(Debug)]
pub struct FailingStackBuilder {
    message: String,
}

impl FailingStackBuilder {
    /// Creates a builder failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl StackBuilder for FailingStackBuilder {
    fn build(&self, _ctx: &mut StackContext) -> Result<(), StackBuildError> {
        Err(StackBuildError::Other(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::StackInputs;
    use crate::target::DeploymentTarget;

    fn ctx(name: &str) -> StackContext {
        StackContext::new(name, DeploymentTarget::new("123456789012", "us-east-1"), StackInputs::default())
    }

    #[test]
    fn test_recording_builder() {
        let builder = RecordingStackBuilder::new().publishing("user-pool-id", "up-1");
        let mut ctx = ctx("auth");
        builder.build(&mut ctx).unwrap();

        assert_eq!(builder.build_count(), 1);
        let template = ctx.into_template();
        assert!(template.resource("authPlaceholder").is_some());
        assert_eq!(template.parameters[0].value.to_string(), "up-1");
    }

    #[test]
    fn test_recording_builder_missing_read() {
        let builder = RecordingStackBuilder::new().reading("user-pool-id");
        assert!(builder.build(&mut ctx("search")).is_err());
        assert_eq!(builder.build_count(), 1);
        assert!(builder.values_seen().is_empty());
    }

    #[test]
    fn test_failing_builder() {
        let err = FailingStackBuilder::new("boom").build(&mut ctx("ecs")).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
