//! Stack builders and the context they run in.
//!
//! A builder is the resource-declaring function of one stack. It runs once
//! per deployment, after every stack it depends on has been provisioned.

mod context;
mod inputs;

pub use context::StackContext;
pub use inputs::{ProducedValue, StackInputs};

use crate::errors::StackBuildError;
use std::fmt::Debug;

/// Trait for stack builders.
pub trait StackBuilder: Send + Sync + Debug {
    /// Declares the stack's resources, outputs and published parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if a required value is unavailable or a declaration
    /// is invalid. The error aborts this stack only.
    fn build(&self, ctx: &mut StackContext) -> Result<(), StackBuildError>;
}

/// A closure-based stack builder.
pub struct FnStackBuilder<F>
where
    F: Fn(&mut StackContext) -> Result<(), StackBuildError> + Send + Sync,
{
    func: F,
}

impl<F> FnStackBuilder<F>
where
    F: Fn(&mut StackContext) -> Result<(), StackBuildError> + Send + Sync,
{
    /// Wraps a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnStackBuilder<F>
where
    F: Fn(&mut StackContext) -> Result<(), StackBuildError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStackBuilder").finish_non_exhaustive()
    }
}

impl<F> StackBuilder for FnStackBuilder<F>
where
    F: Fn(&mut StackContext) -> Result<(), StackBuildError> + Send + Sync,
{
    fn build(&self, ctx: &mut StackContext) -> Result<(), StackBuildError> {
        (self.func)(ctx)
    }
}

/// A builder that declares nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyStackBuilder;

impl StackBuilder for EmptyStackBuilder {
    fn build(&self, _ctx: &mut StackContext) -> Result<(), StackBuildError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceSpec;
    use crate::target::DeploymentTarget;

    fn ctx() -> StackContext {
        StackContext::new(
            "ecr",
            DeploymentTarget::new("123456789012", "us-east-1"),
            StackInputs::default(),
        )
    }

    #[test]
    fn test_fn_builder() {
        let builder = FnStackBuilder::new(|ctx: &mut StackContext| {
            ctx.add_resource(ResourceSpec::new("Repo", "AWS::ECR::Repository"))?;
            Ok(())
        });

        let mut ctx = ctx();
        builder.build(&mut ctx).unwrap();
        assert_eq!(ctx.template().resources.len(), 1);
        assert!(format!("{builder:?}").contains("FnStackBuilder"));
    }

    #[test]
    fn test_empty_builder() {
        let mut ctx = ctx();
        EmptyStackBuilder.build(&mut ctx).unwrap();
        assert_eq!(ctx.into_template().resource_count(), 0);
    }
}
