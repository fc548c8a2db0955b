//! Container registry for the application images.

use crate::config::BlueprintConfig;
use crate::errors::StackBuildError;
use crate::resources::ResourceSpec;
use crate::stacks::{StackBuilder, StackContext};
use serde_json::json;
use std::sync::Arc;

/// One repository, scanned on push.
#[derive(Debug, Clone)]
pub struct EcrStack {
    config: Arc<BlueprintConfig>,
}

impl EcrStack {
    /// Creates the stack.
    #[must_use]
    pub fn new(config: Arc<BlueprintConfig>) -> Self {
        Self { config }
    }
}

impl StackBuilder for EcrStack {
    fn build(&self, ctx: &mut StackContext) -> Result<(), StackBuildError> {
        let repo = ctx
            .add_resource(
                ResourceSpec::new("ECSInELKRepo", "AWS::ECR::Repository").with_properties(json!({
                    "RepositoryName": self.config.repo_name,
                    "ImageScanningConfiguration": {"ScanOnPush": true},
                })),
            )?
            .attr("RepositoryUri");
        ctx.add_output("RepositoryUri", repo);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::StackInputs;
    use crate::target::DeploymentTarget;

    #[test]
    fn test_repository() {
        let mut ctx = StackContext::new(
            "ecr",
            DeploymentTarget::new("123456789012", "us-east-1"),
            StackInputs::default(),
        );
        EcrStack::new(Arc::new(BlueprintConfig::default()))
            .build(&mut ctx)
            .unwrap();

        let template = ctx.into_template();
        let repo = template.resource("ECSInELKRepo").unwrap();
        assert_eq!(repo.properties["RepositoryName"], "ecs-in-elk");
        assert_eq!(repo.properties["ImageScanningConfiguration"]["ScanOnPush"], true);
        assert!(template.parameters.is_empty());
    }
}
