//! End-to-end tests for deploying plans against the in-memory engine.

#[cfg(test)]
mod tests {
    use crate::deploy::{Deployer, StackStatus};
    use crate::engine::{EngineCall, InMemoryEngine};
    use crate::errors::{ParameterStoreError, StackBuildError, StackflowError};
    use crate::events::{self, CollectingEventSink};
    use crate::params::{InMemoryParameterStore, ParameterKey, ParameterStore, ParameterValue};
    use crate::plan::{DeploymentPlan, DeploymentPlanBuilder, FailureMode, StackSpec};
    use crate::resources::ResourceSpec;
    use crate::stacks::{EmptyStackBuilder, FnStackBuilder, StackBuilder, StackContext};
    use crate::target::DeploymentTarget;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn target() -> DeploymentTarget {
        DeploymentTarget::new("123456789012", "us-east-1")
    }

    fn key(name: &str) -> ParameterKey {
        ParameterKey::new(name).unwrap()
    }

    fn builder<F>(func: F) -> Arc<dyn StackBuilder>
    where
        F: Fn(&mut StackContext) -> Result<(), StackBuildError> + Send + Sync + 'static,
    {
        Arc::new(FnStackBuilder::new(func))
    }

    fn auth_literal() -> Arc<dyn StackBuilder> {
        builder(|ctx| {
            ctx.add_resource(ResourceSpec::new("UserPool", "AWS::Cognito::UserPool"))?;
            ctx.publish_parameter("user-pool-id", "up-123")?;
            Ok(())
        })
    }

    fn search_reading_pool() -> Arc<dyn StackBuilder> {
        builder(|ctx| {
            let pool = ctx.input("user-pool-id")?;
            let domain = ctx
                .add_resource(
                    ResourceSpec::new("Domain", "AWS::Elasticsearch::Domain")
                        .with_property("DomainName", serde_json::json!("logs"))
                        .with_property("CognitoOptions", serde_json::json!({"UserPoolId": pool.as_str()})),
                )?
                .attr("DomainEndpoint");
            ctx.publish_parameter("vpc-es-domain-endpoint", domain.clone())?;
            ctx.add_output("Output", domain);
            Ok(())
        })
    }

    fn auth_search_plan() -> DeploymentPlan {
        let mut plan = DeploymentPlanBuilder::new("ecs-elk");
        plan.declare(StackSpec::new("auth", auth_literal()).with_export("user-pool-id"))
            .unwrap();
        plan.declare(
            StackSpec::new("search", search_reading_pool())
                .with_dependency("auth")
                .with_export("vpc-es-domain-endpoint")
                .with_requirement("user-pool-id"),
        )
        .unwrap();
        plan.build().unwrap()
    }

    struct Harness {
        engine: Arc<InMemoryEngine>,
        store: Arc<InMemoryParameterStore>,
        sink: Arc<CollectingEventSink>,
        deployer: Deployer,
    }

    fn harness(plan: DeploymentPlan, mode: FailureMode) -> Harness {
        let engine = Arc::new(InMemoryEngine::new());
        let store = Arc::new(InMemoryParameterStore::new());
        let sink = Arc::new(CollectingEventSink::new());
        let deployer = Deployer::new(plan, engine.clone(), store.clone(), target())
            .with_event_sink(sink.clone())
            .with_failure_mode(mode);
        Harness {
            engine,
            store,
            sink,
            deployer,
        }
    }

    #[tokio::test]
    async fn test_dependency_reads_published_value() {
        let h = harness(auth_search_plan(), FailureMode::FailFast);
        let report = h.deployer.deploy().await;

        assert!(report.succeeded());
        assert_eq!(report.stacks.len(), 2);

        let stored = h.store.get(&target(), &key("user-pool-id")).await.unwrap();
        assert_eq!(stored.value.as_str(), "up-123");

        let search = report.outcome("search").unwrap().deployment.as_ref().unwrap();
        let endpoint = &search.published["vpc-es-domain-endpoint"];
        assert!(endpoint.starts_with("vpc-logs-"));
        assert_eq!(&search.outputs["Output"], endpoint);

        let synthesized = h.deployer.synth().unwrap();
        let domain = &synthesized[1].to_json()["Resources"]["Domain"];
        assert_eq!(domain["Properties"]["CognitoOptions"]["UserPoolId"], "up-123");
    }

    #[tokio::test]
    async fn test_read_before_publish_fails_only_that_stack() {
        let mut plan = DeploymentPlanBuilder::new("test");
        plan.declare(StackSpec::new("ecr", Arc::new(EmptyStackBuilder))).unwrap();
        plan.declare(StackSpec::new("search", search_reading_pool())).unwrap();
        let h = harness(plan.build().unwrap(), FailureMode::ContinueOnFailure);

        let err = h.deployer.deploy_stack("search").await.unwrap_err();
        assert!(matches!(
            err,
            StackflowError::StackBuild(StackBuildError::ParameterNotFound(ref e)) if e.key == "user-pool-id"
        ));

        let report = h.deployer.deploy().await;
        assert_eq!(report.outcome("ecr").unwrap().status, StackStatus::Deployed);
        assert_eq!(report.outcome("search").unwrap().status, StackStatus::Failed);
        assert_eq!(report.summary.failures[0].error_type, "ParameterNotFoundError");
    }

    #[tokio::test]
    async fn test_read_from_non_dependency_is_rejected() {
        let mut plan = DeploymentPlanBuilder::new("test");
        plan.declare(StackSpec::new("auth", auth_literal())).unwrap();
        plan.declare(StackSpec::new("search", search_reading_pool())).unwrap();
        let h = harness(plan.build().unwrap(), FailureMode::BestEffort);

        let report = h.deployer.deploy().await;

        let search = report.outcome("search").unwrap();
        assert_eq!(search.status, StackStatus::Failed);
        assert!(search.error.as_deref().unwrap().contains("auth"));
        assert_eq!(report.summary.failures[0].error_type, "UndeclaredDependencyError");
    }

    #[tokio::test]
    async fn test_redeploy_overwrites_parameter() {
        let h = harness(auth_search_plan(), FailureMode::FailFast);

        let first = h.deployer.deploy().await;
        let second = h.deployer.deploy().await;

        assert!(first.succeeded() && second.succeeded());
        assert_eq!(second.stacks_with_status(StackStatus::Unchanged), vec!["auth", "search"]);

        let stored = h.store.get(&target(), &key("user-pool-id")).await.unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.value.as_str(), "up-123");
    }

    #[tokio::test]
    async fn test_ownership_conflict() {
        let mut plan = DeploymentPlanBuilder::new("test");
        plan.declare(StackSpec::new("auth", auth_literal())).unwrap();
        plan.declare(StackSpec::new("legacy-auth", auth_literal())).unwrap();
        let h = harness(plan.build().unwrap(), FailureMode::BestEffort);

        let report = h.deployer.deploy().await;

        assert_eq!(report.outcome("auth").unwrap().status, StackStatus::Deployed);
        assert_eq!(report.outcome("legacy-auth").unwrap().status, StackStatus::Failed);
        assert_eq!(report.summary.failures[0].error_type, "ParameterConflictError");
        assert_eq!(h.deployer.exchange().owner_of(&key("user-pool-id")).as_deref(), Some("auth"));
    }

    fn three_stack_plan() -> DeploymentPlan {
        let mut plan = DeploymentPlanBuilder::new("test");
        plan.declare(StackSpec::new("auth", auth_literal()).with_export("user-pool-id"))
            .unwrap();
        plan.declare(
            StackSpec::new("search", search_reading_pool())
                .with_dependency("auth")
                .with_export("vpc-es-domain-endpoint"),
        )
        .unwrap();
        plan.declare(StackSpec::new("ecr", Arc::new(EmptyStackBuilder))).unwrap();
        plan.build().unwrap()
    }

    #[tokio::test]
    async fn test_fail_fast_skips_everything_after_failure() {
        let h = harness(three_stack_plan(), FailureMode::FailFast);
        h.engine.fail_stack("auth");

        let report = h.deployer.deploy().await;

        assert_eq!(report.outcome("auth").unwrap().status, StackStatus::Failed);
        assert_eq!(report.stacks_with_status(StackStatus::Skipped), vec!["search", "ecr"]);
        assert_eq!(report.summary.failures[0].error_type, "ProvisioningError");
        assert_eq!(h.sink.stacks_for(events::STACK_SKIPPED), vec!["search", "ecr"]);
    }

    #[tokio::test]
    async fn test_continue_on_failure_runs_unrelated_stacks() {
        let h = harness(three_stack_plan(), FailureMode::ContinueOnFailure);
        h.engine.fail_stack("auth");

        let report = h.deployer.deploy().await;

        assert_eq!(report.stacks_with_status(StackStatus::Skipped), vec!["search"]);
        assert_eq!(report.stacks_with_status(StackStatus::Deployed), vec!["ecr"]);
        assert_eq!(report.summary.skipped_stacks, 1);
        assert!(h.engine.is_deployed(&target(), "ecr"));
    }

    #[tokio::test]
    async fn test_best_effort_attempts_every_stack() {
        let h = harness(three_stack_plan(), FailureMode::BestEffort);
        h.engine.fail_stack("auth");

        let report = h.deployer.deploy().await;

        assert!(report.stacks_with_status(StackStatus::Skipped).is_empty());
        assert_eq!(report.stacks_with_status(StackStatus::Failed), vec!["auth", "search"]);
        assert_eq!(report.stacks_with_status(StackStatus::Deployed), vec!["ecr"]);
        assert_eq!(report.summary.failures[1].error_type, "ParameterNotFoundError");
    }

    #[tokio::test]
    async fn test_destroy_removes_parameters() {
        let h = harness(auth_search_plan(), FailureMode::FailFast);
        assert!(h.deployer.deploy().await.succeeded());

        let retired = h.deployer.destroy("auth").await.unwrap();

        assert_eq!(retired, vec![key("user-pool-id")]);
        assert!(!h.engine.is_deployed(&target(), "auth"));
        assert!(matches!(
            h.store.get(&target(), &key("user-pool-id")).await,
            Err(ParameterStoreError::NotFound(_))
        ));
        assert!(h.store.get(&target(), &key("vpc-es-domain-endpoint")).await.is_ok());
        assert_eq!(h.sink.stacks_for(events::STACK_DESTROYED), vec!["auth"]);
    }

    #[tokio::test]
    async fn test_destroy_all_in_reverse_order() {
        let h = harness(auth_search_plan(), FailureMode::FailFast);
        h.deployer.deploy().await;

        let destroyed = h.deployer.destroy_all().await.unwrap();

        assert_eq!(destroyed, vec!["search", "auth"]);
        assert!(h.store.is_empty());
        let destroys: Vec<EngineCall> = h
            .engine
            .calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::Destroy(_)))
            .collect();
        assert_eq!(
            destroys,
            vec![
                EngineCall::Destroy("search".to_string()),
                EngineCall::Destroy("auth".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_destroy_unknown_stack() {
        let h = harness(auth_search_plan(), FailureMode::FailFast);
        assert!(matches!(h.deployer.destroy("nope").await, Err(StackflowError::Plan(_))));
        assert!(h.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_imports_are_prefetched_from_store() {
        let store = Arc::new(InMemoryParameterStore::new());
        store
            .put(&target(), &key("legacy-endpoint"), ParameterValue::string("old.es"))
            .await
            .unwrap();

        let reader = builder(|ctx| {
            let endpoint = ctx.import("legacy-endpoint")?;
            ctx.add_output("Legacy", endpoint.as_str());
            Ok(())
        });
        let mut plan = DeploymentPlanBuilder::new("test");
        plan.declare(StackSpec::new("ecs", reader).with_import("legacy-endpoint"))
            .unwrap();

        let deployer = Deployer::new(
            plan.build().unwrap(),
            Arc::new(InMemoryEngine::new()),
            store,
            target(),
        );
        let report = deployer.deploy().await;

        let ecs = report.outcome("ecs").unwrap().deployment.as_ref().unwrap();
        assert_eq!(ecs.outputs["Legacy"], "old.es");

        let templates = deployer.synth().unwrap();
        assert_eq!(
            templates[0].to_json()["Outputs"]["Legacy"]["Value"],
            "{{resolve:ssm:legacy-endpoint}}"
        );
    }

    #[tokio::test]
    async fn test_synth_renders_tokens_without_provisioning() {
        let auth = builder(|ctx| {
            let pool = ctx
                .add_resource(ResourceSpec::new("UserPool", "AWS::Cognito::UserPool"))?
                .reference();
            ctx.publish_parameter("user-pool-id", pool)?;
            Ok(())
        });
        let mut plan = DeploymentPlanBuilder::new("test");
        plan.declare(StackSpec::new("auth", auth).with_export("user-pool-id"))
            .unwrap();
        plan.declare(StackSpec::new("search", search_reading_pool()).with_dependency("auth"))
            .unwrap();
        let h = harness(plan.build().unwrap(), FailureMode::FailFast);

        let templates = h.deployer.synth().unwrap();

        assert_eq!(templates.len(), 2);
        assert_eq!(templates[1].dependencies, vec!["auth"]);
        let domain = &templates[1].to_json()["Resources"]["Domain"];
        assert_eq!(domain["Properties"]["CognitoOptions"]["UserPoolId"], "${Token[UserPool.Ref]}");
        assert!(h.engine.calls().is_empty());
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_event_sequence() {
        let h = harness(auth_search_plan(), FailureMode::FailFast);
        h.deployer.deploy().await;

        assert_eq!(
            h.sink.event_types(),
            vec![
                events::STACK_STARTED,
                events::PARAMETER_PUBLISHED,
                events::STACK_DEPLOYED,
                events::STACK_STARTED,
                events::PARAMETER_PUBLISHED,
                events::STACK_DEPLOYED,
            ]
        );
        let published = h.sink.events_of_type(events::PARAMETER_PUBLISHED);
        assert_eq!(published[0].1["key"], "user-pool-id");
        assert_eq!(published[0].1["deployment"], "ecs-elk");
    }

    #[tokio::test]
    async fn test_failed_event_carries_span_attributes() {
        let mut plan = DeploymentPlanBuilder::new("test");
        plan.declare(StackSpec::new("search", search_reading_pool())).unwrap();
        let h = harness(plan.build().unwrap(), FailureMode::FailFast);
        h.deployer.deploy().await;

        let failed = h.sink.events_of_type(events::STACK_FAILED);
        assert_eq!(failed.len(), 1);
        let attributes = &failed[0].1["attributes"];
        assert_eq!(attributes["stack.name"], "search");
        assert_eq!(attributes["stack.status"], "failed");
        assert!(attributes["stack.error"]
            .as_str()
            .unwrap()
            .contains("user-pool-id"));
    }
}
