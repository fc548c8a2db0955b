//! Sequential deployment of a validated plan.
//!
//! Stacks are deployed one at a time in plan order. For each stack the
//! deployer prefetches declared imports, runs the builder, provisions the
//! template, resolves published parameters against the engine's report and
//! writes them through the [`ParameterExchange`]. Values published by a stack
//! are handed in memory to the stacks deployed after it.

mod integration_tests;
mod report;

pub use report::{DeploymentReport, StackDeployment, StackOutcome, StackStatus};

use crate::engine::ProvisioningEngine;
use crate::errors::{ParameterStoreError, PlanError, ProvisioningError, StackflowError};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::observability::{DeploymentSpanAttributes, SpanTimer, StackSpanAttributes};
use crate::params::{ParameterExchange, ParameterKey, ParameterStore, ParameterValue};
use crate::plan::{DeploymentPlan, FailureCollector, FailureMode, FailureRecord};
use crate::resources::{OutputValue, ResolvedAttributes, StackTemplate};
use crate::stacks::{ProducedValue, StackContext, StackInputs};
use crate::target::DeploymentTarget;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Deploys, synthesizes and tears down the stacks of one plan.
#[derive(Debug)]
pub struct Deployer {
    plan: DeploymentPlan,
    engine: Arc<dyn ProvisioningEngine>,
    exchange: ParameterExchange,
    events: Arc<dyn EventSink>,
    failure_mode: FailureMode,
    produced: RwLock<HashMap<ParameterKey, ProducedValue>>,
}

impl Deployer {
    /// Creates a deployer.
    #[must_use]
    pub fn new(
        plan: DeploymentPlan,
        engine: Arc<dyn ProvisioningEngine>,
        store: Arc<dyn ParameterStore>,
        target: DeploymentTarget,
    ) -> Self {
        Self {
            plan,
            engine,
            exchange: ParameterExchange::new(target, store),
            events: Arc::new(NoOpEventSink),
            failure_mode: FailureMode::default(),
            produced: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Returns the plan.
    #[must_use]
    pub fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    /// Returns the parameter exchange.
    #[must_use]
    pub fn exchange(&self) -> &ParameterExchange {
        &self.exchange
    }

    /// Returns the deployment target.
    #[must_use]
    pub fn target(&self) -> &DeploymentTarget {
        self.exchange.target()
    }

    /// Deploys every stack in plan order.
    ///
    /// Stack failures do not abort the call; they are recorded in the report
    /// and the failure mode decides which later stacks are still attempted.
    pub async fn deploy(&self) -> DeploymentReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = SpanTimer::start(self.plan.name());
        let attrs = DeploymentSpanAttributes::new()
            .with_deployment_name(self.plan.name())
            .with_run_id(run_id.to_string())
            .with_target(&self.target().account, &self.target().region)
            .with_failure_mode(format!("{:?}", self.failure_mode));

        info!(
            deployment = %self.plan.name(),
            run_id = %run_id,
            stacks = self.plan.stack_count(),
            attributes = ?attrs.to_attributes(),
            "Deployment started"
        );

        let mut collector = FailureCollector::new(self.failure_mode);
        let mut outcomes = Vec::with_capacity(self.plan.stack_count());

        for name in self.plan.deployment_order() {
            let upstream = self.plan.transitive_dependencies(name);
            if collector.should_stop() || !collector.can_run(&upstream) {
                collector.record_skip(name);
                self.emit(events::STACK_SKIPPED, name, json!({"reason": "earlier failure"}))
                    .await;
                outcomes.push(StackOutcome {
                    stack: name.clone(),
                    status: StackStatus::Skipped,
                    duration_ms: 0.0,
                    deployment: None,
                    error: Some("skipped after an earlier failure".to_string()),
                });
                continue;
            }

            let stack_timer = SpanTimer::start(name.as_str());
            self.emit(events::STACK_STARTED, name, json!({"dependencies": self.plan.dependencies_of(name)}))
                .await;

            let result = self
                .deploy_stack(name)
                .instrument(info_span!("stack", deployment = %self.plan.name(), stack = %name))
                .await;
            let duration_ms = stack_timer.finish();

            match result {
                Ok(deployment) => {
                    collector.record_completion(name);
                    let status = if deployment.unchanged {
                        StackStatus::Unchanged
                    } else {
                        StackStatus::Deployed
                    };
                    let span = StackSpanAttributes::new(name.as_str())
                        .with_status(status.as_str())
                        .with_duration_ms(duration_ms)
                        .with_published(deployment.published.keys().cloned().collect());
                    self.emit(
                        events::STACK_DEPLOYED,
                        name,
                        json!({
                            "status": status.as_str(),
                            "duration_ms": duration_ms,
                            "fingerprint": deployment.fingerprint,
                            "attributes": span.to_attributes(),
                        }),
                    )
                    .await;
                    outcomes.push(StackOutcome {
                        stack: name.clone(),
                        status,
                        duration_ms,
                        deployment: Some(deployment),
                        error: None,
                    });
                }
                Err(err) => {
                    warn!(stack = %name, error = %err, kind = err.kind(), "Stack failed");
                    collector.record_failure(
                        FailureRecord::new(name.as_str(), err.to_string()).with_error_type(err.kind()),
                    );
                    let span = StackSpanAttributes::new(name.as_str())
                        .with_status(StackStatus::Failed.as_str())
                        .with_duration_ms(duration_ms)
                        .with_error(err.to_string());
                    self.emit(
                        events::STACK_FAILED,
                        name,
                        json!({
                            "error": err.to_string(),
                            "error_type": err.kind(),
                            "duration_ms": duration_ms,
                            "attributes": span.to_attributes(),
                        }),
                    )
                    .await;
                    outcomes.push(StackOutcome {
                        stack: name.clone(),
                        status: StackStatus::Failed,
                        duration_ms,
                        deployment: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let summary = collector.summary(self.plan.stack_count());
        let duration_ms = timer.finish();
        info!(
            deployment = %self.plan.name(),
            run_id = %run_id,
            completed = summary.completed_stacks,
            failed = summary.failed_stacks,
            skipped = summary.skipped_stacks,
            duration_ms,
            "Deployment finished"
        );

        DeploymentReport {
            deployment: self.plan.name().to_string(),
            run_id,
            target: self.target().clone(),
            started_at,
            duration_ms,
            stacks: outcomes,
            summary,
        }
    }

    /// Deploys a single stack.
    ///
    /// Values from dependencies must already have been produced in this
    /// deployer, so this is normally called by [`Deployer::deploy`].
    ///
    /// # Errors
    ///
    /// Returns the first error from the builder, the engine or the exchange.
    pub async fn deploy_stack(&self, name: &str) -> Result<StackDeployment, StackflowError> {
        let spec = self.plan.stack(name).ok_or_else(|| unknown_stack(name))?;

        let mut imports = HashMap::new();
        for key in spec.import_keys() {
            match self.exchange.read_parameter(&key).await {
                Ok(value) => {
                    imports.insert(key, value);
                }
                Err(ParameterStoreError::NotFound(_)) => {
                    debug!(stack = %name, key = %key, "Import not present in store");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let produced = self.produced.read().clone();
        let template = self.build_template(name, produced, imports)?;

        let report = self.engine.provision(&template).await?;

        let mut published = BTreeMap::new();
        for parameter in &template.parameters {
            let value = resolve(name, &parameter.value, &report.attributes)?;
            let value = ParameterValue {
                value,
                kind: parameter.kind,
            };
            self.exchange
                .publish_parameter(name, &parameter.key, value.clone())
                .await?;
            self.produced.write().insert(
                parameter.key.clone(),
                ProducedValue {
                    producer: name.to_string(),
                    value: value.clone(),
                },
            );
            self.emit(
                events::PARAMETER_PUBLISHED,
                name,
                json!({"key": parameter.key.as_str(), "value": value.as_str()}),
            )
            .await;
            published.insert(parameter.key.to_string(), value.value);
        }

        let mut outputs = BTreeMap::new();
        for output in &template.outputs {
            outputs.insert(output.name.clone(), resolve(name, &output.value, &report.attributes)?);
        }

        info!(
            stack = %name,
            unchanged = report.unchanged,
            published = published.len(),
            "Stack deployed"
        );

        Ok(StackDeployment {
            stack: name.to_string(),
            fingerprint: report.fingerprint,
            unchanged: report.unchanged,
            resource_count: template.resource_count(),
            published,
            outputs,
        })
    }

    /// Tears down one stack and deletes the parameters it published.
    ///
    /// No ordering check is made against dependents.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack is unknown, or the engine or store fails.
    pub async fn destroy(&self, name: &str) -> Result<Vec<ParameterKey>, StackflowError> {
        let spec = self.plan.stack(name).ok_or_else(|| unknown_stack(name))?;

        self.engine.destroy(self.target(), name).await?;

        let mut retired = self.exchange.retire_stack(name).await?;
        for key in spec.export_keys() {
            if !retired.contains(&key) && self.exchange.store().delete(self.target(), &key).await? {
                retired.push(key);
            }
        }
        self.produced.write().retain(|_, p| p.producer != name);

        let keys: Vec<&str> = retired.iter().map(ParameterKey::as_str).collect();
        info!(stack = %name, parameters = ?keys, "Stack destroyed");
        self.emit(events::STACK_DESTROYED, name, json!({"parameters": keys})).await;
        Ok(retired)
    }

    /// Tears down every stack in reverse deployment order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failure.
    pub async fn destroy_all(&self) -> Result<Vec<String>, StackflowError> {
        let mut destroyed = Vec::with_capacity(self.plan.stack_count());
        for name in self.plan.teardown_order() {
            self.destroy(&name).await?;
            destroyed.push(name);
        }
        Ok(destroyed)
    }

    /// Runs every builder without provisioning and returns the templates.
    ///
    /// Values from dependencies appear as tokens, imports as store
    /// references.
    ///
    /// # Errors
    ///
    /// Returns the first builder error.
    pub fn synth(&self) -> Result<Vec<StackTemplate>, StackflowError> {
        let mut produced: HashMap<ParameterKey, ProducedValue> = HashMap::new();
        let mut templates = Vec::with_capacity(self.plan.stack_count());

        for name in self.plan.deployment_order() {
            let imports: HashMap<ParameterKey, ParameterValue> = self
                .plan
                .stack(name)
                .map(|spec| {
                    spec.import_keys()
                        .into_iter()
                        .map(|key| {
                            let token = ParameterValue::string(format!("{{{{resolve:ssm:{key}}}}}"));
                            (key, token)
                        })
                        .collect()
                })
                .unwrap_or_default();

            let template = self.build_template(name, produced.clone(), imports)?;
            for parameter in &template.parameters {
                produced.insert(
                    parameter.key.clone(),
                    ProducedValue {
                        producer: name.clone(),
                        value: ParameterValue {
                            value: parameter.value.to_string(),
                            kind: parameter.kind,
                        },
                    },
                );
            }
            debug!(stack = %name, resources = template.resource_count(), "Stack synthesized");
            templates.push(template);
        }

        Ok(templates)
    }

    fn build_template(
        &self,
        name: &str,
        produced: HashMap<ParameterKey, ProducedValue>,
        imports: HashMap<ParameterKey, ParameterValue>,
    ) -> Result<StackTemplate, StackflowError> {
        let spec = self.plan.stack(name).ok_or_else(|| unknown_stack(name))?;

        let upstream = self.plan.transitive_dependencies(name);
        let inputs = StackInputs::new(produced, upstream, name);
        let mut ctx = StackContext::new(name, self.target().clone(), inputs)
            .with_imports(imports)
            .with_exports(spec.export_keys().into_iter().collect())
            .with_dependencies(spec.dependencies.clone());

        spec.builder.build(&mut ctx)?;
        Ok(ctx.into_template())
    }

    async fn emit(&self, event_type: &str, stack: &str, extra: serde_json::Value) {
        self.events
            .emit(event_type, events::stack_payload(self.plan.name(), stack, extra))
            .await;
    }
}

fn resolve(stack: &str, value: &OutputValue, attributes: &ResolvedAttributes) -> Result<String, ProvisioningError> {
    value
        .resolve(attributes)
        .ok_or_else(|| ProvisioningError::new(stack, format!("engine did not report {value}")))
}

fn unknown_stack(name: &str) -> PlanError {
    PlanError::new(format!("Unknown stack '{name}'")).with_stacks(vec![name.to_string()])
}
