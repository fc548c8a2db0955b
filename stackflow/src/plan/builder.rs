//! Deployment plan builder with validation.

use super::{DeploymentPlan, StackSpec};
use crate::errors::{codes, ContractErrorInfo, CycleDetectedError, PlanError};
use crate::stacks::StackBuilder;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Builder for creating validated deployment plans.
///
/// Every check runs here, before any provisioning call is made.
#[derive(Debug, Clone)]
pub struct DeploymentPlanBuilder {
    /// The deployment name.
    name: String,
    /// The stack specifications.
    stacks: HashMap<String, StackSpec>,
    /// Declaration order for stacks.
    stack_order: Vec<String>,
}

impl DeploymentPlanBuilder {
    /// Creates a new plan builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stacks: HashMap::new(),
            stack_order: Vec::new(),
        }
    }

    /// Declares a stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a dependency has not been
    /// declared yet.
    pub fn declare_stack(
        mut self,
        name: impl Into<String>,
        builder: Arc<dyn StackBuilder>,
        dependencies: &[&str],
    ) -> Result<Self, PlanError> {
        let spec = StackSpec::new(name, builder).with_dependencies(dependencies.iter().copied());
        self.declare(spec)?;
        Ok(self)
    }

    /// Declares a stack from a full specification.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails (blank or duplicate name, self
    /// dependency, forward reference, malformed key).
    pub fn declare(&mut self, spec: StackSpec) -> Result<(), PlanError> {
        spec.validate()?;

        if self.stacks.contains_key(&spec.name) {
            return Err(PlanError::new(format!("Stack '{}' is declared more than once", spec.name))
                .with_stacks(vec![spec.name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(codes::DUPLICATE, format!("Duplicate stack name '{}'", spec.name))
                        .with_fix_hint("Stack names must be unique within a deployment."),
                ));
        }

        for dep in &spec.dependencies {
            if !self.stacks.contains_key(dep) {
                return Err(missing_dependency(&spec.name, dep));
            }
        }

        debug!(
            deployment = %self.name,
            stack = %spec.name,
            dependencies = ?spec.dependencies,
            "Stack declared"
        );
        self.stack_order.push(spec.name.clone());
        self.stacks.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Adds an explicit edge between two declared stacks.
    ///
    /// Unlike `declare`, the dependency may have been declared after the
    /// dependent, so this is the one way a cycle can enter the plan. Cycles
    /// are reported by `resolve_deployment_order` and `build`.
    ///
    /// # Errors
    ///
    /// Returns an error if either stack is unknown or they are the same.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> Result<(), PlanError> {
        if dependent == dependency {
            return Err(PlanError::new(format!("Stack '{dependent}' cannot depend on itself"))
                .with_stacks(vec![dependent.to_string()])
                .with_error_info(ContractErrorInfo::new(
                    codes::SELF_DEP,
                    format!("Stack '{dependent}' lists itself as a dependency"),
                )));
        }
        if !self.stacks.contains_key(dependency) {
            return Err(missing_dependency(dependent, dependency));
        }
        let Some(spec) = self.stacks.get_mut(dependent) else {
            return Err(PlanError::new(format!("Unknown stack '{dependent}'"))
                .with_stacks(vec![dependent.to_string()])
                .with_error_info(ContractErrorInfo::new(
                    codes::MISSING_DEP,
                    format!("Stack '{dependent}' not found"),
                )));
        };

        if !spec.depends_on(dependency) {
            spec.dependencies.push(dependency.to_string());
        }
        Ok(())
    }

    /// Composes this builder with another.
    ///
    /// Stacks present in both must have identical edges and parameter
    /// declarations.
    ///
    /// # Errors
    ///
    /// Returns an error if there are conflicting stack definitions.
    pub fn compose(mut self, other: Self) -> Result<Self, PlanError> {
        self.name = format!("{}+{}", self.name, other.name);

        let mut other_stacks = other.stacks;
        for name in other.stack_order {
            let Some(other_spec) = other_stacks.remove(&name) else {
                continue;
            };
            if let Some(existing) = self.stacks.get(&name) {
                if !specs_compatible(existing, &other_spec) {
                    return Err(PlanError::new(format!("Conflicting stack definitions for '{name}'"))
                        .with_stacks(vec![name.clone()])
                        .with_error_info(
                            ContractErrorInfo::new(
                                codes::DUPLICATE,
                                format!("Stack '{name}' has different definitions in composed plans"),
                            )
                            .with_fix_hint("Rename one of the stacks or make their declarations identical."),
                        ));
                }
            } else {
                self.stack_order.push(name.clone());
                self.stacks.insert(name, other_spec);
            }
        }

        Ok(self)
    }

    /// Computes a deployment order in which every stack follows all of its
    /// dependencies.
    ///
    /// Ties between independent stacks are broken by declaration order; that
    /// order is an implementation detail.
    ///
    /// # Errors
    ///
    /// Returns `CycleDetectedError` if the dependency graph has a cycle.
    pub fn resolve_deployment_order(&self) -> Result<Vec<String>, CycleDetectedError> {
        let mut remaining: HashMap<&str, usize> = self
            .stacks
            .iter()
            .map(|(name, spec)| (name.as_str(), spec.dependencies.len()))
            .collect();
        let mut order = Vec::with_capacity(self.stacks.len());

        while !remaining.is_empty() {
            let next = self
                .stack_order
                .iter()
                .find(|name| remaining.get(name.as_str()) == Some(&0));

            let Some(next) = next else {
                let pending: HashSet<&str> = remaining.keys().copied().collect();
                return Err(CycleDetectedError::new(self.find_cycle(&pending)));
            };

            remaining.remove(next.as_str());
            for (name, count) in &mut remaining {
                if self.stacks[*name].depends_on(next) {
                    *count -= 1;
                }
            }
            order.push(next.clone());
        }

        Ok(order)
    }

    /// Builds the deployment plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stacks, the graph has a cycle,
    /// or the declared parameter flow is inconsistent with the edges.
    pub fn build(self) -> Result<DeploymentPlan, PlanError> {
        if self.stacks.is_empty() {
            return Err(PlanError::new("Deployment has no stacks").with_error_info(
                ContractErrorInfo::new(codes::EMPTY, "Cannot build an empty deployment")
                    .with_fix_hint("Declare at least one stack before building."),
            ));
        }

        let order = self.resolve_deployment_order()?;
        let plan = DeploymentPlan::new(self.name, self.stacks, order);
        plan.validate_parameter_flow()?;
        Ok(plan)
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

    /// Returns true if a stack with this name is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stacks.contains_key(name)
    }

    /// Finds one cycle among `pending`, which must contain at least one.
    fn find_cycle(&self, pending: &HashSet<&str>) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for name in &self.stack_order {
            if pending.contains(name.as_str()) && !visited.contains(name.as_str()) {
                if let Some(cycle) = self.dfs_cycle(name, &mut visited, &mut rec_stack, &mut path) {
                    return cycle;
                }
            }
        }

        pending.iter().map(|s| (*s).to_string()).collect()
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(spec) = self.stacks.get(node) {
            for dep in &spec.dependencies {
                if !visited.contains(dep) {
                    if let Some(cycle) = self.dfs_cycle(dep, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(dep) {
                    let start = path.iter().position(|n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }
}

fn missing_dependency(stack: &str, dep: &str) -> PlanError {
    PlanError::new(format!("Stack '{stack}' depends on unknown stack '{dep}'"))
        .with_stacks(vec![stack.to_string(), dep.to_string()])
        .with_error_info(
            ContractErrorInfo::new(codes::MISSING_DEP, format!("Dependency '{dep}' not found"))
                .with_fix_hint("Declare the dependency before the stack that depends on it."),
        )
}

fn specs_compatible(a: &StackSpec, b: &StackSpec) -> bool {
    a.dependencies == b.dependencies
        && a.exports == b.exports
        && a.requires == b.requires
        && a.imports == b.imports
}
