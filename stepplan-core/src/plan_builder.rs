use crate::{ExecutionContext, Function, FunctionResult, InvokeSettings, Plan, PlanStep};
use anyhow::Result;
use std::sync::Arc;

/// Builder for creating plans with a fluent API
pub struct PlanBuilder {
    plan: Plan,
}

impl PlanBuilder {
    /// Creates a builder for a composite plan pursuing `goal`
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            plan: Plan::new(goal),
        }
    }

    /// Adds a leaf step bound to `function`
    pub fn step(self, function: Arc<dyn Function>) -> Self {
        self.push(PlanStep::Function(function))
    }

    /// Adds a leaf step and lets `configure` bind its parameters and outputs
    pub fn step_with<F>(self, function: Arc<dyn Function>, configure: F) -> Self
    where
        F: FnOnce(Plan) -> Plan,
    {
        let leaf = configure(Plan::from_function(function));
        self.push(PlanStep::Plan(leaf))
    }

    /// Adds a whole sub-plan as one nested step
    pub fn subplan(self, plan: Plan) -> Self {
        self.push(PlanStep::Plan(plan))
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.plan = self.plan.with_name(name);
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.plan = self.plan.with_parameter(key, value);
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.plan = self.plan.with_output(name);
        self
    }

    pub fn state(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.plan = self.plan.with_state(key, value);
        self
    }

    pub fn settings(mut self, settings: InvokeSettings) -> Self {
        self.plan = self.plan.with_settings(settings);
        self
    }

    // the root comes from `Plan::new` and never binds a function
    fn push(mut self, step: PlanStep) -> Self {
        self.plan.push_step(step);
        self
    }

    /// Builds the plan
    pub fn build(self) -> Plan {
        self.plan
    }

    /// Builds and runs the plan to completion
    pub async fn invoke(self, ctx: &mut ExecutionContext) -> Result<FunctionResult> {
        self.build().invoke(ctx).await
    }
}
