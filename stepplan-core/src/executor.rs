use crate::{FunctionOutput, FunctionResult, NodeId, Plan, VariableResolver};
use anyhow::Result;
use stepplan_context::ExecutionContext;

/// Executor knobs
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Trim surrounding whitespace from each function's primary value
    pub trim_results: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { trim_results: true }
    }
}

/// What a single [`PlanExecutor::step`] call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// One leaf ran and produced `value`
    Executed { node: NodeId, value: String },
    /// The plan had no pending leaf
    Idle,
}

/// Runs plans depth-first, one leaf at a time
#[derive(Debug, Clone, Default)]
pub struct PlanExecutor {
    config: ExecutorConfig,
}

impl PlanExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn has_next_step(&self, plan: &Plan) -> bool {
        plan.has_next_step()
    }

    /// Executes exactly one leaf: the first pending one in depth-first order.
    ///
    /// A failing function leaves the plan untouched, so calling `step` again
    /// retries the same leaf. The error is returned as the function raised it.
    #[tracing::instrument(level = "debug", skip_all, fields(trace_id = %ctx.trace_id))]
    pub async fn step(&self, ctx: &mut ExecutionContext, plan: &mut Plan) -> Result<StepOutcome> {
        let Some(target) = plan.next_step() else {
            tracing::debug!(trace_id = %ctx.trace_id, "no pending step, nothing to do");
            return Ok(StepOutcome::Idle);
        };

        let node = plan.try_node(target)?;
        let Some(function) = node.function().cloned() else {
            return Ok(StepOutcome::Idle);
        };
        let step_name = node.name.clone();
        let settings = node.settings.clone();
        let variables = VariableResolver::new(plan, &ctx.variables).resolve(target)?;

        #[cfg(feature = "detailed-logging")]
        for (key, value) in variables.iter() {
            tracing::debug!(
                trace_id = %ctx.trace_id,
                step = %step_name,
                key = %key,
                value = %value,
                "resolved variable"
            );
        }

        ctx.start_step(step_name.as_str());
        let output = match function
            .invoke(variables, settings.as_ref(), ctx.cancellation.clone())
            .await
        {
            Ok(output) => output,
            Err(err) => {
                ctx.end_step_failed(&step_name, &err.to_string());
                return Err(err);
            }
        };

        let FunctionOutput { value, .. } = output;
        let value = if self.config.trim_results {
            value.trim().to_string()
        } else {
            value
        };

        let published = plan.complete_step(target, &value)?;
        ctx.variables.update(value.as_str());
        for name in published {
            ctx.set_variable(name, value.as_str());
        }
        ctx.end_step_success(&step_name);

        Ok(StepOutcome::Executed {
            node: target,
            value,
        })
    }

    /// Steps until no leaf is pending and returns the terminal result.
    ///
    /// A plan without any leaf is a pass-through: the caller's variables come
    /// back unchanged and no primary value is set.
    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(trace_id = %ctx.trace_id, leaves = plan.leaf_count())
    )]
    pub async fn invoke(
        &self,
        ctx: &mut ExecutionContext,
        plan: &mut Plan,
    ) -> Result<FunctionResult> {
        if !plan.has_next_step() && plan.last_result().is_none() {
            tracing::info!(
                trace_id = %ctx.trace_id,
                "plan has no executable steps, passing input through"
            );
            return Ok(FunctionResult::new(
                ctx.variables.clone(),
                None,
                plan.metadata().clone(),
            ));
        }

        let mut steps = 0usize;
        while plan.has_next_step() {
            self.step(ctx, plan).await?;
            steps += 1;
        }

        if let Some(last) = plan.last_result() {
            ctx.variables.update(last);
        }
        tracing::info!(trace_id = %ctx.trace_id, steps, "plan complete");

        Ok(FunctionResult::new(
            ctx.variables.clone(),
            plan.last_result().map(str::to_string),
            plan.metadata().clone(),
        ))
    }
}
