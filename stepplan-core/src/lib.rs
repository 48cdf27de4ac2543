//! # StepPlan Core
//!
//! Plan trees, variable resolution and depth-first stepwise execution.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
mod executor;
mod function;
mod plan;
mod plan_builder;
mod registry;
mod resolver;
mod result;


pub use error::PlanError;
pub use executor::{ExecutorConfig, PlanExecutor, StepOutcome};
pub use function::{
    Function, FunctionFuture, FunctionOutput, FunctionView, InvokeSettings, NativeFunction,
    ParameterView,
};
pub use plan::{NodeId, Plan, PlanNode, PlanStep};
pub use plan_builder::PlanBuilder;
pub use registry::FunctionRegistry;
pub use resolver::{substitute, VariableResolver};
pub use result::FunctionResult;
pub use stepplan_context::{CancellationToken, ExecutionContext, Variables};

/// Prelude module for core functionality
pub mod prelude {
    pub use crate::{
        Function, FunctionRegistry, FunctionResult, NativeFunction, Plan, PlanBuilder,
        PlanExecutor, PlanStep, StepOutcome,
    };
    pub use stepplan_context::{ExecutionContext, Variables};
}
