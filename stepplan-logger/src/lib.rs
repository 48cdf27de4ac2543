//! # StepPlan Logger
//!
//! Logging and tracing support for StepPlan runs

use stepplan_context::{ExecutionContext, StepLog, StepStatus};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Logger for StepPlan runs
pub struct Logger {
    pub trace_id: String,
}

impl Logger {
    /// Create a new logger
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific trace ID
    pub fn with_trace_id(trace_id: String) -> Self {
        Self { trace_id }
    }

    /// Create a logger sharing the trace ID of a run
    pub fn for_context(context: &ExecutionContext) -> Self {
        Self::with_trace_id(context.trace_id.clone())
    }

    /// Initialize tracing subscriber
    pub fn init_tracing() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }

    /// Initialize a JSON tracing subscriber; returns false when one is
    /// already installed
    pub fn try_init_json_tracing() -> bool {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init()
            .is_ok()
    }

    /// Logs the counters of a run, one line per step and every recorded
    /// error, all tagged with this logger's trace ID
    pub fn log_run_summary(&self, context: &ExecutionContext) {
        info!(
            trace_id = %self.trace_id,
            total_steps = context.step_logs.len(),
            success = context.count_steps(StepStatus::Success),
            failed = context.count_steps(StepStatus::Failed),
            running = context.count_steps(StepStatus::Running),
            variables = context.variables.len(),
            errors = context.errors.len(),
            "Plan run summary"
        );

        for step_log in &context.step_logs {
            self.log_step(step_log);
        }
        for error in &context.errors {
            error!(trace_id = %self.trace_id, "Plan error: {}", error);
        }
    }

    fn log_step(&self, step_log: &StepLog) {
        let duration_ms = step_log
            .end_time
            .map(|end| end.duration_since(step_log.start_time).as_millis())
            .unwrap_or_default();

        match step_log.status {
            StepStatus::Success => {
                info!(
                    trace_id = %self.trace_id,
                    step = %step_log.step_name,
                    duration_ms,
                    "Step completed"
                );
            }
            StepStatus::Failed => {
                error!(
                    trace_id = %self.trace_id,
                    step = %step_log.step_name,
                    duration_ms,
                    error = step_log.error_message.as_deref().unwrap_or("unknown"),
                    "Step failed"
                );
            }
            StepStatus::Running => {
                warn!(trace_id = %self.trace_id, step = %step_log.step_name, "Step still running");
            }
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
