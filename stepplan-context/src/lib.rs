//! # StepPlan Context
//!
//! Variable sets and the per-run invocation context for StepPlan

mod variables;

pub use tokio_util::sync::CancellationToken;
pub use variables::Variables;

use std::time::Instant;
use uuid::Uuid;

/// Caller-owned context for one plan run.
///
/// `variables` carries the caller's override set together with the running
/// input slot; the executor writes each step result back into it. The
/// cancellation token is handed verbatim to every callable.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub trace_id: String,
    pub variables: Variables,
    pub errors: Vec<String>,
    pub step_logs: Vec<StepLog>,
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct StepLog {
    pub step_name: String,
    pub start_time: Instant,
    pub end_time: Option<Instant>,
    pub status: StepStatus,
    pub error_message: Option<String>,
    pub trace_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Success,
    Failed,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new_with_trace_id(Uuid::new_v4().to_string())
    }
}

impl ExecutionContext {
    pub fn new(variables: Variables) -> Self {
        Self {
            variables,
            ..Self::default()
        }
    }

    /// Context whose running input is `input` and nothing else
    pub fn with_input(input: impl Into<String>) -> Self {
        Self::new(Variables::with_input(input))
    }

    pub fn new_with_trace_id(trace_id: String) -> Self {
        Self {
            trace_id,
            variables: Variables::new(),
            errors: Vec::new(),
            step_logs: Vec::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        tracing::debug!(trace_id = %self.trace_id, key = %key, value = %value, "set variable");

        self.variables.set(key, value);
    }

    pub fn get_variable(&self, key: &str) -> Option<&str> {
        self.variables.get(key)
    }

    pub fn start_step(&mut self, step_name: impl Into<String>) {
        let step_name = step_name.into();
        tracing::info!(trace_id = %self.trace_id, step = %step_name, "step starting");

        self.step_logs.push(StepLog {
            step_name,
            start_time: Instant::now(),
            end_time: None,
            status: StepStatus::Running,
            error_message: None,
            trace_id: self.trace_id.clone(),
        });
    }

    pub fn end_step_success(&mut self, step_name: &str) {
        if let Some(log) = self.running_step(step_name) {
            let now = Instant::now();
            log.end_time = Some(now);
            log.status = StepStatus::Success;
            let duration = now.duration_since(log.start_time);

            tracing::info!(
                trace_id = %self.trace_id,
                step = %step_name,
                duration_ms = ?duration,
                "step success"
            );
        }
    }

    pub fn end_step_failed(&mut self, step_name: &str, error: &str) {
        if let Some(log) = self.running_step(step_name) {
            let now = Instant::now();
            log.end_time = Some(now);
            log.status = StepStatus::Failed;
            log.error_message = Some(error.to_string());
            let duration = now.duration_since(log.start_time);

            tracing::error!(
                trace_id = %self.trace_id,
                step = %step_name,
                duration_ms = ?duration,
                error = %error,
                "step failed"
            );
        }
        self.errors
            .push(format!("[{}] {}: {}", self.trace_id, step_name, error));
    }

    fn running_step(&mut self, step_name: &str) -> Option<&mut StepLog> {
        self.step_logs
            .iter_mut()
            .rev()
            .find(|log| log.step_name == step_name && log.status == StepStatus::Running)
    }

    pub fn count_steps(&self, status: StepStatus) -> usize {
        self.step_logs
            .iter()
            .filter(|log| log.status == status)
            .count()
    }
}
