use crate::PlanError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stepplan_context::{CancellationToken, Variables};
use std::{future::Future, pin::Pin, sync::Arc};

/// Future returned by a [`NativeFunction`] handler
pub type FunctionFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;
type Handler = Box<dyn Fn(Variables) -> FunctionFuture + Send + Sync>;

/// Capability contract for a leaf compute unit.
///
/// The executor knows nothing about a function beyond this trait: it hands
/// over the resolved variable set, the node's settings and the run's
/// cancellation token, and gets back a primary value plus an updated
/// variable set, or an error which it propagates untouched.
#[async_trait]
pub trait Function: Send + Sync {
    /// Static descriptor, used for introspection and registry lookup only
    fn describe(&self) -> FunctionView;

    async fn invoke(
        &self,
        variables: Variables,
        settings: Option<&InvokeSettings>,
        cancellation: CancellationToken,
    ) -> Result<FunctionOutput>;
}

/// What a successful invocation hands back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionOutput {
    /// Primary value; becomes the running input and feeds declared outputs
    pub value: String,
    /// Variable set the function ended with. Informational only: the
    /// executor threads `value` and never reads these entries back.
    pub variables: Variables,
}

impl FunctionOutput {
    pub fn new(value: impl Into<String>, variables: Variables) -> Self {
        Self {
            value: value.into(),
            variables,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionView {
    pub skill_name: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterView>,
}

impl FunctionView {
    pub fn new(skill_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            skill_name: skill_name.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// `skill.name`, or just `name` for functions outside any skill
    pub fn qualified_name(&self) -> String {
        if self.skill_name.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.skill_name, self.name)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterView {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

/// Opaque settings bag carried on a node and passed to its function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvokeSettings {
    values: serde_json::Map<String, serde_json::Value>,
}

impl InvokeSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Adapts an async closure into a [`Function`].
///
/// The closure receives the resolved variables and returns the primary
/// value; the updated variable set is the input set with its running input
/// replaced by that value. Cancellation of the run's token aborts the
/// closure and surfaces as [`PlanError::Cancelled`].
pub struct NativeFunction {
    view: FunctionView,
    handler: Handler,
}

impl NativeFunction {
    pub fn new<F, Fut>(skill_name: impl Into<String>, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Variables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            view: FunctionView::new(skill_name, name),
            handler: Box::new(move |variables| Box::pin(f(variables))),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.view.description = description.into();
        self
    }

    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.view.parameters.push(ParameterView {
            name: name.into(),
            description: description.into(),
            default_value: None,
        });
        self
    }

    pub fn shared(self) -> Arc<dyn Function> {
        Arc::new(self)
    }
}

#[async_trait]
impl Function for NativeFunction {
    fn describe(&self) -> FunctionView {
        self.view.clone()
    }

    async fn invoke(
        &self,
        variables: Variables,
        _settings: Option<&InvokeSettings>,
        cancellation: CancellationToken,
    ) -> Result<FunctionOutput> {
        let value = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                return Err(PlanError::Cancelled(self.view.qualified_name()).into());
            }
            value = (self.handler)(variables.clone()) => value?,
        };

        let mut variables = variables;
        variables.update(value.clone());
        Ok(FunctionOutput { value, variables })
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}
