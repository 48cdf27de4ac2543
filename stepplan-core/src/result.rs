use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use stepplan_context::Variables;
use std::str::FromStr;

/// Terminal outcome of running a plan to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionResult {
    variables: Variables,
    value: Option<String>,
    metadata: Variables,
}

impl FunctionResult {
    pub fn new(variables: Variables, value: Option<String>, metadata: Variables) -> Self {
        Self {
            variables,
            value,
            metadata,
        }
    }

    /// Final variable set as seen by the caller
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn into_variables(self) -> Variables {
        self.variables
    }

    /// Primary value; `None` when no function ever ran
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn parse_value<T: FromStr>(&self) -> Option<T> {
        self.value()?.parse().ok()
    }

    /// Deserializes the primary value as JSON
    pub fn json_value<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.value()
            .map(|value| serde_json::from_str(value).context("primary value is not valid JSON"))
            .transpose()
    }

    /// Value published under a declared output name
    pub fn try_get_output(&self, name: &str) -> Option<&str> {
        self.metadata.get(name)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata.iter()
    }
}
