//! Effective-variable resolution for a single leaf invocation.
//!
//! Precedence per name, highest first:
//!
//! 1. parameters bound on the leaf and its ancestors (nearer nodes win),
//!    with `$name` tokens substituted
//! 2. the root state
//! 3. the caller's override set
//!
//! The running input slot is filled from an explicit `INPUT` parameter,
//! else the last completed leaf's value (even when empty), else the
//! caller's input, else the root state's `INPUT`. An `INPUT` parameter on
//! a composite only seeds the first leaf that runs beneath it.

use crate::{NodeId, Plan, PlanError};
use regex::{Captures, Regex};
use stepplan_context::Variables;
use std::sync::LazyLock;

static VARIABLE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z0-9_]+)").expect("variable token regex should compile")
});

/// Replaces each `$name` token whose name `lookup` knows.
///
/// Unknown tokens are left exactly as written, `$` included, so payloads
/// carrying literal `$identifier` text pass through. One pass only: values
/// brought in by a replacement are not scanned again.
pub fn substitute<'a, F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    VARIABLE_TOKEN
        .replace_all(text, |caps: &Captures| match lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

/// Resolves leaf inputs against one plan and one caller override set
pub struct VariableResolver<'a> {
    plan: &'a Plan,
    overrides: &'a Variables,
    running_input: Option<&'a str>,
}

impl<'a> VariableResolver<'a> {
    pub fn new(plan: &'a Plan, overrides: &'a Variables) -> Self {
        let running_input = match plan.last_result() {
            Some(last) => Some(last),
            None => non_empty(overrides.input()).or_else(|| non_empty(plan.state().input())),
        };

        Self {
            plan,
            overrides,
            running_input,
        }
    }

    /// The value the running input slot gets when no parameter sets it
    pub fn running_input(&self) -> &'a str {
        self.running_input.unwrap_or_default()
    }

    /// Value a `$name` token expands to
    pub fn lookup(&self, name: &str) -> Option<&'a str> {
        if name == Variables::INPUT && self.running_input.is_some() {
            return self.running_input;
        }
        self.plan
            .state()
            .get(name)
            .or_else(|| self.overrides.get(name))
    }

    pub fn expand(&self, text: &str) -> String {
        substitute(text, |name| self.lookup(name))
    }

    /// Parameters of `id` merged with those of its ancestors, nearer wins.
    ///
    /// An ancestor's `INPUT` is dropped once any leaf beneath it has run, so
    /// it seeds the subtree instead of pinning every leaf in it.
    pub fn bound_parameters(&self, id: NodeId) -> Result<Variables, PlanError> {
        let mut parameters = Variables::new();
        for node in self.plan.ancestry(id)? {
            let seeds_input = node == id || !self.plan.has_started(node);
            for (key, value) in self.plan.try_node(node)?.parameters.iter() {
                if key == Variables::INPUT && !seeds_input {
                    continue;
                }
                parameters.set(key, value);
            }
        }
        Ok(parameters)
    }

    /// Effective variable set for invoking leaf `id`
    pub fn resolve(&self, id: NodeId) -> Result<Variables, PlanError> {
        let mut resolved = Variables::new();
        for (key, value) in self.bound_parameters(id)?.iter() {
            resolved.set(key, self.expand(value));
        }

        if resolved.input().is_empty() {
            resolved.set_input(self.running_input());
        }

        // INPUT is already present, so neither source can replace it
        resolved.fill_missing(self.plan.state());
        resolved.fill_missing(self.overrides);

        Ok(resolved)
    }
}
