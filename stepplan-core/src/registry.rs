use crate::{Function, FunctionView, PlanError};
use std::{collections::HashMap, sync::Arc};

/// Functions known to a host, keyed by qualified name (`skill.name`).
///
/// Plans reference functions, they never own them; the registry is where a
/// persisted plan finds its callables again when it is loaded.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function under its qualified name
    pub fn register(&mut self, function: Arc<dyn Function>) -> Result<(), PlanError> {
        let name = function.describe().qualified_name();
        if self.functions.contains_key(&name) {
            return Err(PlanError::DuplicateFunction(name));
        }
        tracing::debug!(function = %name, "registered function");
        self.functions.insert(name, function);
        Ok(())
    }

    pub fn with(mut self, function: Arc<dyn Function>) -> Result<Self, PlanError> {
        self.register(function)?;
        Ok(self)
    }

    pub fn get(&self, qualified_name: &str) -> Result<Arc<dyn Function>, PlanError> {
        self.functions
            .get(qualified_name)
            .cloned()
            .ok_or_else(|| PlanError::FunctionNotFound(qualified_name.to_string()))
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.functions.contains_key(qualified_name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Descriptors of every registered function, sorted by qualified name
    pub fn views(&self) -> Vec<FunctionView> {
        let mut views: Vec<_> = self.functions.values().map(|f| f.describe()).collect();
        views.sort_by_key(|view| view.qualified_name());
        views
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NativeFunction;
    use stepplan_context::Variables;

    fn echo(skill: &str, name: &str) -> Arc<dyn Function> {
        NativeFunction::new(skill, name, |vars: Variables| async move {
            Ok(vars.input().to_string())
        })
        .shared()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = FunctionRegistry::new()
            .with(echo("writer", "summarize"))
            .unwrap()
            .with(echo("writer", "translate"))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("writer.summarize"));
        assert!(registry.get("writer.translate").is_ok());
        assert!(matches!(
            registry.get("writer.missing"),
            Err(PlanError::FunctionNotFound(name)) if name == "writer.missing"
        ));

        let names: Vec<_> = registry.views().iter().map(|v| v.qualified_name()).collect();
        assert_eq!(names, vec!["writer.summarize", "writer.translate"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = FunctionRegistry::new();
        registry.register(echo("writer", "summarize")).unwrap();
        assert!(matches!(
            registry.register(echo("writer", "summarize")),
            Err(PlanError::DuplicateFunction(_))
        ));
    }
}
