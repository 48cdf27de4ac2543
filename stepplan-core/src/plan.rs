use crate::{
    ExecutionContext, Function, FunctionResult, InvokeSettings, NativeFunction, PlanError,
    PlanExecutor, StepOutcome,
};
use anyhow::Result;
use stepplan_context::Variables;
use std::{fmt, sync::Arc};

/// Stable handle of a node inside one [`Plan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One unit of a plan tree.
///
/// A node is a leaf when it binds a function and has no children, a
/// composite when it has children and no function, and a no-op otherwise.
/// `parameters`, `outputs`, `state` and `settings` belong to the owner and
/// may be edited freely before the plan runs; the cursor is only moved by
/// the executor (or restored from a persisted plan).
#[derive(Clone)]
pub struct PlanNode {
    pub name: String,
    pub description: String,
    pub parameters: Variables,
    pub outputs: Vec<String>,
    /// Only consulted on the root node
    pub state: Variables,
    pub settings: Option<InvokeSettings>,
    function: Option<Arc<dyn Function>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    cursor: usize,
}

impl PlanNode {
    fn noop(goal: String) -> Self {
        Self {
            name: "plan".to_string(),
            description: goal,
            parameters: Variables::new(),
            outputs: Vec::new(),
            state: Variables::new(),
            settings: None,
            function: None,
            parent: None,
            children: Vec::new(),
            cursor: 0,
        }
    }

    fn leaf(function: Arc<dyn Function>) -> Self {
        let view = function.describe();
        Self {
            name: view.qualified_name(),
            description: view.description,
            function: Some(function),
            ..Self::noop(String::new())
        }
    }

    pub fn function(&self) -> Option<&Arc<dyn Function>> {
        self.function.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Next child to attempt for a composite; 0 or 1 (done) for a leaf
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_leaf(&self) -> bool {
        self.function.is_some() && self.children.is_empty()
    }

    pub fn is_composite(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        self.function.is_none() && self.children.is_empty()
    }

    /// Restores a persisted cursor position
    pub fn resume_at(&mut self, cursor: usize) {
        self.cursor = cursor;
    }
}

impl fmt::Debug for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanNode")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("function", &self.function.as_ref().map(|func| func.describe().qualified_name()))
            .field("parameters", &self.parameters)
            .field("outputs", &self.outputs)
            .field("state", &self.state)
            .field("children", &self.children)
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// Something that can be appended to a plan as a child step
pub enum PlanStep {
    Function(Arc<dyn Function>),
    Plan(Plan),
}

impl From<Arc<dyn Function>> for PlanStep {
    fn from(function: Arc<dyn Function>) -> Self {
        PlanStep::Function(function)
    }
}

impl From<NativeFunction> for PlanStep {
    fn from(function: NativeFunction) -> Self {
        PlanStep::Function(Arc::new(function))
    }
}

impl From<Plan> for PlanStep {
    fn from(plan: Plan) -> Self {
        PlanStep::Plan(plan)
    }
}

/// A plan tree stored as an arena of [`PlanNode`]s.
///
/// Besides the nodes, the plan keeps the run-wide bookkeeping the executor
/// needs to resume: the declared-output metadata and the primary value of
/// the last completed leaf (the running input).
#[derive(Debug, Clone)]
pub struct Plan {
    nodes: Vec<PlanNode>,
    root: NodeId,
    metadata: Variables,
    last_result: Option<String>,
}

impl Plan {
    /// Creates a plan holding only a goal; it runs as a pass-through
    pub fn new(goal: impl Into<String>) -> Self {
        Self::from_root(PlanNode::noop(goal.into()))
    }

    /// Creates a single-leaf plan bound to `function`
    pub fn from_function(function: Arc<dyn Function>) -> Self {
        Self::from_root(PlanNode::leaf(function))
    }

    /// Creates a composite plan; bare functions are wrapped into leaves,
    /// sub-plans stay nested
    pub fn with_steps<I>(goal: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PlanStep>,
    {
        let mut plan = Self::new(goal);
        let root = plan.root;
        for step in steps {
            plan.graft(root, step.into());
        }
        plan
    }

    fn from_root(node: PlanNode) -> Self {
        Self {
            nodes: vec![node],
            root: NodeId(0),
            metadata: Variables::new(),
            last_result: None,
        }
    }

    /// Appends steps to the root
    pub fn add_steps<I>(&mut self, steps: I) -> Result<(), PlanError>
    where
        I: IntoIterator,
        I::Item: Into<PlanStep>,
    {
        self.add_steps_to(self.root, steps)
    }

    /// Appends steps under `parent`. Fails when `parent` is a leaf, since a
    /// node cannot bind a function and own children at once.
    pub fn add_steps_to<I>(&mut self, parent: NodeId, steps: I) -> Result<(), PlanError>
    where
        I: IntoIterator,
        I::Item: Into<PlanStep>,
    {
        let node = self.try_node(parent)?;
        if node.function.is_some() {
            return Err(PlanError::MixedNode {
                name: node.name.clone(),
                children: node.children.len() + 1,
            });
        }
        for step in steps {
            self.graft(parent, step.into());
        }
        Ok(())
    }

    /// Moves every node of `step` into this arena under `parent`.
    /// The sub-plan's own metadata and last result are dropped.
    fn graft(&mut self, parent: NodeId, step: PlanStep) -> NodeId {
        let sub = match step {
            PlanStep::Function(function) => Plan::from_function(function),
            PlanStep::Plan(plan) => plan,
        };

        let offset = self.nodes.len();
        let shift = |id: NodeId| NodeId(id.0 + offset);
        for mut node in sub.nodes {
            node.parent = node.parent.map(shift);
            node.children = node.children.into_iter().map(shift).collect();
            self.nodes.push(node);
        }

        let grafted = shift(sub.root);
        self.nodes[grafted.0].parent = Some(parent);
        self.nodes[parent.0].children.push(grafted);
        grafted
    }

    /// Appends a step under a root that binds no function
    pub(crate) fn push_step(&mut self, step: PlanStep) {
        debug_assert!(self.root_node().function.is_none());
        self.graft(self.root, step);
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.root_node_mut().name = name.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.root_node_mut().parameters.set(key, value);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.root_node_mut().outputs.push(name.into());
        self
    }

    pub fn with_state(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.root_node_mut().state.set(key, value);
        self
    }

    pub fn with_settings(mut self, settings: InvokeSettings) -> Self {
        self.root_node_mut().settings = Some(settings);
        self
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &PlanNode {
        &self.nodes[self.root.0]
    }

    pub fn root_node_mut(&mut self) -> &mut PlanNode {
        &mut self.nodes[self.root.0]
    }

    /// Root state: ambient variables plus every captured output
    pub fn state(&self) -> &Variables {
        &self.root_node().state
    }

    pub fn state_mut(&mut self) -> &mut Variables {
        &mut self.root_node_mut().state
    }

    pub fn node(&self, id: NodeId) -> Option<&PlanNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut PlanNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn try_node(&self, id: NodeId) -> Result<&PlanNode, PlanError> {
        self.node(id).ok_or(PlanError::UnknownNode(id))
    }

    pub fn try_node_mut(&mut self, id: NodeId) -> Result<&mut PlanNode, PlanError> {
        self.node_mut(id).ok_or(PlanError::UnknownNode(id))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(PlanNode::children).unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(PlanNode::parent)
    }

    /// Ids from the root down to `id`, both included
    pub fn ancestry(&self, id: NodeId) -> Result<Vec<NodeId>, PlanError> {
        let mut chain = vec![id];
        let mut current = self.try_node(id)?.parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.try_node(parent)?.parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Pre-order ids, children left to right
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Declared outputs captured so far
    pub fn metadata(&self) -> &Variables {
        &self.metadata
    }

    /// Primary value of the last completed leaf
    pub fn last_result(&self) -> Option<&str> {
        self.last_result.as_deref()
    }

    /// Restores run bookkeeping of a persisted plan
    pub fn restore_progress(&mut self, metadata: Variables, last_result: Option<String>) {
        self.metadata = metadata;
        self.last_result = last_result;
    }

    pub fn has_next_step(&self) -> bool {
        self.node_has_next(self.root)
    }

    /// True while `id` or one of its descendants still has a leaf to run
    pub fn node_has_next(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.is_leaf() {
            return node.cursor == 0;
        }
        node.children[node.cursor.min(node.children.len())..]
            .iter()
            .any(|&child| self.node_has_next(child))
    }

    /// True once a leaf at or beneath `id` has completed
    pub fn has_started(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.is_leaf() {
            return node.cursor > 0;
        }
        node.cursor > 0 || node.children.iter().any(|&child| self.has_started(child))
    }

    /// The leaf the next step will run: first pending leaf in cursor order
    pub fn next_step(&self) -> Option<NodeId> {
        self.locate(self.root)
    }

    fn locate(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id)?;
        if node.is_leaf() {
            return (node.cursor == 0).then_some(id);
        }
        node.children[node.cursor.min(node.children.len())..]
            .iter()
            .find_map(|&child| self.locate(child))
    }

    /// Commits a finished leaf: marks it done, advances its parent's cursor
    /// and publishes the outputs of the leaf and of every ancestor that is
    /// now complete. Returns the names that were published.
    pub(crate) fn complete_step(
        &mut self,
        leaf: NodeId,
        value: &str,
    ) -> Result<Vec<String>, PlanError> {
        let node = self.try_node_mut(leaf)?;
        node.cursor = 1;
        let parent = node.parent;
        let mut published = node.outputs.clone();

        if let Some(parent) = parent {
            let parent_node = self.try_node_mut(parent)?;
            if let Some(index) = parent_node.children.iter().position(|&child| child == leaf) {
                parent_node.cursor = parent_node.cursor.max(index + 1);
            }
        }

        let mut current = parent;
        while let Some(id) = current {
            if self.node_has_next(id) {
                break;
            }
            let node = self.try_node(id)?;
            published.extend(node.outputs.iter().cloned());
            current = node.parent;
        }

        for name in &published {
            self.root_node_mut().state.set(name.clone(), value);
            self.metadata.set(name.clone(), value);
        }
        self.last_result = Some(value.to_string());
        Ok(published)
    }

    /// Runs the plan to completion with the default executor
    pub async fn invoke(&mut self, ctx: &mut ExecutionContext) -> Result<FunctionResult> {
        PlanExecutor::new().invoke(ctx, self).await
    }

    /// Runs exactly one leaf with the default executor
    pub async fn invoke_next_step(&mut self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        PlanExecutor::new().step(ctx, self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(name: &str) -> Arc<dyn Function> {
        NativeFunction::new("test", name, |vars: Variables| async move {
            Ok(vars.input().to_string())
        })
        .shared()
    }

    #[test]
    fn test_node_kinds() {
        let goal = Plan::new("write a poem");
        assert!(goal.root_node().is_noop());
        assert_eq!(goal.root_node().description, "write a poem");
        assert!(!goal.has_next_step());

        let leaf = Plan::from_function(echo("a"));
        assert!(leaf.root_node().is_leaf());
        assert_eq!(leaf.root_node().name, "test.a");
        assert!(leaf.has_next_step());

        let composite = Plan::with_steps("goal", [echo("a"), echo("b")]);
        assert!(composite.root_node().is_composite());
        assert_eq!(composite.leaf_count(), 2);
    }

    #[test]
    fn test_sub_plans_stay_nested() {
        let inner = Plan::with_steps("inner", [echo("c1"), echo("c2")]);
        let mut plan = Plan::new("outer");
        plan.add_steps([PlanStep::from(inner), PlanStep::from(echo("n1"))])
            .unwrap();

        let root_children = plan.children(plan.root()).to_vec();
        assert_eq!(root_children.len(), 2);
        assert!(plan.try_node(root_children[0]).unwrap().is_composite());
        assert_eq!(plan.children(root_children[0]).len(), 2);

        let names: Vec<_> = plan
            .depth_first()
            .into_iter()
            .map(|id| plan.try_node(id).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["plan", "plan", "test.c1", "test.c2", "test.n1"]);

        let c2 = plan.children(root_children[0])[1];
        assert_eq!(plan.ancestry(c2).unwrap(), vec![plan.root(), root_children[0], c2]);
        assert_eq!(plan.parent(c2), Some(root_children[0]));
    }

    #[test]
    fn test_cannot_add_steps_to_leaf() {
        let mut leaf = Plan::from_function(echo("a"));
        assert!(matches!(
            leaf.add_steps([echo("b")]),
            Err(PlanError::MixedNode { .. })
        ));
    }

    #[test]
    fn test_complete_step_moves_cursors_and_publishes() {
        let inner = Plan::with_steps("inner", [echo("c1")]).with_output("inner_out");
        let mut plan = Plan::with_steps(
            "outer",
            [PlanStep::from(inner), PlanStep::from(echo("n1"))],
        );

        let first = plan.next_step().unwrap();
        assert_eq!(plan.try_node(first).unwrap().name, "test.c1");

        let published = plan.complete_step(first, "one").unwrap();
        assert_eq!(published, vec!["inner_out".to_string()]);
        assert_eq!(plan.metadata().get("inner_out"), Some("one"));
        assert_eq!(plan.state().get("inner_out"), Some("one"));
        assert_eq!(plan.last_result(), Some("one"));

        // the composite is done, but the root cursor was not touched
        let inner_id = plan.children(plan.root())[0];
        assert_eq!(plan.try_node(inner_id).unwrap().cursor(), 1);
        assert_eq!(plan.root_node().cursor(), 0);
        assert!(!plan.node_has_next(inner_id));

        let second = plan.next_step().unwrap();
        assert_eq!(plan.try_node(second).unwrap().name, "test.n1");
        plan.complete_step(second, "two").unwrap();
        assert!(!plan.has_next_step());
        assert_eq!(plan.next_step(), None);
    }

    #[test]
    fn test_unknown_node() {
        let plan = Plan::new("goal");
        assert!(matches!(
            plan.ancestry(NodeId(42)),
            Err(PlanError::UnknownNode(_))
        ));
        assert!(plan.children(NodeId(42)).is_empty());
    }
}
