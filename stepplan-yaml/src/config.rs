use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stepplan_context::Variables;
use stepplan_core::{FunctionRegistry, InvokeSettings, Plan, PlanNode};

/// 持久化的计划文档，包含执行进度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub plan: PlanNodeConfig,
    /// 已捕获的输出
    #[serde(default, skip_serializing_if = "Variables::is_empty")]
    pub metadata: Variables,
    /// 最近一个完成步骤的主值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<String>,
}

/// 单个计划节点
///
/// `function` 为限定名（`skill.name`），加载时通过 [`FunctionRegistry`] 重新绑定。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanNodeConfig {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Variables::is_empty")]
    pub parameters: Variables,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    #[serde(skip_serializing_if = "Variables::is_empty")]
    pub state: Variables,
    #[serde(skip_serializing_if = "is_zero")]
    pub cursor: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<InvokeSettings>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<PlanNodeConfig>,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

impl PlanDocument {
    /// 从内存中的计划生成文档
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            plan: PlanNodeConfig::from_node(plan, plan.root_node()),
            metadata: plan.metadata().clone(),
            last_result: plan.last_result().map(str::to_string),
        }
    }

    /// 重建计划并恢复进度
    pub fn build(&self, registry: &FunctionRegistry) -> Result<Plan> {
        let mut plan = self.plan.build(registry)?;
        plan.restore_progress(self.metadata.clone(), self.last_result.clone());
        tracing::debug!(
            nodes = plan.node_count(),
            pending = plan.has_next_step(),
            "rebuilt plan from document"
        );
        Ok(plan)
    }
}

impl PlanNodeConfig {
    fn from_node(plan: &Plan, node: &PlanNode) -> Self {
        Self {
            name: node.name.clone(),
            description: node.description.clone(),
            function: node.function().map(|f| f.describe().qualified_name()),
            parameters: node.parameters.clone(),
            outputs: node.outputs.clone(),
            state: node.state.clone(),
            cursor: node.cursor(),
            settings: node.settings.clone(),
            steps: node
                .children()
                .iter()
                .filter_map(|&child| plan.node(child))
                .map(|child| Self::from_node(plan, child))
                .collect(),
        }
    }

    /// 构建以本节点为根的子计划
    pub fn build(&self, registry: &FunctionRegistry) -> Result<Plan> {
        let mut plan = match &self.function {
            Some(function) => Plan::from_function(
                registry
                    .get(function)
                    .with_context(|| format!("Failed to bind step '{}'", self.name))?,
            ),
            None => Plan::new(self.description.clone()),
        };

        if !self.steps.is_empty() {
            let children = self
                .steps
                .iter()
                .map(|step| step.build(registry))
                .collect::<Result<Vec<_>>>()?;
            plan.add_steps(children)
                .with_context(|| format!("Failed to attach steps to '{}'", self.name))?;
        }

        let node = plan.root_node_mut();
        // 空字段保留构造时的默认值（叶子使用函数的限定名和描述）
        if !self.name.is_empty() {
            node.name = self.name.clone();
        }
        if !self.description.is_empty() {
            node.description = self.description.clone();
        }
        node.parameters = self.parameters.clone();
        node.outputs = self.outputs.clone();
        node.state = self.state.clone();
        node.settings = self.settings.clone();
        node.resume_at(self.cursor);

        Ok(plan)
    }

    /// 该节点允许的最大游标值
    pub fn max_cursor(&self) -> usize {
        match (&self.function, self.steps.len()) {
            (Some(_), _) => 1,
            (None, len) => len,
        }
    }
}
