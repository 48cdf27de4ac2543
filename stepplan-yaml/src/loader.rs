use crate::config::{PlanDocument, PlanNodeConfig};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use stepplan_core::{FunctionRegistry, Plan, PlanError};

/// 计划加载器，支持从文件或字符串加载和保存计划文档
pub struct PlanLoader;

impl PlanLoader {
    /// 从 YAML 文件加载计划文档
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<PlanDocument> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read YAML file: {:?}", path.as_ref()))?;
        Self::from_yaml_str(&content)
    }

    /// 从 YAML 字符串加载计划文档
    pub fn from_yaml_str(content: &str) -> Result<PlanDocument> {
        serde_yaml::from_str(content).with_context(|| "Failed to parse YAML content")
    }

    /// 从 JSON 文件加载计划文档
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<PlanDocument> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read JSON file: {:?}", path.as_ref()))?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串加载计划文档
    pub fn from_json_str(content: &str) -> Result<PlanDocument> {
        serde_json::from_str(content).with_context(|| "Failed to parse JSON content")
    }

    pub fn to_yaml_string(document: &PlanDocument) -> Result<String> {
        serde_yaml::to_string(document).with_context(|| "Failed to serialize plan to YAML")
    }

    pub fn to_json_string(document: &PlanDocument) -> Result<String> {
        serde_json::to_string_pretty(document).with_context(|| "Failed to serialize plan to JSON")
    }

    /// 保存计划文档到 YAML 文件
    pub fn save_to_yaml<P: AsRef<Path>>(document: &PlanDocument, path: P) -> Result<()> {
        let yaml_content = Self::to_yaml_string(document)?;
        fs::write(&path, yaml_content)
            .with_context(|| format!("Failed to write YAML file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 保存计划文档到 JSON 文件
    pub fn save_to_json<P: AsRef<Path>>(document: &PlanDocument, path: P) -> Result<()> {
        let json_content = Self::to_json_string(document)?;
        fs::write(&path, json_content)
            .with_context(|| format!("Failed to write JSON file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 验证计划文档的结构有效性
    ///
    /// 提供 `registry` 时同时检查所有函数名是否已注册。
    pub fn validate(document: &PlanDocument, registry: Option<&FunctionRegistry>) -> Result<()> {
        Self::validate_node(&document.plan, registry)
    }

    fn validate_node(node: &PlanNodeConfig, registry: Option<&FunctionRegistry>) -> Result<()> {
        // 节点不能同时绑定函数和子步骤
        if node.function.is_some() && !node.steps.is_empty() {
            return Err(PlanError::MixedNode {
                name: node.name.clone(),
                children: node.steps.len(),
            }
            .into());
        }

        if node.cursor > node.max_cursor() {
            return Err(PlanError::CursorOutOfRange {
                name: node.name.clone(),
                cursor: node.cursor,
                len: node.steps.len(),
            }
            .into());
        }

        if node.outputs.iter().any(|output| output.trim().is_empty()) {
            return Err(PlanError::EmptyOutputName(node.name.clone()).into());
        }

        if let (Some(function), Some(registry)) = (&node.function, registry) {
            if !registry.contains(function) {
                return Err(PlanError::FunctionNotFound(function.clone()).into());
            }
        }

        for step in &node.steps {
            Self::validate_node(step, registry)
                .with_context(|| format!("Invalid step under '{}'", node.name))?;
        }
        Ok(())
    }

    /// 验证并重建可执行的计划
    pub fn load_plan(document: &PlanDocument, registry: &FunctionRegistry) -> Result<Plan> {
        Self::validate(document, Some(registry))?;
        document.build(registry)
    }

    /// 从 YAML 文件直接加载可执行的计划
    pub fn load_plan_file<P: AsRef<Path>>(path: P, registry: &FunctionRegistry) -> Result<Plan> {
        let document = Self::from_yaml_file(&path)?;
        tracing::info!(path = ?path.as_ref(), "loading plan");
        Self::load_plan(&document, registry)
    }

    /// 保存计划（含执行进度）到 YAML 文件
    pub fn save_plan<P: AsRef<Path>>(plan: &Plan, path: P) -> Result<()> {
        Self::save_to_yaml(&PlanDocument::from_plan(plan), path)
    }
}
