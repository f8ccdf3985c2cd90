use super::base::{Tool, ToolContext, failure};
use crate::providers::base::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Declarative set of named tools. Dispatch isolates panics in a spawned
/// task and converts every failure mode into a `success=false` payload so
/// the reasoning loop never dies on a tool.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if name.is_empty() {
            warn!("tool registry: rejecting tool with empty name");
            return;
        }
        if self.tools.contains_key(&name) {
            warn!("tool registry: overwriting duplicate tool '{}'", name);
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Sorted definitions handed to the LLM.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Invoke one tool. Never returns `Err`; unknown names, execution
    /// errors and panics all come back as failure payloads.
    pub async fn dispatch(&self, name: &str, params: Value, ctx: &ToolContext) -> Value {
        let Some(tool) = self.get(name) else {
            warn!("LLM called unknown tool: {}", name);
            let known: Vec<&str> = self.tools.keys().map(String::as_str).collect();
            return failure(format!("未知工具 '{}'，可用: {}", name, known.join(", ")));
        };

        if ctx.log_calls {
            debug!("tool call: {} input={}", name, params);
        }

        let exec_ctx = ctx.clone();
        let exec_params = params.clone();
        let handle =
            tokio::spawn(async move { tool.execute(exec_params, &exec_ctx).await });

        let result = match handle.await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!("tool '{}' failed: {}", name, e);
                failure(format!("工具执行失败: {}", e))
            }
            Err(join_err) => {
                if join_err.is_panic() {
                    warn!("tool '{}' panicked", name);
                    failure(format!("工具 '{}' 异常退出", name))
                } else {
                    failure(format!("工具 '{}' 被取消", name))
                }
            }
        };

        if ctx.log_calls {
            debug!("tool call: {} output={}", name, result);
        }
        result
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
