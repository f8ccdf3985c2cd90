use super::base::{Tool, ToolContext, failure, object_schema, success};
use crate::memory::{Memory, MemoryType};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

// ==================== saveMemory ====================

#[derive(Debug, Deserialize)]
struct SaveMemoryInput {
    #[serde(rename = "type")]
    mem_type: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    importance: f64,
    #[serde(default)]
    related_user_id: i64,
}

pub struct SaveMemoryTool;

#[async_trait]
impl Tool for SaveMemoryTool {
    fn name(&self) -> &str {
        "saveMemory"
    }

    fn description(&self) -> &str {
        "保存重要信息到长期记忆。当你发现以下情况时应该使用：\n\
         - group_fact：群规、群特色、群里的重要事件、某个话题的结论等\n\
         - self_experience：你参与的有趣对话、被@的经历、你的主观感受和想法\n\
         - conversation：群友说的重要事情、有价值的信息、值得记住的对话内容\n\
         注意：普通闲聊不需要保存，只保存真正有价值的新信息。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "type": {
                    "type": "string",
                    "enum": ["group_fact", "self_experience", "conversation"],
                    "description": "记忆类型",
                },
                "content": { "type": "string", "description": "要记住的内容，用自然语言描述清楚" },
                "importance": { "type": "number", "description": "重要性评分(0-1)，越重要越高" },
                "related_user_id": { "type": "integer", "description": "如果这条记忆与某个群友相关，填写其QQ号" },
            }),
            &["type", "content"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: SaveMemoryInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.content.is_empty() {
            return Ok(failure("内容不能为空"));
        }
        let Some(mem_type) = MemoryType::parse(&input.mem_type) else {
            return Ok(failure(
                "无效的记忆类型，可选: group_fact, self_experience, conversation",
            ));
        };
        let importance = if input.importance <= 0.0 || input.importance > 1.0 {
            0.5
        } else {
            input.importance
        };

        let mut mem = Memory {
            id: 0,
            mem_type,
            group_id: ctx.group_id,
            user_id: input.related_user_id,
            content: input.content,
            importance,
            access_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        match ctx.store.save_memory(&mut mem).await {
            Ok(()) => Ok(success("已记住")),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== queryMemory ====================

#[derive(Debug, Deserialize)]
struct QueryMemoryInput {
    #[serde(default)]
    query: String,
    #[serde(default, rename = "type")]
    mem_type: String,
    #[serde(default)]
    scoped: bool,
    #[serde(default)]
    limit: usize,
}

pub struct QueryMemoryTool;

#[async_trait]
impl Tool for QueryMemoryTool {
    fn name(&self) -> &str {
        "queryMemory"
    }

    fn description(&self) -> &str {
        "搜索你的记忆，找到相关的信息。可以查询关于某个话题、某个人、或者某次经历的记忆。\n\
         scoped=false（默认）搜索所有群的记忆，适合查自身经历；\
         scoped=true 只搜索当前群的记忆，适合查群内事件、群规。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "query": { "type": "string", "description": "搜索关键词或描述" },
                "type": {
                    "type": "string",
                    "enum": ["group_fact", "self_experience", "conversation", ""],
                    "description": "限定记忆类型（空字符串时不筛选）",
                },
                "scoped": { "type": "boolean", "description": "是否只搜索当前群的记忆，默认false" },
                "limit": { "type": "integer", "description": "返回结果数量限制，默认10，最大50" },
            }),
            &["query"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: QueryMemoryInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.query.is_empty() {
            return Ok(failure("查询内容不能为空"));
        }

        let group_id = if input.scoped { ctx.group_id } else { 0 };
        let limit = match input.limit {
            0 => 10,
            n => n.min(50),
        };
        let mem_type = MemoryType::parse(&input.mem_type);

        match ctx.store.query_memory(&input.query, group_id, mem_type, limit).await {
            Ok(memories) => {
                let items: Vec<Value> = memories
                    .iter()
                    .map(|m| {
                        json!({
                            "type": m.mem_type.as_str(),
                            "content": m.content,
                            "importance": m.importance,
                            "created_at": m.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        })
                    })
                    .collect();
                Ok(json!({ "success": true, "count": items.len(), "memories": items }))
            }
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}
