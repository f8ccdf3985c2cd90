use super::base::{Tool, ToolContext, failure, object_schema, success};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

// ==================== saveJargon ====================

#[derive(Debug, Deserialize)]
struct SaveJargonInput {
    #[serde(default)]
    content: String,
    #[serde(default)]
    meaning: String,
    #[serde(default)]
    context: String,
}

pub struct SaveJargonTool;

#[async_trait]
impl Tool for SaveJargonTool {
    fn name(&self) -> &str {
        "saveJargon"
    }

    fn description(&self) -> &str {
        "保存群里的黑话、术语或梗。当你发现群友使用了你不懂的词汇，\
         并且从上下文理解了它的含义时，可以保存下来。\
         例如：群里有人说\"触摸\"然后大家都笑了，你从对话中理解这是一个内部梗。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "content": { "type": "string", "description": "黑话、术语或梗的原文" },
                "meaning": { "type": "string", "description": "这个黑话/术语的含义或解释" },
                "context": { "type": "string", "description": "在什么情况下使用，或者来源背景" },
            }),
            &["content", "meaning"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: SaveJargonInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.content.is_empty() {
            return Ok(failure("黑话内容不能为空"));
        }
        if input.meaning.is_empty() {
            return Ok(failure("黑话含义不能为空"));
        }

        match ctx
            .store
            .save_jargon(ctx.group_id, &input.content, &input.meaning, &input.context)
        {
            Ok(()) => Ok(success("已记住这个黑话")),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== getUnverifiedJargons ====================

#[derive(Debug, Deserialize)]
struct GetUnverifiedJargonsInput {
    #[serde(default)]
    limit: usize,
}

pub struct GetUnverifiedJargonsTool;

#[async_trait]
impl Tool for GetUnverifiedJargonsTool {
    fn name(&self) -> &str {
        "getUnverifiedJargons"
    }

    fn description(&self) -> &str {
        "查看待审核的黑话/术语。你可以检查这些黑话的含义是否准确。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({ "limit": { "type": "integer", "description": "返回数量，默认5" } }),
            &[],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: GetUnverifiedJargonsInput =
            serde_json::from_value(params).unwrap_or(GetUnverifiedJargonsInput { limit: 0 });
        let limit = if input.limit == 0 { 5 } else { input.limit };

        match ctx.store.get_unverified_jargons(ctx.group_id, limit) {
            Ok(jargons) => {
                let items: Vec<Value> = jargons
                    .iter()
                    .map(|j| {
                        json!({
                            "id": j.id,
                            "content": j.content,
                            "meaning": j.meaning,
                            "context": j.context,
                            "count": j.count,
                        })
                    })
                    .collect();
                Ok(json!({ "success": true, "jargons": items }))
            }
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== reviewJargon ====================

#[derive(Debug, Deserialize)]
struct ReviewJargonInput {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    approve: bool,
}

pub struct ReviewJargonTool;

#[async_trait]
impl Tool for ReviewJargonTool {
    fn name(&self) -> &str {
        "reviewJargon"
    }

    fn description(&self) -> &str {
        "审核一条黑话/术语。如果含义正确，可以通过验证；如果有误，可以拒绝。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "id": { "type": "integer", "description": "黑话ID" },
                "approve": { "type": "boolean", "description": "是否通过审核，true=通过，false=拒绝" },
            }),
            &["id", "approve"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: ReviewJargonInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.id == 0 {
            return Ok(failure("黑话ID不能为空"));
        }

        match ctx.store.review_jargon(input.id, input.approve) {
            Ok(()) => Ok(success(if input.approve {
                "已验证该黑话"
            } else {
                "已拒绝该黑话"
            })),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}
