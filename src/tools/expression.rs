use super::base::{Tool, ToolContext, failure, object_schema, success};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

// ==================== saveExpression ====================

#[derive(Debug, Deserialize)]
struct SaveExpressionInput {
    #[serde(default)]
    situation: String,
    #[serde(default)]
    style: String,
    #[serde(default)]
    example: String,
}

pub struct SaveExpressionTool;

#[async_trait]
impl Tool for SaveExpressionTool {
    fn name(&self) -> &str {
        "saveExpression"
    }

    fn description(&self) -> &str {
        "保存你学到的群友表达方式或口头禅。当你发现群友在特定场景下有独特的\
         说话习惯时，可以记录下来以便模仿。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "situation": { "type": "string", "description": "使用场景，例如：打招呼、吐槽、表达惊讶等" },
                "style": { "type": "string", "description": "表达风格或具体的口头禅" },
                "example": { "type": "string", "description": "具体的例子" },
            }),
            &["situation", "style"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: SaveExpressionInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.situation.is_empty() {
            return Ok(failure("使用场景不能为空"));
        }
        if input.style.is_empty() {
            return Ok(failure("表达风格不能为空"));
        }

        match ctx
            .store
            .save_expression(ctx.group_id, &input.situation, &input.style, &input.example)
        {
            Ok(true) => Ok(success("已记住这种表达方式")),
            Ok(false) => Ok(success("这种表达方式已经记过了")),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== getExpressions ====================

#[derive(Debug, Deserialize)]
struct GetExpressionsInput {
    #[serde(default)]
    limit: usize,
}

pub struct GetExpressionsTool;

#[async_trait]
impl Tool for GetExpressionsTool {
    fn name(&self) -> &str {
        "getExpressions"
    }

    fn description(&self) -> &str {
        "查看你学到的群友表达方式和口头禅。在你想模仿群友说话或者不知道该怎么表达时使用。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({ "limit": { "type": "integer", "description": "返回数量，默认5" } }),
            &[],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: GetExpressionsInput =
            serde_json::from_value(params).unwrap_or(GetExpressionsInput { limit: 0 });
        let limit = if input.limit == 0 { 5 } else { input.limit };

        match ctx.store.get_expressions(ctx.group_id, limit) {
            Ok(exps) => {
                let items: Vec<String> = exps
                    .iter()
                    .map(|e| format!("[{}]: {} (示例: {})", e.situation, e.style, e.examples))
                    .collect();
                Ok(json!({ "success": true, "expressions": items }))
            }
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== getUncheckedExpressions ====================

#[derive(Debug, Deserialize)]
struct GetUncheckedExpressionsInput {
    #[serde(default)]
    limit: usize,
}

pub struct GetUncheckedExpressionsTool;

#[async_trait]
impl Tool for GetUncheckedExpressionsTool {
    fn name(&self) -> &str {
        "getUncheckedExpressions"
    }

    fn description(&self) -> &str {
        "查看待审核的表达方式。你可以定期检查并审核这些学到的表达习惯是否准确。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({ "limit": { "type": "integer", "description": "返回数量，默认5" } }),
            &[],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: GetUncheckedExpressionsInput =
            serde_json::from_value(params).unwrap_or(GetUncheckedExpressionsInput { limit: 0 });
        let limit = if input.limit == 0 { 5 } else { input.limit };

        match ctx.store.get_unchecked_expressions(ctx.group_id, limit) {
            Ok(exps) => {
                let items: Vec<Value> = exps
                    .iter()
                    .map(|e| {
                        json!({
                            "id": e.id,
                            "situation": e.situation,
                            "style": e.style,
                            "examples": e.examples,
                            "count": e.count,
                        })
                    })
                    .collect();
                Ok(json!({ "success": true, "expressions": items }))
            }
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== reviewExpression ====================

#[derive(Debug, Deserialize)]
struct ReviewExpressionInput {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    approve: bool,
}

pub struct ReviewExpressionTool;

#[async_trait]
impl Tool for ReviewExpressionTool {
    fn name(&self) -> &str {
        "reviewExpression"
    }

    fn description(&self) -> &str {
        "审核一条表达方式。如果你认为这个表达方式记录正确，可以通过；如果有误，可以拒绝。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "id": { "type": "integer", "description": "表达方式ID" },
                "approve": { "type": "boolean", "description": "是否通过审核，true=通过，false=拒绝" },
            }),
            &["id", "approve"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: ReviewExpressionInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.id == 0 {
            return Ok(failure("表达方式ID不能为空"));
        }

        match ctx.store.review_expression(input.id, input.approve) {
            Ok(()) => Ok(success(if input.approve {
                "已通过该表达方式"
            } else {
                "已拒绝该表达方式"
            })),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}
