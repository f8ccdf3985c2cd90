use super::base::{Tool, ToolContext, failure, object_schema, success};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

// ==================== speak ====================

#[derive(Debug, Deserialize)]
struct SpeakInput {
    #[serde(default)]
    content: String,
    #[serde(default)]
    reply_to: i64,
    #[serde(default)]
    mentions: Vec<i64>,
}

pub struct SpeakTool;

#[async_trait]
impl Tool for SpeakTool {
    fn name(&self) -> &str {
        "speak"
    }

    fn description(&self) -> &str {
        "在群里说话。只有当你真的想说什么的时候才用，不用强迫自己每次都说话。\
         说话要自然，像个真人群友。\n\n\
         【重要】使用规则：\n\
         - 每次调用speak只能发送**一条**消息，不要把多句话合并在一起\n\
         - 如果你想说多句话，请多次调用speak\n\
         - 不要用分号、句号或换行符连接多个独立的句子\n\
         - 正确示例：先调用speak(\"你好\")，再调用speak(\"今天天气真好\")\n\
         - 错误示例：speak(\"你好。今天天气真好\")\n\
         - 在明确需要回复某条消息时使用 reply_to 参数，但是不要回复自己说的话\n\
         - 如果想@某个群友，请使用 mentions 参数（可以同时@多个人），不要在内容里直接写 @XXX"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "content": { "type": "string", "description": "你想说的话，不要用markdown，说话要口语化" },
                "reply_to": { "type": "integer", "description": "要回复的消息ID" },
                "mentions": {
                    "type": "array", "items": { "type": "integer" },
                    "description": "要@的用户QQ号列表",
                },
            }),
            &["content"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: SpeakInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.content.is_empty() {
            return Ok(failure("说话内容不能为空"));
        }

        let Some(speak) = &ctx.speak else {
            return Ok(failure("发言通道未初始化"));
        };
        let message_id = speak(
            ctx.group_id,
            input.content,
            input.reply_to,
            input.mentions,
        )
        .await;

        if message_id == 0 {
            return Ok(failure("发送失败"));
        }
        Ok(json!({
            "success": true,
            "message_id": message_id,
            "message": format!("发言成功，消息ID: {}", message_id),
        }))
    }
}

// ==================== stayQuiet ====================

#[derive(Debug, Deserialize)]
struct StayQuietInput {
    #[serde(default)]
    #[allow(dead_code)]
    reason: String,
}

pub struct StayQuietTool;

#[async_trait]
impl Tool for StayQuietTool {
    fn name(&self) -> &str {
        "stayQuiet"
    }

    fn description(&self) -> &str {
        "选择不说话，保持沉默。当话题你不熟悉、不感兴趣、或者觉得没必要插嘴时使用。\n\n\
         【重要】使用规则：\n\
         - stayQuiet 应该在你决定不发言时**最后调用**\n\
         - 调用 stayQuiet 后必须立刻停止，不要再调用任何工具\n\
         - 如果你想说话，请用 speak，不要在 stayQuiet 之后再 speak"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({ "reason": { "type": "string", "description": "不说话的原因（给自己看的笔记）" } }),
            &[],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let _input: StayQuietInput =
            serde_json::from_value(params).unwrap_or(StayQuietInput { reason: String::new() });
        // Fire the cancel hook before returning so the loop observes it at
        // the next checkpoint, before any further LLM step.
        ctx.stop_thinking();
        Ok(success("保持沉默"))
    }
}

// ==================== poke ====================

#[derive(Debug, Deserialize)]
struct PokeInput {
    #[serde(default)]
    user_id: i64,
}

pub struct PokeTool;

#[async_trait]
impl Tool for PokeTool {
    fn name(&self) -> &str {
        "poke"
    }

    fn description(&self) -> &str {
        "戳一戳某个群友。可以用来打招呼、吸引注意力、或者逗逗人玩。不要频繁使用。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({ "user_id": { "type": "integer", "description": "要戳的群成员QQ号" } }),
            &["user_id"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: PokeInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.user_id == 0 {
            return Ok(failure("用户ID不能为空"));
        }
        let Some(bot) = &ctx.bot else {
            return Ok(failure("Bot未连接"));
        };
        match bot.group_poke(ctx.group_id, input.user_id).await {
            Ok(()) => Ok(success("已戳一戳")),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== reactToMessage ====================

#[derive(Debug, Deserialize)]
struct ReactToMessageInput {
    #[serde(default)]
    message_id: i64,
    #[serde(default)]
    emoji_id: i32,
}

pub struct ReactToMessageTool;

#[async_trait]
impl Tool for ReactToMessageTool {
    fn name(&self) -> &str {
        "reactToMessage"
    }

    fn description(&self) -> &str {
        "对某条消息贴表情回应。可以表达认同、喜欢、疑问等情绪，比直接回复更轻量。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "message_id": { "type": "integer", "description": "要回应的消息ID" },
                "emoji_id": {
                    "type": "integer",
                    "description": "表情ID。常用：76=赞、77=踩、66=爱心、78=握手、124=OK、179=doge",
                },
            }),
            &["message_id", "emoji_id"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: ReactToMessageInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.message_id == 0 {
            return Ok(failure("消息ID不能为空"));
        }
        if input.emoji_id == 0 {
            return Ok(failure("表情ID不能为空"));
        }
        let Some(bot) = &ctx.bot else {
            return Ok(failure("Bot未连接"));
        };
        match bot.set_msg_emoji_like(input.message_id, input.emoji_id).await {
            Ok(()) => Ok(success("已回应表情")),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== recallMessage ====================

#[derive(Debug, Deserialize)]
struct RecallMessageInput {
    #[serde(default)]
    message_id: i64,
    #[serde(default)]
    #[allow(dead_code)]
    reason: String,
}

pub struct RecallMessageTool;

#[async_trait]
impl Tool for RecallMessageTool {
    fn name(&self) -> &str {
        "recallMessage"
    }

    fn description(&self) -> &str {
        "撤回你自己发的消息。当你发错消息、说错话、或者想收回刚才的发言时使用。\
         只能撤回自己两分钟内发的消息。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "message_id": { "type": "integer", "description": "要撤回的消息ID" },
                "reason": { "type": "string", "description": "撤回原因（给自己看的笔记）" },
            }),
            &["message_id"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: RecallMessageInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.message_id == 0 {
            return Ok(failure("消息ID不能为空"));
        }
        let Some(bot) = &ctx.bot else {
            return Ok(failure("Bot未连接"));
        };
        match bot.delete_msg(input.message_id).await {
            Ok(()) => Ok(success("已撤回消息")),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}
