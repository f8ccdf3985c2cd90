use super::base::{Tool, ToolContext, failure, object_schema};
use crate::persona::period_label;
use async_trait::async_trait;
use chrono::{Datelike, Local, TimeZone, Timelike};
use serde::Deserialize;
use serde_json::{Value, json};

// ==================== getCurrentTime ====================

pub struct GetCurrentTimeTool;

#[async_trait]
impl Tool for GetCurrentTimeTool {
    fn name(&self) -> &str {
        "getCurrentTime"
    }

    fn description(&self) -> &str {
        "获取当前时间，可以用来判断是白天还是晚上，是否该睡觉了等。"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({}), &[])
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        let now = Local::now();
        let hour = now.hour();
        let weekday = now.weekday();
        Ok(json!({
            "time": now.format("%Y-%m-%d %H:%M:%S").to_string(),
            "weekday": weekday.to_string(),
            "period": period_label(hour),
            "is_late": !(6..23).contains(&hour),
            "is_weekend": matches!(weekday, chrono::Weekday::Sat | chrono::Weekday::Sun),
        }))
    }
}

// ==================== getRecentMessages ====================

#[derive(Debug, Deserialize)]
struct GetRecentMessagesInput {
    #[serde(default)]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

pub struct GetRecentMessagesTool;

#[async_trait]
impl Tool for GetRecentMessagesTool {
    fn name(&self) -> &str {
        "getRecentMessages"
    }

    fn description(&self) -> &str {
        "获取最近的聊天记录。当你需要了解更早之前的对话时使用。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "limit": { "type": "integer", "description": "返回消息条数，默认40" },
                "offset": {
                    "type": "integer",
                    "description": "偏移量，用于跳过近期的记录。例如 offset=10 表示跳过最近的10条消息",
                },
            }),
            &[],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: GetRecentMessagesInput =
            serde_json::from_value(params).unwrap_or(GetRecentMessagesInput { limit: 0, offset: 0 });
        let limit = if input.limit == 0 { 40 } else { input.limit };

        match ctx.store.recent_messages(ctx.group_id, limit, input.offset) {
            Ok(messages) => {
                let items: Vec<Value> = messages
                    .iter()
                    .map(|m| {
                        json!({
                            "user_id": m.user_id,
                            "nickname": m.nickname,
                            "content": m.content,
                            "time": m.created_at.with_timezone(&Local).format("%H:%M:%S").to_string(),
                            "is_mention": m.mention_self,
                        })
                    })
                    .collect();
                Ok(json!({ "success": true, "messages": items }))
            }
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== getGroupInfo ====================

pub struct GetGroupInfoTool;

#[async_trait]
impl Tool for GetGroupInfoTool {
    fn name(&self) -> &str {
        "getGroupInfo"
    }

    fn description(&self) -> &str {
        "获取当前群的基本信息，包括群名称、成员数量等。"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({}), &[])
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let Some(bot) = &ctx.bot else {
            return Ok(failure("Bot未连接"));
        };
        match bot.get_group_info(ctx.group_id).await {
            Ok(info) => Ok(json!({
                "success": true,
                "group_id": info.group_id,
                "group_name": info.group_name,
                "member_count": info.member_count,
                "max_member_count": info.max_member_count,
            })),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== getGroupMemberDetail ====================

#[derive(Debug, Deserialize)]
struct GetGroupMemberDetailInput {
    #[serde(default)]
    user_id: i64,
}

pub struct GetGroupMemberDetailTool;

#[async_trait]
impl Tool for GetGroupMemberDetailTool {
    fn name(&self) -> &str {
        "getGroupMemberDetail"
    }

    fn description(&self) -> &str {
        "获取某个群成员的详细信息，包括群名片、角色（群主/管理员/普通成员）、\
         入群时间、最后发言时间等。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({ "user_id": { "type": "integer", "description": "要查询的群成员QQ号" } }),
            &["user_id"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: GetGroupMemberDetailInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.user_id == 0 {
            return Ok(failure("用户ID不能为空"));
        }
        let Some(bot) = &ctx.bot else {
            return Ok(failure("Bot未连接"));
        };

        match bot.get_group_member_info(ctx.group_id, input.user_id).await {
            Ok(info) => {
                let fmt_unix = |secs: i64| {
                    if secs > 0 {
                        Local
                            .timestamp_opt(secs, 0)
                            .single()
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                            .unwrap_or_default()
                    } else {
                        String::new()
                    }
                };
                Ok(json!({
                    "success": true,
                    "user_id": info.user_id,
                    "nickname": info.nickname,
                    "card": info.card,
                    "role": info.role,
                    "title": info.title,
                    "join_time": fmt_unix(info.join_time),
                    "last_sent_time": fmt_unix(info.last_sent_time),
                }))
            }
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== getGroupNotices ====================

pub struct GetGroupNoticesTool;

#[async_trait]
impl Tool for GetGroupNoticesTool {
    fn name(&self) -> &str {
        "getGroupNotices"
    }

    fn description(&self) -> &str {
        "获取群公告列表。想了解群规、活动通知时使用。"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({}), &[])
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let Some(bot) = &ctx.bot else {
            return Ok(failure("Bot未连接"));
        };
        match bot.get_group_notices(ctx.group_id).await {
            Ok(notices) => {
                let items: Vec<Value> = notices
                    .iter()
                    .map(|n| {
                        json!({
                            "sender_id": n.sender_id,
                            "publish_time": n.publish_time,
                            "content": n.content,
                        })
                    })
                    .collect();
                Ok(json!({ "success": true, "notices": items }))
            }
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== getEssenceMessages ====================

pub struct GetEssenceMessagesTool;

#[async_trait]
impl Tool for GetEssenceMessagesTool {
    fn name(&self) -> &str {
        "getEssenceMessages"
    }

    fn description(&self) -> &str {
        "获取群精华消息列表。想了解群里的高光发言时使用。"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({}), &[])
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let Some(bot) = &ctx.bot else {
            return Ok(failure("Bot未连接"));
        };
        match bot.get_essence_messages(ctx.group_id).await {
            Ok(messages) => {
                let items: Vec<Value> = messages
                    .iter()
                    .map(|m| {
                        json!({
                            "message_id": m.message_id,
                            "sender_nick": m.sender_nick,
                            "operator_nick": m.operator_nick,
                            "content": m.content,
                        })
                    })
                    .collect();
                Ok(json!({ "success": true, "messages": items }))
            }
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== getMessageReactions ====================

#[derive(Debug, Deserialize)]
struct GetMessageReactionsInput {
    #[serde(default)]
    message_id: i64,
}

pub struct GetMessageReactionsTool;

#[async_trait]
impl Tool for GetMessageReactionsTool {
    fn name(&self) -> &str {
        "getMessageReactions"
    }

    fn description(&self) -> &str {
        "查看某条消息收到的表情回应。想知道大家对一条消息的反应时使用。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({ "message_id": { "type": "integer", "description": "要查询的消息ID" } }),
            &["message_id"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: GetMessageReactionsInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.message_id == 0 {
            return Ok(failure("消息ID不能为空"));
        }
        let Some(bot) = &ctx.bot else {
            return Ok(failure("Bot未连接"));
        };
        match bot.get_message_reactions(input.message_id).await {
            Ok(reactions) => {
                let items: Vec<Value> = reactions
                    .iter()
                    .map(|r| json!({ "emoji_id": r.emoji_id, "count": r.count }))
                    .collect();
                Ok(json!({ "success": true, "reactions": items }))
            }
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== getForwardMessageDetail ====================

#[derive(Debug, Deserialize)]
struct GetForwardMessageDetailInput {
    #[serde(default)]
    message_id: i64,
}

pub struct GetForwardMessageDetailTool;

#[async_trait]
impl Tool for GetForwardMessageDetailTool {
    fn name(&self) -> &str {
        "getForwardMessageDetail"
    }

    fn description(&self) -> &str {
        "查看一条合并转发消息的具体内容。聊天记录里显示[合并转发]的消息可以用这个工具展开。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({ "message_id": { "type": "integer", "description": "带[合并转发]的那条消息的ID" } }),
            &["message_id"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: GetForwardMessageDetailInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.message_id == 0 {
            return Ok(failure("消息ID不能为空"));
        }

        // Forward payloads were persisted at intake; no gateway round-trip.
        let log = match ctx.store.get_message_log(&input.message_id.to_string()) {
            Ok(Some(log)) => log,
            Ok(None) => return Ok(failure("找不到这条消息")),
            Err(e) => return Ok(failure(e.to_string())),
        };
        let Some(forwards) = log.forwards else {
            return Ok(failure("这条消息不包含合并转发"));
        };
        let nodes: Vec<crate::onebot::ForwardNode> =
            serde_json::from_str(&forwards).unwrap_or_default();
        let items: Vec<Value> = nodes
            .iter()
            .map(|n| {
                json!({
                    "user_id": n.user_id,
                    "nickname": n.nickname,
                    "content": n.content,
                })
            })
            .collect();
        Ok(json!({ "success": true, "messages": items }))
    }
}
