use super::base::{Tool, ToolContext, failure, object_schema, success};
use crate::utils::clamp_f64;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

/// Merge two string lists, dropping empties and duplicates, first-seen order.
fn merge_dedup(existing: Vec<String>, incoming: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    existing
        .into_iter()
        .chain(incoming)
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

// ==================== updateMemberProfile ====================

#[derive(Debug, Deserialize)]
struct UpdateMemberProfileInput {
    #[serde(default)]
    user_id: i64,
    #[serde(default)]
    speak_style: String,
    #[serde(default)]
    interests: Vec<String>,
    #[serde(default)]
    common_words: Vec<String>,
    #[serde(default)]
    intimacy: Option<f64>,
}

pub struct UpdateMemberProfileTool;

#[async_trait]
impl Tool for UpdateMemberProfileTool {
    fn name(&self) -> &str {
        "updateMemberProfile"
    }

    fn description(&self) -> &str {
        "更新你对某个群友的了解。当你发现群友的新特点、说话风格、兴趣爱好时使用。\
         也可以根据互动情况调整亲密度（intimacy）。兴趣和口头禅只传入新增的项。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "user_id": { "type": "integer", "description": "群友的QQ号" },
                "speak_style": { "type": "string", "description": "说话风格描述" },
                "interests": {
                    "type": "array", "items": { "type": "string" },
                    "description": "兴趣爱好列表（只传入新增的项）",
                },
                "common_words": {
                    "type": "array", "items": { "type": "string" },
                    "description": "常用词汇或口头禅（只传入新增的项）",
                },
                "intimacy": {
                    "type": "number",
                    "description": "亲密度0-1，根据互动频率、聊天深度、情感连接来评估",
                },
            }),
            &["user_id"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: UpdateMemberProfileInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.user_id == 0 {
            return Ok(failure("用户ID不能为空"));
        }

        let mut profile = match ctx.store.get_member_profile(input.user_id) {
            Ok(Some(p)) => p,
            Ok(None) => return Ok(failure("还不认识这个人")),
            Err(e) => return Ok(failure(e.to_string())),
        };

        if !input.speak_style.is_empty() {
            profile.speak_style = input.speak_style;
        }
        if !input.interests.is_empty() {
            let merged = merge_dedup(profile.interests_vec(), input.interests);
            profile.interests = serde_json::to_string(&merged).unwrap_or_default();
        }
        if !input.common_words.is_empty() {
            let merged = merge_dedup(profile.common_words_vec(), input.common_words);
            profile.common_words = serde_json::to_string(&merged).unwrap_or_default();
        }
        if let Some(intimacy) = input.intimacy {
            profile.intimacy = clamp_f64(intimacy, 0.0, 1.0);
        }

        match ctx.store.update_member_profile(&mut profile) {
            Ok(()) => Ok(success("已更新对该群友的了解")),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}

// ==================== getMemberInfo ====================

#[derive(Debug, Deserialize)]
struct GetMemberInfoInput {
    #[serde(default)]
    user_id: i64,
}

pub struct GetMemberInfoTool;

#[async_trait]
impl Tool for GetMemberInfoTool {
    fn name(&self) -> &str {
        "getMemberInfo"
    }

    fn description(&self) -> &str {
        "查看你对某个群友的了解。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({ "user_id": { "type": "integer", "description": "群友的QQ号" } }),
            &["user_id"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: GetMemberInfoInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.user_id == 0 {
            return Ok(failure("用户ID不能为空"));
        }

        match ctx.store.get_member_profile(input.user_id) {
            Ok(Some(p)) => Ok(json!({
                "success": true,
                "nickname": p.nickname,
                "speak_style": p.speak_style,
                "interests": p.interests_vec(),
                "common_words": p.common_words_vec(),
                "activity": p.activity,
                "intimacy": p.intimacy,
                "msg_count": p.msg_count,
            })),
            Ok(None) => Ok(failure("不太了解这个人")),
            Err(e) => Ok(failure(e.to_string())),
        }
    }
}
