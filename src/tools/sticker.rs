use super::base::{Tool, ToolContext, failure, object_schema};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

// ==================== searchStickers ====================

#[derive(Debug, Deserialize)]
struct SearchStickersInput {
    #[serde(default)]
    keyword: String,
    #[serde(default)]
    limit: usize,
}

pub struct SearchStickersTool;

#[async_trait]
impl Tool for SearchStickersTool {
    fn name(&self) -> &str {
        "searchStickers"
    }

    fn description(&self) -> &str {
        "搜索已保存的表情包。可以通过关键词搜索，如情绪（开心、无语）、内容（猫、狗）等。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "keyword": { "type": "string", "description": "按描述关键词搜索，如：猫、开心、无语等" },
                "limit": { "type": "integer", "description": "返回数量，默认10" },
            }),
            &[],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: SearchStickersInput = serde_json::from_value(params).unwrap_or(
            SearchStickersInput {
                keyword: String::new(),
                limit: 0,
            },
        );
        let limit = if input.limit == 0 { 10 } else { input.limit };

        match ctx.store.search_stickers(&input.keyword, limit) {
            Ok(stickers) if stickers.is_empty() => {
                Ok(json!({ "success": true, "message": "没有找到相关表情包" }))
            }
            Ok(stickers) => {
                let items: Vec<Value> = stickers
                    .iter()
                    .map(|s| {
                        json!({
                            "id": s.id,
                            "description": s.description,
                            "use_count": s.use_count,
                        })
                    })
                    .collect();
                Ok(json!({ "success": true, "stickers": items }))
            }
            Err(e) => Ok(failure(format!("搜索失败: {}", e))),
        }
    }
}

// ==================== sendSticker ====================

#[derive(Debug, Deserialize)]
struct SendStickerInput {
    #[serde(default)]
    sticker_id: i64,
}

pub struct SendStickerTool;

#[async_trait]
impl Tool for SendStickerTool {
    fn name(&self) -> &str {
        "sendSticker"
    }

    fn description(&self) -> &str {
        "发送一个已保存的表情包。先用searchStickers搜索找到合适的表情包，再用这个工具发送。"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({ "sticker_id": { "type": "integer", "description": "表情包ID（从searchStickers获取）" } }),
            &["sticker_id"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: SendStickerInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };
        if input.sticker_id == 0 {
            return Ok(failure("表情包ID不能为空"));
        }

        let sticker = match ctx.store.get_sticker(input.sticker_id) {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(failure("表情包不存在")),
            Err(e) => return Ok(failure(e.to_string())),
        };

        // The file must still exist on disk; no side effects otherwise.
        let file_path = ctx.sticker_dir.join(&sticker.file_name);
        if !file_path.exists() {
            return Ok(failure("表情包文件不存在"));
        }
        let abs = std::fs::canonicalize(&file_path).unwrap_or(file_path);

        let Some(bot) = &ctx.bot else {
            return Ok(failure("Bot未连接"));
        };
        match bot
            .send_group_image(ctx.group_id, &abs.to_string_lossy(), true)
            .await
        {
            Ok(message_id) => {
                if let Err(e) = ctx.store.touch_sticker(sticker.id) {
                    tracing::warn!("sticker use_count bump failed: {}", e);
                }
                Ok(json!({
                    "success": true,
                    "message": "表情包已发送",
                    "message_id": message_id,
                }))
            }
            Err(e) => Ok(failure(format!("发送失败: {}", e))),
        }
    }
}
