use super::base::{Tool, ToolContext, failure, object_schema};
use crate::utils::clamp_f64;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct UpdateMoodInput {
    #[serde(default)]
    valence_delta: f64,
    #[serde(default)]
    energy_delta: f64,
    #[serde(default)]
    sociability_delta: f64,
    #[serde(default)]
    reason: String,
}

pub struct UpdateMoodTool;

#[async_trait]
impl Tool for UpdateMoodTool {
    fn name(&self) -> &str {
        "updateMood"
    }

    fn description(&self) -> &str {
        "调整你的情绪状态。情绪会自然衰减回归平静，但你可以根据对话内容主动调整。\n\n\
         【使用建议】\n\
         - 不需要每次都调整，只有明确感受到情绪变化时才调用\n\
         - 变化量建议小幅度（±0.1~0.2），除非发生重大事件\n\
         - 例如：被夸了: valence +0.2；聊太久了: energy -0.1；话题无聊: sociability -0.15"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "valence_delta": {
                    "type": "number",
                    "description": "心情变化量：正数心情变好，负数心情变差。范围-0.5~0.5",
                },
                "energy_delta": {
                    "type": "number",
                    "description": "精力变化量：正数更有活力，负数更疲惫。范围-0.3~0.3",
                },
                "sociability_delta": {
                    "type": "number",
                    "description": "社交意愿变化量：正数更想聊天，负数更想安静。范围-0.3~0.3",
                },
                "reason": { "type": "string", "description": "情绪变化的原因（给自己看的笔记，可选）" },
            }),
            &[],
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let input: UpdateMoodInput = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return Ok(failure(format!("参数错误: {}", e))),
        };

        // Bound single-step swings before the store applies its own clamps.
        let valence_delta = clamp_f64(input.valence_delta, -0.5, 0.5);
        let energy_delta = clamp_f64(input.energy_delta, -0.3, 0.3);
        let sociability_delta = clamp_f64(input.sociability_delta, -0.3, 0.3);

        match ctx.store.update_mood_state(
            valence_delta,
            energy_delta,
            sociability_delta,
            &input.reason,
        ) {
            Ok(mood) => Ok(json!({
                "success": true,
                "message": "情绪已更新",
                "valence": mood.valence,
                "energy": mood.energy,
                "sociability": mood.sociability,
            })),
            Err(e) => Ok(failure(format!("更新情绪失败: {}", e))),
        }
    }
}
