use super::base::{Tool, ToolContext, failure, success};
use super::*;
use crate::config::MemoryConfig;
use crate::memory::MemoryStore;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn test_ctx() -> (ToolContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = MemoryConfig::default();
    cfg.sqlite.path = dir.path().join("t.db").to_string_lossy().to_string();
    let store = Arc::new(MemoryStore::new(&cfg, None).unwrap());
    let ctx = ToolContext::new(1, store, None, None, dir.path().to_path_buf(), false);
    (ctx, dir)
}

struct PanickyTool;

#[async_trait]
impl Tool for PanickyTool {
    fn name(&self) -> &str {
        "panicky"
    }
    fn description(&self) -> &str {
        "always panics"
    }
    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }
    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        panic!("boom");
    }
}

struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }
    fn description(&self) -> &str {
        "always errors"
    }
    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }
    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        anyhow::bail!("infra fault")
    }
}

#[test]
fn default_registry_has_the_full_tool_set() {
    let registry = default_registry();
    for name in [
        "speak",
        "stayQuiet",
        "saveMemory",
        "queryMemory",
        "saveJargon",
        "getUnverifiedJargons",
        "reviewJargon",
        "saveExpression",
        "getExpressions",
        "getUncheckedExpressions",
        "reviewExpression",
        "updateMemberProfile",
        "getMemberInfo",
        "getRecentMessages",
        "getCurrentTime",
        "getGroupInfo",
        "getGroupMemberDetail",
        "getGroupNotices",
        "getEssenceMessages",
        "getMessageReactions",
        "getForwardMessageDetail",
        "poke",
        "reactToMessage",
        "recallMessage",
        "searchStickers",
        "sendSticker",
        "updateMood",
    ] {
        assert!(registry.get(name).is_some(), "missing tool {}", name);
    }
}

#[test]
fn definitions_are_sorted_and_schema_typed() {
    let registry = default_registry();
    let defs = registry.definitions();
    assert_eq!(defs.len(), registry.len());
    let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
    for def in &defs {
        assert_eq!(def.parameters["type"], "object", "{} schema", def.name);
        assert!(!def.description.is_empty());
    }
}

#[tokio::test]
async fn dispatch_unknown_tool_returns_failure() {
    let (ctx, _dir) = test_ctx();
    let registry = default_registry();
    let result = registry.dispatch("transmogrify", json!({}), &ctx).await;
    assert_eq!(result["success"], false);
}

#[tokio::test]
async fn dispatch_isolates_panics() {
    let (ctx, _dir) = test_ctx();
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(PanickyTool));
    let result = registry.dispatch("panicky", json!({}), &ctx).await;
    assert_eq!(result["success"], false);
}

#[tokio::test]
async fn dispatch_converts_errors_to_failure_payloads() {
    let (ctx, _dir) = test_ctx();
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FailingTool));
    let result = registry.dispatch("failing", json!({}), &ctx).await;
    assert_eq!(result["success"], false);
    assert!(result["message"].as_str().unwrap().contains("infra fault"));
}

#[tokio::test]
async fn save_and_query_memory_through_tools() {
    let (ctx, _dir) = test_ctx();
    let registry = default_registry();

    let result = registry
        .dispatch(
            "saveMemory",
            json!({ "type": "group_fact", "content": "群主周五开黑", "importance": 0.8 }),
            &ctx,
        )
        .await;
    assert_eq!(result["success"], true);

    let result = registry
        .dispatch("queryMemory", json!({ "query": "开黑", "scoped": true }), &ctx)
        .await;
    assert_eq!(result["success"], true);
    assert_eq!(result["count"], 1);

    // Invalid type is a user-facing failure, not an error
    let result = registry
        .dispatch("saveMemory", json!({ "type": "whatever", "content": "x" }), &ctx)
        .await;
    assert_eq!(result["success"], false);
}

#[tokio::test]
async fn speak_invokes_callback_and_counts_sends() {
    let (mut ctx, _dir) = test_ctx();
    let sends = Arc::new(AtomicUsize::new(0));
    let counter = sends.clone();
    ctx.speak = Some(Arc::new(move |_gid, _content, _reply, _mentions| {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            4242
        })
    }));

    let registry = default_registry();
    let result = registry
        .dispatch("speak", json!({ "content": "哈喽" }), &ctx)
        .await;
    assert_eq!(result["success"], true);
    assert_eq!(result["message_id"], 4242);
    assert_eq!(sends.load(Ordering::SeqCst), 1);

    // Empty content never reaches the callback
    let result = registry.dispatch("speak", json!({ "content": "" }), &ctx).await;
    assert_eq!(result["success"], false);
    assert_eq!(sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn speak_callback_failure_reports_zero_sends() {
    let (mut ctx, _dir) = test_ctx();
    let sends = Arc::new(AtomicUsize::new(0));
    ctx.speak = Some(Arc::new(move |_gid, _content, _reply, _mentions| {
        Box::pin(async move { 0 })
    }));

    let registry = default_registry();
    let result = registry
        .dispatch("speak", json!({ "content": "哈喽" }), &ctx)
        .await;
    assert_eq!(result["success"], false);
    assert_eq!(sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stay_quiet_fires_the_stop_hook_before_returning() {
    let (ctx, _dir) = test_ctx();
    let registry = default_registry();
    assert!(!ctx.is_stopped());
    let result = registry.dispatch("stayQuiet", json!({ "reason": "没啥可说" }), &ctx).await;
    assert_eq!(result["success"], true);
    assert!(ctx.is_stopped());
}

#[tokio::test]
async fn update_mood_clamps_deltas() {
    let (ctx, _dir) = test_ctx();
    let registry = default_registry();
    let result = registry
        .dispatch(
            "updateMood",
            json!({ "valence_delta": 9.0, "energy_delta": -9.0, "sociability_delta": 9.0 }),
            &ctx,
        )
        .await;
    assert_eq!(result["success"], true);
    // +9 valence clamps to +0.5 delta from 0.0
    assert!((result["valence"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    // -9 energy clamps to -0.3 delta from 0.5
    assert!((result["energy"].as_f64().unwrap() - 0.2).abs() < 1e-9);
    assert!((result["sociability"].as_f64().unwrap() - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn gateway_tools_fail_cleanly_without_a_bot() {
    let (ctx, _dir) = test_ctx();
    let registry = default_registry();
    for (name, params) in [
        ("poke", json!({ "user_id": 5 })),
        ("reactToMessage", json!({ "message_id": 1, "emoji_id": 76 })),
        ("recallMessage", json!({ "message_id": 1 })),
        ("getGroupInfo", json!({})),
        ("getGroupMemberDetail", json!({ "user_id": 5 })),
    ] {
        let result = registry.dispatch(name, params, &ctx).await;
        assert_eq!(result["success"], false, "{} should fail without a bot", name);
    }
}

#[tokio::test]
async fn send_sticker_requires_the_file_on_disk() {
    let (ctx, dir) = test_ctx();
    ctx.store.save_sticker("ghost.png", "h404", "不存在的").unwrap();
    let registry = default_registry();

    let result = registry.dispatch("sendSticker", json!({ "sticker_id": 1 }), &ctx).await;
    assert_eq!(result["success"], false);
    assert_eq!(result["message"], "表情包文件不存在");

    // With the file present but no bot, the failure moves to the gateway step
    // and still has no side effects.
    std::fs::write(dir.path().join("ghost.png"), b"png").unwrap();
    let result = registry.dispatch("sendSticker", json!({ "sticker_id": 1 }), &ctx).await;
    assert_eq!(result["success"], false);
    let sticker = ctx.store.get_sticker(1).unwrap().unwrap();
    assert_eq!(sticker.use_count, 0);
}

#[tokio::test]
async fn forward_detail_reads_persisted_payload() {
    let (ctx, _dir) = test_ctx();
    let registry = default_registry();

    let nodes = json!([{ "user_id": 9, "nickname": "甲", "content": "转发的内容" }]);
    ctx.store
        .add_message(&crate::memory::MessageLog {
            id: 0,
            message_id: "777".to_string(),
            group_id: 1,
            user_id: 9,
            nickname: "甲".to_string(),
            content: "[合并转发]".to_string(),
            msg_type: "group".to_string(),
            mention_self: false,
            forwards: Some(nodes.to_string()),
            created_at: chrono::Utc::now(),
        })
        .unwrap();

    let result = registry
        .dispatch("getForwardMessageDetail", json!({ "message_id": 777 }), &ctx)
        .await;
    assert_eq!(result["success"], true);
    assert_eq!(result["messages"][0]["content"], "转发的内容");

    let result = registry
        .dispatch("getForwardMessageDetail", json!({ "message_id": 1 }), &ctx)
        .await;
    assert_eq!(result["success"], false);
}

#[test]
fn outcome_helpers_shape() {
    assert_eq!(success("ok")["success"], true);
    let f = failure("no");
    assert_eq!(f["success"], false);
    assert_eq!(f["message"], "no");
}
