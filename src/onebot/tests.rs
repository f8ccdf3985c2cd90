use super::client::OneBotClient;
use super::segments::{parse_card_message, parse_forward_nodes, parse_group_message};
use super::types::MessageSource;
use crate::config::OneBotConfig;
use serde_json::json;

fn test_client() -> std::sync::Arc<OneBotClient> {
    let (client, _rx) = OneBotClient::new(OneBotConfig::default());
    client.set_self_id(10_000);
    client
}

fn group_event(message: serde_json::Value) -> serde_json::Value {
    json!({
        "post_type": "message",
        "message_type": "group",
        "time": 1_700_000_000,
        "message_id": 42,
        "group_id": 12345,
        "sender": { "user_id": 777, "nickname": "老王", "card": "", "role": "member" },
        "raw_message": "raw",
        "message": message,
    })
}

#[tokio::test]
async fn text_segments_join_with_single_spaces() {
    let client = test_client();
    let event = group_event(json!([
        { "type": "text", "data": { "text": "早上好" } },
        { "type": "record", "data": {} },
        { "type": "text", "data": { "text": "听听这个" } },
    ]));
    let msg = parse_group_message(&client, &event).await.unwrap();
    assert_eq!(msg.content, "早上好 [语音] 听听这个");
    assert_eq!(msg.group_id, 12345);
    assert_eq!(msg.user_id, 777);
    assert_eq!(msg.source, MessageSource::Inbound);
}

#[tokio::test]
async fn at_self_sets_mention_and_all_flag() {
    let client = test_client();
    let event = group_event(json!([
        { "type": "at", "data": { "qq": "10000" } },
        { "type": "at", "data": { "qq": "all" } },
        { "type": "at", "data": { "qq": "555" } },
        { "type": "text", "data": { "text": "开会了" } },
    ]));
    let msg = parse_group_message(&client, &event).await.unwrap();
    assert!(msg.mention_self);
    assert!(msg.mention_all);
    assert_eq!(msg.at_list, vec![10_000, 555]);
}

#[tokio::test]
async fn file_and_sticker_segments_render_placeholders() {
    let client = test_client();
    let event = group_event(json!([
        { "type": "file", "data": { "name": "报表.xlsx" } },
        { "type": "file", "data": {} },
        { "type": "mface", "data": { "url": "http://img/m.png", "summary": "[贴贴]" } },
        { "type": "video", "data": { "file": "v.mp4" } },
    ]));
    let msg = parse_group_message(&client, &event).await.unwrap();
    assert_eq!(msg.content, "[文件:报表.xlsx] [文件] [视频]");
    assert_eq!(msg.images.len(), 1);
    assert_eq!(msg.images[0].sub_type, 1);
    assert_eq!(msg.images[0].summary, "[贴贴]");
    assert_eq!(msg.videos.len(), 1);
}

#[tokio::test]
async fn malformed_segments_are_skipped_not_fatal() {
    let client = test_client();
    let event = group_event(json!([
        { "type": "text" },
        { "bogus": true },
        { "type": "wiggle", "data": {} },
        { "type": "text", "data": { "text": "还在" } },
    ]));
    let msg = parse_group_message(&client, &event).await.unwrap();
    assert_eq!(msg.content, "还在");
}

#[tokio::test]
async fn reply_resolution_failure_leaves_empty_snippet() {
    // Unconnected client: get_msg fails fast, the reply struct survives with
    // the id and an empty snippet.
    let client = test_client();
    let event = group_event(json!([
        { "type": "reply", "data": { "id": "41" } },
        { "type": "text", "data": { "text": "对" } },
    ]));
    let msg = parse_group_message(&client, &event).await.unwrap();
    let reply = msg.reply.unwrap();
    assert_eq!(reply.message_id, 41);
    assert!(reply.content.is_empty());
}

#[tokio::test]
async fn normalizer_is_deterministic() {
    let client = test_client();
    let event = group_event(json!([
        { "type": "text", "data": { "text": "hello" } },
        { "type": "face", "data": { "id": "182", "name": "笑哭" } },
    ]));
    let a = parse_group_message(&client, &event).await.unwrap();
    let b = parse_group_message(&client, &event).await.unwrap();
    assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
}

#[test]
fn card_parsing_full_and_degraded() {
    let full = json!({
        "app": "com.tencent.structmsg",
        "meta": { "news": { "title": "标题", "desc": "描述", "jumpUrl": "https://x.test/a" } },
    });
    let card = parse_card_message(&full.to_string()).unwrap();
    assert_eq!(card.render(), "[卡片:标题 - 描述 链接:https://x.test/a]");

    let degraded = json!({ "prompt": "[分享]某视频", "desc": "" });
    let card = parse_card_message(&degraded.to_string()).unwrap();
    assert_eq!(card.render(), "[卡片:[分享]某视频]");

    assert!(parse_card_message("not json").is_none());
    assert!(parse_card_message("{}").is_none());
}

#[test]
fn forward_nodes_flatten_text() {
    let data = json!({
        "messages": [
            {
                "sender": { "user_id": 1, "nickname": "甲" },
                "message": [
                    { "type": "text", "data": { "text": "第一条" } },
                    { "type": "image", "data": {} },
                ],
            },
            {
                "sender": { "user_id": 2, "nickname": "乙" },
                "raw_message": "第二条",
            },
        ],
    });
    let nodes = parse_forward_nodes(&data);
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].content, "第一条[图片]");
    assert_eq!(nodes[1].nickname, "乙");
    assert_eq!(nodes[1].content, "第二条");
}
