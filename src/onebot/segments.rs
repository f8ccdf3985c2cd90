use super::client::OneBotClient;
use super::types::{
    CardMessage, FaceInfo, ForwardNode, GroupMessage, ImageInfo, MessageSource, ReplyInfo,
    VideoInfo,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

/// Parse one `message` event into the canonical record. Returns `None` only
/// when the event is structurally unusable (no group id). Malformed segments
/// are skipped; a failed reply or forward resolution degrades, it never drops
/// the message.
pub async fn parse_group_message(client: &OneBotClient, event: &Value) -> Option<GroupMessage> {
    let group_id = event.get("group_id").and_then(Value::as_i64)?;

    let time = event
        .get("time")
        .and_then(Value::as_i64)
        .and_then(|t| Utc.timestamp_opt(t, 0).single())
        .unwrap_or_else(Utc::now);

    let sender = event.get("sender");
    let mut msg = GroupMessage {
        message_id: event.get("message_id").and_then(Value::as_i64).unwrap_or(0),
        group_id,
        user_id: sender
            .and_then(|s| s.get("user_id"))
            .and_then(Value::as_i64)
            .unwrap_or(0),
        nickname: str_field(sender, "nickname"),
        card: str_field(sender, "card"),
        role: str_field(sender, "role"),
        content: String::new(),
        raw_message: event
            .get("raw_message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        mention_self: false,
        mention_all: false,
        at_list: vec![],
        reply: None,
        images: vec![],
        videos: vec![],
        faces: vec![],
        forwards: None,
        time,
        source: MessageSource::Inbound,
    };

    match event.get("message").and_then(Value::as_array) {
        Some(segments) => parse_segments(client, segments, &mut msg).await,
        None => msg.content = msg.raw_message.clone(),
    }

    if msg.at_list.contains(&client.self_id()) {
        msg.mention_self = true;
    }

    Some(msg)
}

fn str_field(obj: Option<&Value>, key: &str) -> String {
    obj.and_then(|o| o.get(key))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

async fn parse_segments(client: &OneBotClient, segments: &[Value], msg: &mut GroupMessage) {
    let mut text_parts: Vec<String> = Vec::new();

    for seg in segments {
        let Some(seg_type) = seg.get("type").and_then(Value::as_str) else {
            continue;
        };
        let Some(data) = seg.get("data").and_then(Value::as_object) else {
            continue;
        };
        let get_str = |key: &str| data.get(key).and_then(Value::as_str).unwrap_or("");

        match seg_type {
            "text" => {
                let t = get_str("text");
                if !t.is_empty() {
                    text_parts.push(t.to_string());
                }
            }
            "image" => {
                let img = ImageInfo {
                    url: get_str("url").to_string(),
                    file: get_str("file").to_string(),
                    summary: get_str("summary").to_string(),
                    sub_type: data
                        .get("sub_type")
                        .and_then(Value::as_i64)
                        .unwrap_or(0) as i32,
                };
                if !img.url.is_empty() || !img.file.is_empty() {
                    msg.images.push(img);
                }
            }
            "mface" => {
                // Marketplace/magic faces arrive as their own segment type but
                // behave like sticker-subtype images downstream.
                let url = get_str("url");
                if !url.is_empty() {
                    msg.images.push(ImageInfo {
                        url: url.to_string(),
                        file: String::new(),
                        summary: get_str("summary").to_string(),
                        sub_type: 1,
                    });
                }
            }
            "face" => {
                let id = match data.get("id") {
                    Some(Value::String(s)) => s.parse().unwrap_or(0),
                    Some(Value::Number(n)) => n.as_i64().unwrap_or(0) as i32,
                    _ => 0,
                };
                let name = [get_str("name"), get_str("text"), get_str("raw")]
                    .into_iter()
                    .find(|s| !s.is_empty())
                    .unwrap_or("")
                    .to_string();
                msg.faces.push(FaceInfo { id, name });
            }
            "at" => match data.get("qq") {
                Some(Value::String(s)) if s == "all" => msg.mention_all = true,
                Some(Value::String(s)) => {
                    if let Ok(uid) = s.parse::<i64>() {
                        msg.at_list.push(uid);
                    }
                }
                Some(Value::Number(n)) => {
                    if let Some(uid) = n.as_i64() {
                        msg.at_list.push(uid);
                    }
                }
                _ => {}
            },
            "reply" => {
                let reply_id = match data.get("id") {
                    Some(Value::String(s)) => s.parse().unwrap_or(0),
                    Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
                    _ => 0,
                };
                if reply_id > 0 {
                    msg.reply = Some(resolve_reply(client, reply_id).await);
                }
            }
            "record" => text_parts.push("[语音]".to_string()),
            "video" => {
                msg.videos.push(VideoInfo {
                    url: get_str("url").to_string(),
                    file: get_str("file").to_string(),
                });
                text_parts.push("[视频]".to_string());
            }
            "file" => {
                let name = get_str("name");
                if name.is_empty() {
                    text_parts.push("[文件]".to_string());
                } else {
                    text_parts.push(format!("[文件:{}]", name));
                }
            }
            "json" => {
                let rendered = match parse_card_message(get_str("data")) {
                    Some(card) => card.render(),
                    None => "[卡片消息]".to_string(),
                };
                text_parts.push(rendered);
            }
            "forward" => {
                let forward_id = get_str("id");
                if !forward_id.is_empty() {
                    match client.get_forward_msg(forward_id).await {
                        Ok(nodes) => msg.forwards = Some(nodes),
                        Err(e) => debug!("forward resolution failed: {}", e),
                    }
                }
                text_parts.push("[合并转发]".to_string());
            }
            other => debug!("skipping unknown segment type '{}'", other),
        }
    }

    msg.content = text_parts.join(" ");
}

/// Fetch the replied-to message's text and sender. On failure the snippet
/// stays empty and parsing proceeds.
async fn resolve_reply(client: &OneBotClient, reply_id: i64) -> ReplyInfo {
    let mut reply = ReplyInfo {
        message_id: reply_id,
        ..ReplyInfo::default()
    };
    match client.get_msg(reply_id).await {
        Ok(data) => {
            if let Some(raw) = data.get("raw_message").and_then(Value::as_str) {
                reply.content = raw.to_string();
            }
            if let Some(sender) = data.get("sender") {
                reply.sender_id = sender.get("user_id").and_then(Value::as_i64).unwrap_or(0);
                reply.nickname = sender
                    .get("nickname")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
            }
        }
        Err(e) => debug!("reply resolution failed for #{}: {}", reply_id, e),
    }
    reply
}

/// Parse a JSON card segment into its displayable parts.
/// Returns `None` when neither a title nor a description can be recovered.
pub fn parse_card_message(json_str: &str) -> Option<CardMessage> {
    let data: Value = serde_json::from_str(json_str).ok()?;
    let mut card = CardMessage {
        app: data.get("app").and_then(Value::as_str).unwrap_or("").to_string(),
        ..CardMessage::default()
    };

    // Common structure: meta.<first-object> holds title/desc/jumpUrl.
    if let Some(meta) = data.get("meta").and_then(Value::as_object) {
        for detail in meta.values().filter_map(Value::as_object) {
            if let Some(title) = detail.get("title").and_then(Value::as_str) {
                card.title = title.to_string();
            }
            if let Some(desc) = detail.get("desc").and_then(Value::as_str) {
                card.desc = desc.to_string();
            }
            if let Some(url) = detail.get("jumpUrl").and_then(Value::as_str) {
                card.url = url.to_string();
            } else if let Some(url) = detail.get("qqdocurl").and_then(Value::as_str) {
                card.url = url.to_string();
            }
            break;
        }
    }

    if card.title.is_empty() {
        if let Some(prompt) = data.get("prompt").and_then(Value::as_str) {
            card.title = prompt.to_string();
        }
    }
    if card.desc.is_empty() {
        if let Some(desc) = data.get("desc").and_then(Value::as_str) {
            card.desc = desc.to_string();
        }
    }

    if card.title.is_empty() && card.desc.is_empty() {
        return None;
    }
    Some(card)
}

/// Flatten the textual content of a segment array (essence messages,
/// forward nodes). Non-text segments render as short placeholders.
pub fn extract_text_from_segments(segments: &[Value]) -> String {
    let mut out = String::new();
    for seg in segments {
        let Some(seg_type) = seg.get("type").and_then(Value::as_str) else {
            continue;
        };
        let data = seg.get("data");
        match seg_type {
            "text" => {
                if let Some(t) = data.and_then(|d| d.get("text")).and_then(Value::as_str) {
                    out.push_str(t);
                }
            }
            "image" => out.push_str("[图片]"),
            "face" => out.push_str("[表情]"),
            "forward" => out.push_str("[合并转发]"),
            _ => {}
        }
    }
    out
}

/// Parse the node list of a `get_forward_msg` response.
pub fn parse_forward_nodes(data: &Value) -> Vec<ForwardNode> {
    let Some(messages) = data.get("messages").and_then(Value::as_array) else {
        return vec![];
    };
    messages
        .iter()
        .map(|node| {
            let sender = node.get("sender");
            let content = node
                .get("message")
                .or_else(|| node.get("content"))
                .and_then(Value::as_array)
                .map(|segs| extract_text_from_segments(segs))
                .or_else(|| {
                    node.get("raw_message")
                        .and_then(Value::as_str)
                        .map(ToString::to_string)
                })
                .unwrap_or_default();
            ForwardNode {
                user_id: sender
                    .and_then(|s| s.get("user_id"))
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
                nickname: sender
                    .and_then(|s| s.get("nickname"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                content,
            }
        })
        .collect()
}
