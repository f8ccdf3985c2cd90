use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a buffered message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSource {
    Inbound,
    OutboundSelf,
}

/// Canonical group message record produced by the normalizer.
/// Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMessage {
    pub message_id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub nickname: String,
    /// Group card name, may be empty.
    pub card: String,
    /// owner / admin / member.
    pub role: String,
    /// Rendered text including bracketed placeholders for non-text parts.
    pub content: String,
    pub raw_message: String,
    /// True when our own account appears in `at_list`, or (set later at
    /// intake) when the persona name/alias appears in `content`.
    pub mention_self: bool,
    pub mention_all: bool,
    pub at_list: Vec<i64>,
    pub reply: Option<ReplyInfo>,
    pub images: Vec<ImageInfo>,
    pub videos: Vec<VideoInfo>,
    pub faces: Vec<FaceInfo>,
    /// Resolved nodes of a merged-forward payload.
    pub forwards: Option<Vec<ForwardNode>>,
    pub time: DateTime<Utc>,
    pub source: MessageSource,
}

impl GroupMessage {
    /// Skeleton for messages we synthesize ourselves (outbound re-ingestion).
    pub fn outbound(group_id: i64, message_id: i64, user_id: i64, nickname: String, content: String) -> Self {
        Self {
            message_id,
            group_id,
            user_id,
            nickname,
            card: String::new(),
            role: "member".to_string(),
            content,
            raw_message: String::new(),
            mention_self: false,
            mention_all: false,
            at_list: vec![],
            reply: None,
            images: vec![],
            videos: vec![],
            faces: vec![],
            forwards: None,
            time: Utc::now(),
            source: MessageSource::OutboundSelf,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    pub url: String,
    pub file: String,
    /// Gateway-provided caption, often present for stickers.
    pub summary: String,
    /// 0 = photo, 1 = sticker.
    pub sub_type: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    pub url: String,
    pub file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaceInfo {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyInfo {
    pub message_id: i64,
    /// Raw text of the replied-to message; empty when resolution failed.
    pub content: String,
    pub sender_id: i64,
    pub nickname: String,
}

/// One node of a resolved merged-forward message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardNode {
    pub user_id: i64,
    pub nickname: String,
    pub content: String,
}

/// Parsed JSON-card payload.
#[derive(Debug, Clone, Default)]
pub struct CardMessage {
    pub app: String,
    pub title: String,
    pub desc: String,
    pub url: String,
}

impl CardMessage {
    pub fn render(&self) -> String {
        if !self.url.is_empty() {
            format!("[卡片:{} - {} 链接:{}]", self.title, self.desc, self.url)
        } else if !self.desc.is_empty() {
            format!("[卡片:{} - {}]", self.title, self.desc)
        } else {
            format!("[卡片:{}]", self.title)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: i64,
    pub group_name: String,
    pub member_count: i64,
    pub max_member_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupMemberInfo {
    pub group_id: i64,
    pub user_id: i64,
    pub nickname: String,
    pub card: String,
    pub role: String,
    pub join_time: i64,
    pub last_sent_time: i64,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupNotice {
    pub notice_id: String,
    pub sender_id: i64,
    pub publish_time: i64,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EssenceMessage {
    pub message_id: i64,
    pub sender_id: i64,
    pub sender_nick: String,
    pub operator_id: i64,
    pub operator_nick: String,
    pub operator_time: i64,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmojiReaction {
    pub emoji_id: i32,
    pub count: i64,
}

/// Correlated gateway API response frame.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: String,
    pub retcode: i64,
    pub data: serde_json::Value,
    pub message: String,
}
