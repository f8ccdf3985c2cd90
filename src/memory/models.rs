use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Long-term memory category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Group rules, group culture, notable events, topic conclusions.
    GroupFact,
    /// Things the bot itself lived through or felt.
    SelfExperience,
    /// Important things members said.
    Conversation,
}

impl MemoryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GroupFact => "group_fact",
            Self::SelfExperience => "self_experience",
            Self::Conversation => "conversation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "group_fact" => Some(Self::GroupFact),
            "self_experience" => Some(Self::SelfExperience),
            "conversation" => Some(Self::Conversation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub mem_type: MemoryType,
    /// 0 = cross-group.
    pub group_id: i64,
    /// 0 = not tied to a member.
    pub user_id: i64,
    pub content: String,
    pub importance: f64,
    pub access_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: i64,
    pub user_id: i64,
    pub nickname: String,
    pub speak_style: String,
    /// JSON array of unique strings.
    pub interests: String,
    /// JSON array of unique strings.
    pub common_words: String,
    pub activity: f64,
    pub intimacy: f64,
    pub last_speak: DateTime<Utc>,
    pub msg_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemberProfile {
    pub fn interests_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.interests).unwrap_or_default()
    }

    pub fn common_words_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.common_words).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub id: i64,
    pub group_id: i64,
    /// Situation in which this phrasing is used.
    pub situation: String,
    /// The phrasing or catchphrase itself.
    pub style: String,
    pub examples: String,
    pub count: i64,
    pub checked: bool,
    pub rejected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jargon {
    pub id: i64,
    pub group_id: i64,
    pub content: String,
    pub meaning: String,
    pub context: String,
    pub count: i64,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sticker {
    pub id: i64,
    /// `<uuid>.<ext>` under the sticker storage dir.
    pub file_name: String,
    /// MD5 of the file content, unique.
    pub file_hash: String,
    pub description: String,
    pub use_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Singleton emotional state, decayed toward (0, 0.5, 0.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodState {
    /// Pleasantness, [-1, 1].
    pub valence: f64,
    /// Arousal, [0, 1].
    pub energy: f64,
    /// Willingness to chat, [0, 1].
    pub sociability: f64,
    pub updated_at: DateTime<Utc>,
    pub last_reason: String,
}

impl Default for MoodState {
    fn default() -> Self {
        Self {
            valence: 0.0,
            energy: 0.5,
            sociability: 0.5,
            updated_at: Utc::now(),
            last_reason: String::new(),
        }
    }
}

impl MoodState {
    pub fn valence_label(&self) -> &'static str {
        if self.valence > 0.3 {
            "心情不错"
        } else if self.valence < -0.3 {
            "心情低落"
        } else {
            "心情平静"
        }
    }

    pub fn energy_label(&self) -> &'static str {
        if self.energy > 0.7 {
            "精力充沛"
        } else if self.energy < 0.3 {
            "有点疲惫"
        } else {
            "精力一般"
        }
    }

    pub fn sociability_label(&self) -> &'static str {
        if self.sociability > 0.7 {
            "很想聊天"
        } else if self.sociability < 0.3 {
            "想安静会儿"
        } else {
            "愿意搭话"
        }
    }
}

/// Persisted trace of an observed or sent message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLog {
    pub id: i64,
    /// Gateway message id as text.
    pub message_id: String,
    pub group_id: i64,
    pub user_id: i64,
    pub nickname: String,
    pub content: String,
    pub msg_type: String,
    pub mention_self: bool,
    /// Serialized forward nodes, when the message carried a merged forward.
    pub forwards: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row counts exposed by the admin API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub memories: i64,
    pub members: i64,
    pub messages: i64,
    pub expressions: i64,
    pub jargons: i64,
    pub stickers: i64,
}
