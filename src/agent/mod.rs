pub mod chat_context;
pub mod scheduler;
pub mod think;

use crate::buffer::RingBuffer;
use crate::config::Config;
use crate::memory::{MemoryStore, MessageLog};
use crate::onebot::{GroupMessage, MessageSource, OneBotClient};
use crate::persona::Persona;
use crate::providers::LLMProvider;
use crate::providers::VisionClient;
use crate::tools::ToolRegistry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Everything the agent tracks per group, behind one map entry so the
/// scheduler, the intake path and think episodes contend on the record
/// instead of the map.
pub struct GroupState {
    pub buffer: RingBuffer<Arc<GroupMessage>>,
    /// At most one think episode per group; contenders try-lock and leave.
    pub thinking: tokio::sync::Mutex<()>,
    pub last_speak: std::sync::Mutex<Option<DateTime<Utc>>>,
    pub last_processed: std::sync::Mutex<Option<DateTime<Utc>>>,
}

impl GroupState {
    fn new(buffer_size: usize) -> Self {
        Self {
            buffer: RingBuffer::new(buffer_size),
            thinking: tokio::sync::Mutex::new(()),
            last_speak: std::sync::Mutex::new(None),
            last_processed: std::sync::Mutex::new(None),
        }
    }

    pub fn last_speak_at(&self) -> Option<DateTime<Utc>> {
        *self
            .last_speak
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn last_processed_at(&self) -> Option<DateTime<Utc>> {
        *self
            .last_processed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// The autonomous group member: observes traffic, decides when to think,
/// acts through tools.
pub struct Agent {
    pub(crate) cfg: Arc<Config>,
    pub(crate) persona: Arc<Persona>,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) provider: Arc<dyn LLMProvider>,
    pub(crate) vision: Option<Arc<VisionClient>>,
    pub(crate) bot: Arc<OneBotClient>,
    pub(crate) tools: Arc<ToolRegistry>,
    groups: RwLock<HashMap<i64, Arc<GroupState>>>,
    shutdown: watch::Receiver<bool>,
}

impl Agent {
    pub fn new(
        cfg: Arc<Config>,
        persona: Arc<Persona>,
        store: Arc<MemoryStore>,
        provider: Arc<dyn LLMProvider>,
        vision: Option<Arc<VisionClient>>,
        bot: Arc<OneBotClient>,
        tools: Arc<ToolRegistry>,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            persona,
            store,
            provider,
            vision,
            bot,
            tools,
            groups: RwLock::new(HashMap::new()),
            shutdown,
        })
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub(crate) fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }

    pub(crate) fn bot_self_id(&self) -> i64 {
        self.bot.self_id()
    }

    pub fn group_state(&self, group_id: i64) -> Arc<GroupState> {
        if let Some(state) = self
            .groups
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&group_id)
        {
            return state.clone();
        }
        let mut groups = self
            .groups
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        groups
            .entry(group_id)
            .or_insert_with(|| Arc::new(GroupState::new(self.cfg.agent.message_buffer_size)))
            .clone()
    }

    /// Drain the gateway's inbound channel until shutdown.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<GroupMessage>) {
        info!("agent started, observing {} group(s)", self.cfg.enabled_groups().count());
        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                msg = inbound.recv() => {
                    let Some(msg) = msg else {
                        info!("inbound channel closed, agent stopping");
                        return;
                    };
                    self.ingest(msg).await;
                }
                _ = shutdown.changed() => {
                    info!("agent shutting down");
                    return;
                }
            }
        }
    }

    /// Single intake path for gateway messages and our own re-ingested
    /// replies: buffer, persist, member touch, mention fast path.
    pub async fn ingest(self: &Arc<Self>, mut msg: GroupMessage) {
        if !self.cfg.is_group_enabled(msg.group_id) {
            return;
        }

        let is_self = msg.source == MessageSource::OutboundSelf
            || (self.bot_self_id() != 0 && msg.user_id == self.bot_self_id());
        if !msg.mention_self && self.persona.is_mentioned(&msg.content) {
            msg.mention_self = true;
        }
        let is_mention = msg.mention_self;
        let group_id = msg.group_id;

        let state = self.group_state(group_id);
        let msg = Arc::new(msg);
        state.buffer.push(msg.clone());

        let log = MessageLog {
            id: 0,
            message_id: msg.message_id.to_string(),
            group_id,
            user_id: msg.user_id,
            nickname: msg.nickname.clone(),
            content: content_with_at(&msg, self.bot_self_id(), self.persona.name()),
            msg_type: "group".to_string(),
            mention_self: is_mention,
            forwards: msg
                .forwards
                .as_ref()
                .and_then(|nodes| serde_json::to_string(nodes).ok()),
            created_at: msg.time,
        };
        if let Err(e) = self.store.add_message(&log) {
            warn!("message log write failed: {}", e);
        }

        if is_self {
            return;
        }

        // Member touch runs off the intake path
        {
            let store = self.store.clone();
            let msg = msg.clone();
            tokio::spawn(async move {
                touch_member_profile(&store, &msg);
            });
        }

        // Being addressed skips the tick, cooldown and probability gates
        if is_mention {
            let agent = self.clone();
            tokio::spawn(async move {
                agent.think(group_id, true).await;
            });
        }
    }

    /// Send a message into the group: typing simulation, dispatch, cooldown
    /// bookkeeping, and re-ingestion so our own words show up in buffers and
    /// logs like anyone else's. Returns the new message id, 0 on failure.
    pub async fn do_speak(
        self: &Arc<Self>,
        group_id: i64,
        content: String,
        reply_to: i64,
        mentions: Vec<i64>,
    ) -> i64 {
        if self.cfg.chat.typing_simulation {
            let speed = self.cfg.chat.typing_speed.max(1);
            let secs = content.chars().count() as f64 / f64::from(speed);
            let delay = secs.clamp(0.5, 5.0);
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }

        let sent = if reply_to > 0 || !mentions.is_empty() {
            self.bot
                .send_group_msg_reply(group_id, &content, reply_to, &mentions)
                .await
        } else {
            self.bot.send_group_msg(group_id, &content).await
        };

        let message_id = match sent {
            Ok(id) => id,
            Err(e) => {
                error!("speak failed in group {}: {}", group_id, e);
                return 0;
            }
        };

        {
            let state = self.group_state(group_id);
            let mut last = state
                .last_speak
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *last = Some(Utc::now());
        }

        let echo = GroupMessage::outbound(
            group_id,
            message_id,
            self.bot_self_id(),
            self.persona.name().to_string(),
            content.clone(),
        );
        self.ingest(echo).await;

        info!("spoke in group {}: {}", group_id, content);
        message_id
    }

    /// Download → hash → dedupe-save one sticker image. Duplicates delete
    /// the freshly written file.
    pub async fn auto_save_sticker(self: &Arc<Self>, url: String, description: String) {
        if url.is_empty() {
            return;
        }
        let storage = std::path::PathBuf::from(&self.cfg.sticker.storage_path);
        let result = match crate::utils::download_image(&url, &storage, self.cfg.sticker.max_size_mb).await
        {
            Ok(r) => r,
            Err(e) => {
                debug!("sticker download failed: {}", e);
                return;
            }
        };

        let description = if description.is_empty() {
            "未描述的表情包".to_string()
        } else {
            description
        };

        match self
            .store
            .save_sticker(&result.file_name, &result.file_hash, &description)
        {
            Ok(true) => {
                let _ = std::fs::remove_file(&result.file_path);
                debug!("sticker already collected, hash {}", result.file_hash);
            }
            Ok(false) => {
                info!("collected sticker: {}", description);
            }
            Err(e) => {
                let _ = std::fs::remove_file(&result.file_path);
                warn!("sticker save failed: {}", e);
            }
        }
    }
}

/// Log content with the at-targets spelled out in front, the way a reader
/// of the raw log would want to see them.
fn content_with_at(msg: &GroupMessage, self_id: i64, persona_name: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    if msg.mention_all {
        parts.push("@全体成员".to_string());
    }
    for &uid in &msg.at_list {
        if uid == self_id {
            parts.push(format!("@{}", persona_name));
        } else {
            parts.push(format!("@{}", uid));
        }
    }
    if parts.is_empty() {
        return msg.content.clone();
    }
    format!("{} {}", parts.join(" "), msg.content)
}

fn touch_member_profile(store: &MemoryStore, msg: &GroupMessage) {
    let mut profile = match store.get_or_create_member_profile(msg.user_id, &msg.nickname) {
        Ok(p) => p,
        Err(e) => {
            warn!("member profile load failed for {}: {}", msg.user_id, e);
            return;
        }
    };
    profile.msg_count += 1;
    profile.last_speak = msg.time;
    if !msg.nickname.is_empty() {
        profile.nickname = msg.nickname.clone();
    }
    if let Err(e) = store.update_member_profile(&mut profile) {
        warn!("member profile update failed for {}: {}", msg.user_id, e);
    }
}
