// Not every test binary uses every helper here.
#![allow(dead_code)]

use async_trait::async_trait;
use murmur::agent::Agent;
use murmur::config::{Config, GroupConfig};
use murmur::memory::MemoryStore;
use murmur::onebot::{GroupMessage, MessageSource, OneBotClient};
use murmur::persona::Persona;
use murmur::providers::base::{ChatRequest, LLMProvider, LLMResponse, ToolCallRequest};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

/// LLM stand-in that replays scripted responses and counts chat calls.
/// Once the script is exhausted it answers with plain text, which ends a
/// reasoning episode.
pub struct ScriptedProvider {
    script: std::sync::Mutex<VecDeque<LLMResponse>>,
    pub calls: AtomicUsize,
    pub delay_ms: u64,
}

impl ScriptedProvider {
    pub fn new(script: Vec<LLMResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: std::sync::Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            delay_ms: 0,
        })
    }

    pub fn with_delay(script: Vec<LLMResponse>, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            script: std::sync::Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            delay_ms,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(&self, _req: ChatRequest<'_>) -> anyhow::Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        Ok(next.unwrap_or(LLMResponse {
            content: Some("好的".to_string()),
            tool_calls: vec![],
        }))
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

pub fn tool_response(calls: Vec<ToolCallRequest>) -> LLMResponse {
    LLMResponse {
        content: None,
        tool_calls: calls,
    }
}

pub struct TestHarness {
    pub agent: Arc<Agent>,
    pub store: Arc<MemoryStore>,
    pub shutdown_tx: watch::Sender<bool>,
    pub sticker_dir: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

/// Agent wired to a scripted provider and an unconnected gateway.
pub fn build_agent(provider: Arc<dyn LLMProvider>) -> TestHarness {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::default();
    cfg.persona.name = "木木".to_string();
    cfg.persona.alias_names = vec!["mumu".to_string()];
    cfg.chat.typing_simulation = false;
    cfg.chat.talk_frequency = 0.0;
    cfg.memory.sqlite.path = dir.path().join("it.db").to_string_lossy().to_string();
    let agent_sticker_path = dir.path().join("stickers").to_string_lossy().to_string();
    cfg.sticker.storage_path = agent_sticker_path.clone();
    cfg.groups.push(GroupConfig {
        group_id: 1,
        enabled: true,
        extra_prompt: String::new(),
    });

    let cfg = Arc::new(cfg);
    let persona = Arc::new(Persona::new(cfg.persona.clone()));
    let store = Arc::new(MemoryStore::new(&cfg.memory, None).unwrap());
    let (bot, _inbound_rx) = OneBotClient::new(cfg.onebot.clone());
    bot.set_self_id(10_000);
    let tools = Arc::new(murmur::tools::default_registry());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let agent = Agent::new(
        cfg,
        persona,
        store.clone(),
        provider,
        None,
        bot,
        tools,
        shutdown_rx,
    );

    let sticker_dir = std::path::PathBuf::from(&agent_sticker_path);
    TestHarness {
        agent,
        store,
        shutdown_tx,
        sticker_dir,
        _dir: dir,
    }
}

pub fn group_message(group_id: i64, user_id: i64, message_id: i64, content: &str) -> GroupMessage {
    GroupMessage {
        message_id,
        group_id,
        user_id,
        nickname: "群友".to_string(),
        card: String::new(),
        role: "member".to_string(),
        content: content.to_string(),
        raw_message: String::new(),
        mention_self: false,
        mention_all: false,
        at_list: vec![],
        reply: None,
        images: vec![],
        videos: vec![],
        faces: vec![],
        forwards: None,
        time: chrono::Utc::now(),
        source: MessageSource::Inbound,
    }
}
