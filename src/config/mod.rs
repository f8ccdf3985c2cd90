use crate::errors::MurmurError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// App / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Persona
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonaConfig {
    #[serde(default)]
    pub name: String,
    /// Aliases that also trigger mention detection.
    #[serde(default)]
    pub alias_names: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub speaking_style: String,
    #[serde(default)]
    pub personality: String,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneBotConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default)]
    pub access_token: String,
    /// Seconds between reconnect attempts after a dropped connection.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval: u64,
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:3001".to_string()
}

fn default_reconnect_interval() -> u64 {
    5
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            access_token: String::new(),
            reconnect_interval: default_reconnect_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupConfig {
    pub group_id: i64,
    #[serde(default)]
    pub enabled: bool,
    /// Group-specific extra prompt appended to the think context.
    #[serde(default)]
    pub extra_prompt: String,
}

// ---------------------------------------------------------------------------
// Agent / chat behavior
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Conversation considered idle after this many seconds of silence.
    #[serde(default = "default_observe_window")]
    pub observe_window: u64,
    /// Scheduler tick period in seconds.
    #[serde(default = "default_think_interval")]
    pub think_interval: u64,
    #[serde(default = "default_buffer_size")]
    pub message_buffer_size: usize,
    /// Reasoning loop step bound.
    #[serde(default = "default_max_step")]
    pub max_step: usize,
    /// Minimum seconds between two of our own messages in one group.
    #[serde(default = "default_speak_cooldown")]
    pub speak_cooldown: u64,
}

fn default_observe_window() -> u64 {
    60
}
fn default_think_interval() -> u64 {
    30
}
fn default_buffer_size() -> usize {
    50
}
fn default_max_step() -> usize {
    5
}
fn default_speak_cooldown() -> u64 {
    60
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            observe_window: default_observe_window(),
            think_interval: default_think_interval(),
            message_buffer_size: default_buffer_size(),
            max_step: default_max_step(),
            speak_cooldown: default_speak_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRuleConfig {
    /// "HH:MM-HH:MM"; may wrap midnight.
    pub time_range: String,
    /// 0 applies globally.
    #[serde(default)]
    pub group_id: i64,
    pub talk_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base probability of launching a tick-triggered think episode.
    #[serde(default = "default_talk_frequency")]
    pub talk_frequency: f64,
    #[serde(default = "default_true")]
    pub typing_simulation: bool,
    /// Characters per second for typing simulation.
    #[serde(default = "default_typing_speed")]
    pub typing_speed: u32,
    #[serde(default)]
    pub enable_time_rules: bool,
    #[serde(default)]
    pub time_rules: Vec<TimeRuleConfig>,
}

fn default_talk_frequency() -> f64 {
    0.3
}
fn default_typing_speed() -> u32 {
    6
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            talk_frequency: default_talk_frequency(),
            typing_simulation: true,
            typing_speed: default_typing_speed(),
            enable_time_rules: false,
            time_rules: vec![],
        }
    }
}

// ---------------------------------------------------------------------------
// Model endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub model: String,
    /// Extra payload fields merged verbatim into chat requests.
    #[serde(default)]
    pub extra_fields: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VisionLlmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub model: String,
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/murmur.db".to_string()
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Similarity metric: COSINE, IP, or L2.
    #[serde(default = "default_metric")]
    pub metric: String,
}

fn default_metric() -> String {
    "COSINE".to_string()
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metric: default_metric(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub importance_threshold: f64,
}

fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f64 {
    0.5
}

impl Default for LongTermConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            importance_threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLogCleanupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cleanup_interval")]
    pub interval_hours: u64,
    /// Rows kept per group on each pass.
    #[serde(default = "default_keep_latest")]
    pub keep_latest: usize,
}

fn default_cleanup_interval() -> u64 {
    6
}
fn default_keep_latest() -> usize {
    2000
}

impl Default for MessageLogCleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: default_cleanup_interval(),
            keep_latest: default_keep_latest(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemoryConfig {
    #[serde(default)]
    pub sqlite: SqliteConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub long_term: LongTermConfig,
    #[serde(default)]
    pub message_log_cleanup: MessageLogCleanupConfig,
}

// ---------------------------------------------------------------------------
// Stickers / server / debug
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StickerConfig {
    #[serde(default = "default_true")]
    pub auto_save: bool,
    #[serde(default = "default_sticker_path")]
    pub storage_path: String,
    #[serde(default = "default_sticker_max_mb")]
    pub max_size_mb: u64,
}

fn default_sticker_path() -> String {
    "data/stickers".to_string()
}
fn default_sticker_max_mb() -> u64 {
    5
}

impl Default for StickerConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            storage_path: default_sticker_path(),
            max_size_mb: default_sticker_max_mb(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8900
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    #[serde(default)]
    pub show_prompt: bool,
    #[serde(default)]
    pub show_thinking: bool,
    #[serde(default)]
    pub show_memory: bool,
    #[serde(default)]
    pub show_tool_calls: bool,
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub onebot: OneBotConfig,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vision_llm: VisionLlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub sticker: StickerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl Config {
    pub fn group(&self, group_id: i64) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }

    pub fn is_group_enabled(&self, group_id: i64) -> bool {
        self.group(group_id).is_some_and(|g| g.enabled)
    }

    pub fn enabled_groups(&self) -> impl Iterator<Item = &GroupConfig> {
        self.groups.iter().filter(|g| g.enabled)
    }

    /// Validate configuration values. Fatal at startup only.
    pub fn validate(&self) -> Result<(), MurmurError> {
        if self.persona.name.trim().is_empty() {
            return Err(MurmurError::Config("persona.name must not be empty".into()));
        }
        if self.onebot.ws_url.trim().is_empty() {
            return Err(MurmurError::Config("onebot.ws_url must not be empty".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(MurmurError::Config("llm.model must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.chat.talk_frequency) || self.chat.talk_frequency.is_nan() {
            return Err(MurmurError::Config(
                "chat.talk_frequency must be between 0.0 and 1.0".into(),
            ));
        }
        if self.agent.max_step == 0 {
            return Err(MurmurError::Config("agent.max_step must be > 0".into()));
        }
        if self.agent.think_interval == 0 {
            return Err(MurmurError::Config(
                "agent.think_interval must be > 0".into(),
            ));
        }
        if self.agent.message_buffer_size == 0 {
            return Err(MurmurError::Config(
                "agent.message_buffer_size must be > 0".into(),
            ));
        }
        for rule in &self.chat.time_rules {
            if crate::agent::scheduler::parse_time_range(&rule.time_range).is_none() {
                return Err(MurmurError::Config(format!(
                    "chat.time_rules: invalid time_range '{}' (expected HH:MM-HH:MM)",
                    rule.time_range
                )));
            }
            if !(0.0..=1.0).contains(&rule.talk_value) {
                return Err(MurmurError::Config(format!(
                    "chat.time_rules: talk_value {} out of [0,1]",
                    rule.talk_value
                )));
            }
        }
        match self.memory.vector.metric.as_str() {
            "COSINE" | "IP" | "L2" => {}
            other => {
                return Err(MurmurError::Config(format!(
                    "memory.vector.metric must be COSINE, IP or L2, got '{}'",
                    other
                )));
            }
        }
        if self.server.port == 0 {
            return Err(MurmurError::Config("server.port must be > 0".into()));
        }
        Ok(())
    }
}

/// Load the config file and apply environment overrides for secrets.
///
/// Recognized overrides: `MURMUR_LLM_API_KEY`, `MURMUR_EMBEDDING_API_KEY`
/// (falls back to the LLM key when unset), `MURMUR_VISION_API_KEY`,
/// `MURMUR_ONEBOT_TOKEN`.
pub fn load(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let mut cfg: Config = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;

    apply_env_overrides(&mut cfg);

    cfg.validate().context("configuration validation failed")?;
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(key) = std::env::var("MURMUR_LLM_API_KEY") {
        if !key.is_empty() {
            cfg.llm.api_key = key;
        }
    }
    if let Ok(key) = std::env::var("MURMUR_EMBEDDING_API_KEY") {
        if !key.is_empty() {
            cfg.embedding.api_key = key;
        }
    } else if cfg.embedding.api_key.is_empty() && !cfg.llm.api_key.is_empty() {
        cfg.embedding.api_key = cfg.llm.api_key.clone();
    }
    if let Ok(key) = std::env::var("MURMUR_VISION_API_KEY") {
        if !key.is_empty() {
            cfg.vision_llm.api_key = key;
        }
    } else if cfg.vision_llm.api_key.is_empty() && !cfg.llm.api_key.is_empty() {
        cfg.vision_llm.api_key = cfg.llm.api_key.clone();
    }
    if let Ok(token) = std::env::var("MURMUR_ONEBOT_TOKEN") {
        if !token.is_empty() {
            cfg.onebot.access_token = token;
        }
    }
}

#[cfg(test)]
mod tests;
