use crate::memory::MemoryStore;
use crate::onebot::OneBotClient;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub type SpeakFuture = Pin<Box<dyn std::future::Future<Output = i64> + Send>>;

/// Callback that actually sends a message: (group_id, content, reply_to,
/// mentions) -> new message id, 0 on failure.
pub type SpeakCallback = Arc<dyn Fn(i64, String, i64, Vec<i64>) -> SpeakFuture + Send + Sync>;

/// Immutable per-episode context handed to every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub group_id: i64,
    pub store: Arc<MemoryStore>,
    /// Absent in offline tests; gateway tools report a failure then.
    pub bot: Option<Arc<OneBotClient>>,
    pub speak: Option<SpeakCallback>,
    /// Where sticker files live on disk.
    pub sticker_dir: PathBuf,
    /// Echo tool inputs/outputs at debug level.
    pub log_calls: bool,
    stop: Arc<AtomicBool>,
}

impl ToolContext {
    pub fn new(
        group_id: i64,
        store: Arc<MemoryStore>,
        bot: Option<Arc<OneBotClient>>,
        speak: Option<SpeakCallback>,
        sticker_dir: PathBuf,
        log_calls: bool,
    ) -> Self {
        Self {
            group_id,
            store,
            bot,
            speak,
            sticker_dir,
            log_calls,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the surrounding reasoning episode. Fired by `stayQuiet` before
    /// it returns, so the loop observes the flag at its next checkpoint.
    pub fn stop_thinking(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// A named, schema-typed action the LLM can invoke during reasoning.
///
/// Implementations must not panic and must not propagate store errors as
/// `Err`: anything the model should see comes back as a `success=false`
/// payload. `Err` is reserved for infrastructure faults and still gets
/// converted by the registry.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the input object.
    fn parameters(&self) -> Value;

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value>;
}

pub fn success(message: impl Into<String>) -> Value {
    json!({ "success": true, "message": message.into() })
}

pub fn failure(message: impl Into<String>) -> Value {
    json!({ "success": false, "message": message.into() })
}

/// Shorthand for `{"type":"object", ...}` input schemas.
pub fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({ "type": "object", "properties": properties, "required": required })
}
