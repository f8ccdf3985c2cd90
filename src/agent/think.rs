use super::Agent;
use crate::persona::PromptContext;
use crate::providers::base::{ChatRequest, Message};
use crate::tools::base::{SpeakCallback, ToolContext};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Wall-clock bound for one reasoning episode.
const THINK_TIMEOUT_SECS: u64 = 60;

impl Agent {
    /// Run one reasoning episode for `group_id`.
    ///
    /// Serialization: contenders try the per-group thinking lock and abort
    /// silently when it is held. The watermark advances exactly once per
    /// episode, before the prompt is assembled.
    pub async fn think(self: &Arc<Self>, group_id: i64, is_mention: bool) {
        let state = self.group_state(group_id);
        let Ok(_thinking) = state.thinking.try_lock() else {
            return;
        };

        let last_processed = {
            let mut guard = state
                .last_processed
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let previous = *guard;
            *guard = Some(Utc::now());
            previous
        };

        let snapshot = state.buffer.snapshot();
        if snapshot.is_empty() {
            return;
        }

        let chat_context = self.render_transcript(&snapshot, last_processed).await;
        if chat_context.is_empty() {
            return;
        }

        let prompt_ctx = self.build_prompt_context(group_id, &chat_context).await;
        let member_info = self.last_speaker_info(&snapshot);

        let system_prompt = self.persona.system_prompt();
        let think_prompt = self.persona.think_prompt(
            &prompt_ctx,
            &chat_context,
            &member_info,
            last_processed,
            is_mention,
        );

        if self.cfg.debug.show_prompt {
            debug!("system prompt:\n{}", system_prompt);
        }
        if self.cfg.debug.show_thinking {
            debug!("think prompt:\n{}", think_prompt);
        }

        let ctx = self.episode_context(group_id);

        let episode = self.reasoning_loop(&ctx, system_prompt, think_prompt);
        match tokio::time::timeout(
            std::time::Duration::from_secs(THINK_TIMEOUT_SECS),
            episode,
        )
        .await
        {
            Err(_) => warn!(
                "think episode timed out after {}s in group {}",
                THINK_TIMEOUT_SECS, group_id
            ),
            Ok(Err(e)) => error!("think episode failed in group {}: {}", group_id, e),
            Ok(Ok(())) => {
                if ctx.is_stopped() {
                    debug!("think episode stopped by stayQuiet in group {}", group_id);
                }
            }
        }
    }

    /// The bounded tool-calling loop: up to `max_step` LLM calls, tool calls
    /// dispatched sequentially, cancellation observed before every LLM step
    /// and before every dispatch. Final text content is intentionally
    /// discarded — the only observable outputs are tool side effects.
    async fn reasoning_loop(
        self: &Arc<Self>,
        ctx: &ToolContext,
        system_prompt: String,
        think_prompt: String,
    ) -> Result<()> {
        let mut messages = vec![Message::system(system_prompt), Message::user(think_prompt)];
        let tool_defs = self.tools.definitions();
        let max_step = self.cfg.agent.max_step.max(1);

        for _step in 0..max_step {
            if ctx.is_stopped() || self.is_shutting_down() {
                return Ok(());
            }

            let response = self
                .provider
                .chat_with_retry(
                    ChatRequest {
                        messages: messages.clone(),
                        tools: Some(tool_defs.clone()),
                        model: None,
                    },
                    None,
                )
                .await?;

            if !response.has_tool_calls() {
                return Ok(());
            }

            messages.push(Message::assistant(
                response.content.clone().unwrap_or_default(),
                Some(response.tool_calls.clone()),
            ));

            for call in &response.tool_calls {
                if ctx.is_stopped() {
                    return Ok(());
                }
                let result = self
                    .tools
                    .dispatch(&call.name, call.arguments.clone(), ctx)
                    .await;
                messages.push(Message::tool_result(call.id.clone(), result.to_string()));
            }
        }

        Ok(())
    }

    /// Fresh per-episode tool context, wired to this agent's speak path.
    pub(crate) fn episode_context(self: &Arc<Self>, group_id: i64) -> ToolContext {
        let agent = self.clone();
        let speak: SpeakCallback = Arc::new(move |gid, content, reply_to, mentions| {
            let agent = agent.clone();
            Box::pin(async move { agent.do_speak(gid, content, reply_to, mentions).await })
        });

        ToolContext::new(
            group_id,
            self.store.clone(),
            Some(self.bot.clone()),
            Some(speak),
            std::path::PathBuf::from(&self.cfg.sticker.storage_path),
            self.cfg.debug.show_tool_calls,
        )
    }

    /// Assemble the dynamic knowledge blocks for the think prompt.
    async fn build_prompt_context(self: &Arc<Self>, group_id: i64, chat_context: &str) -> PromptContext {
        let mut ctx = PromptContext {
            group_id,
            ..PromptContext::default()
        };

        if let Ok(expressions) = self.store.get_expressions(group_id, 5) {
            ctx.expressions = expressions
                .iter()
                .map(|e| format!("- {}时: {}", e.situation, e.style))
                .collect::<Vec<_>>()
                .join("\n");
        }

        if let Ok(jargons) = self.store.get_jargons(group_id, 10) {
            ctx.jargons = jargons
                .iter()
                .filter(|j| !j.meaning.is_empty())
                .map(|j| format!("- {}: {}", j.content, j.meaning))
                .collect::<Vec<_>>()
                .join("\n");
        }

        let top_k = self.store.long_term().top_k.max(1);
        let importance_threshold = self.store.long_term().importance_threshold;
        match self.store.query_memory(chat_context, group_id, None, top_k).await {
            Ok(memories) => {
                let lines: Vec<String> = memories
                    .iter()
                    .filter(|m| m.importance >= importance_threshold)
                    .map(|m| format!("- [{}] {}", m.mem_type.as_str(), m.content))
                    .collect();
                if !lines.is_empty() {
                    if self.cfg.debug.show_memory {
                        debug!("retrieved {} relevant memories", lines.len());
                    }
                    ctx.memories = lines.join("\n");
                }
            }
            Err(e) => debug!("memory retrieval failed: {}", e),
        }

        match self.store.get_mood_state() {
            Ok(mood) => ctx.mood = Some(mood),
            Err(e) => debug!("mood read failed: {}", e),
        }

        if let Some(gc) = self.cfg.group(group_id) {
            ctx.extra_prompt = gc.extra_prompt.clone();
        }

        ctx
    }

    /// One-line dossier for whoever spoke last (never for ourselves).
    fn last_speaker_info(&self, snapshot: &[Arc<crate::onebot::GroupMessage>]) -> String {
        let Some(last) = snapshot.last() else {
            return String::new();
        };
        if last.user_id == self.bot_self_id() {
            return String::new();
        }
        let Ok(Some(profile)) = self.store.get_member_profile(last.user_id) else {
            return String::new();
        };

        let mut parts = vec![format!("昵称: {}", profile.nickname)];
        if !profile.speak_style.is_empty() {
            parts.push(format!("说话风格: {}", profile.speak_style));
        }
        let interests = profile.interests_vec();
        if !interests.is_empty() {
            parts.push(format!("兴趣: {}", interests.join("、")));
        }
        parts.join(", ")
    }
}
