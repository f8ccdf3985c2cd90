use super::Agent;
use crate::config::ChatConfig;
use chrono::{Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Parse "HH:MM-HH:MM" into minutes-of-day endpoints. Ranges may wrap
/// midnight; `start == end` is an empty range.
pub fn parse_time_range(range: &str) -> Option<(u32, u32)> {
    let (start, end) = range.split_once('-')?;
    Some((parse_hhmm(start)?, parse_hhmm(end)?))
}

fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Half-open containment `[start, end)`, wrapping midnight when
/// `start > end`.
pub fn range_contains(start: u32, end: u32, now: u32) -> bool {
    if start <= end {
        now >= start && now < end
    } else {
        now >= start || now < end
    }
}

/// The effective speak probability for a group at `now_minutes` of the day:
/// the base `talk_frequency`, overridden by the first matching time rule
/// (rule group 0 is global), evaluated in config order.
pub fn effective_speak_probability(chat: &ChatConfig, group_id: i64, now_minutes: u32) -> f64 {
    if !chat.enable_time_rules || chat.time_rules.is_empty() {
        return chat.talk_frequency;
    }
    for rule in &chat.time_rules {
        if rule.group_id != 0 && rule.group_id != group_id {
            continue;
        }
        let Some((start, end)) = parse_time_range(&rule.time_range) else {
            continue;
        };
        if range_contains(start, end, now_minutes) {
            return rule.talk_value;
        }
    }
    chat.talk_frequency
}

impl Agent {
    /// Level-triggered think dispatch: one ticker over all enabled groups.
    pub async fn run_scheduler(self: Arc<Self>) {
        let period = Duration::from_secs(self.cfg.agent.think_interval.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of `interval` fires immediately; swallow it so the
        // first pass happens one full period after startup.
        ticker.tick().await;

        let mut shutdown = self.shutdown_rx();
        info!("scheduler started (tick every {:?})", period);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.think_cycle(),
                _ = shutdown.changed() => {
                    info!("scheduler stopped");
                    return;
                }
            }
        }
    }

    /// One pass over the enabled groups, applying the gate chain; groups
    /// that pass get a think episode spawned (the per-group lock still
    /// arbitrates against the mention fast path).
    fn think_cycle(self: &Arc<Self>) {
        let now_minutes = minutes_of_day();
        for gc in self.cfg.enabled_groups() {
            let state = self.group_state(gc.group_id);

            let Some(last) = state.buffer.last() else {
                continue;
            };
            // Already handled by a previous episode
            if let Some(watermark) = state.last_processed_at() {
                if last.time < watermark {
                    continue;
                }
            }
            // Our own message never triggers a reaction to itself
            if last.user_id == self.bot_self_id()
                || last.source == crate::onebot::MessageSource::OutboundSelf
            {
                continue;
            }
            // Mentions were already dispatched on the edge path
            if last.mention_self || self.persona.is_mentioned(&last.content) {
                continue;
            }
            // The conversation went idle
            let idle = Utc::now().signed_duration_since(last.time);
            if idle.num_seconds() > self.cfg.agent.observe_window as i64 {
                continue;
            }

            let probability = effective_speak_probability(&self.cfg.chat, gc.group_id, now_minutes);
            if !self.can_speak(gc.group_id) {
                continue;
            }
            if fastrand::f64() > probability {
                debug!("probability gate held group {} quiet", gc.group_id);
                continue;
            }

            let agent = self.clone();
            let group_id = gc.group_id;
            tokio::spawn(async move {
                agent.think(group_id, false).await;
            });
        }
    }

    /// Cooldown gate: true when we have not spoken in this group within
    /// `speak_cooldown` seconds.
    pub fn can_speak(&self, group_id: i64) -> bool {
        let state = self.group_state(group_id);
        match state.last_speak_at() {
            None => true,
            Some(t) => {
                Utc::now().signed_duration_since(t).num_seconds()
                    >= self.cfg.agent.speak_cooldown as i64
            }
        }
    }
}

fn minutes_of_day() -> u32 {
    let now = chrono::Local::now();
    now.hour() * 60 + now.minute()
}
