use crate::config::MessageLogCleanupConfig;
use crate::memory::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Mood decay runs on this fixed period.
const MOOD_DECAY_PERIOD_SECS: u64 = 60;

/// Background process pulling the mood vector toward its neutral attractor
/// once a minute, independent of chat activity.
pub struct MoodTicker {
    store: Arc<MemoryStore>,
    shutdown: watch::Receiver<bool>,
}

impl MoodTicker {
    pub fn new(store: Arc<MemoryStore>, shutdown: watch::Receiver<bool>) -> Self {
        Self { store, shutdown }
    }

    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(MOOD_DECAY_PERIOD_SECS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            let mut shutdown = self.shutdown;
            info!("mood decay started (every {}s)", MOOD_DECAY_PERIOD_SECS);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.store.apply_mood_decay() {
                            warn!("mood decay failed: {}", e);
                        }
                    }
                    _ = shutdown.changed() => {
                        debug!("mood decay stopped");
                        return;
                    }
                }
            }
        })
    }
}

/// Background process trimming the per-group message log to the most
/// recent rows.
pub struct LogJanitor {
    store: Arc<MemoryStore>,
    cfg: MessageLogCleanupConfig,
    shutdown: watch::Receiver<bool>,
}

impl LogJanitor {
    pub fn new(
        store: Arc<MemoryStore>,
        cfg: MessageLogCleanupConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            cfg,
            shutdown,
        }
    }

    pub fn start(self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.cfg.enabled {
            return None;
        }
        let period = Duration::from_secs(self.cfg.interval_hours.max(1) * 3600);
        let keep = self.cfg.keep_latest;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            let mut shutdown = self.shutdown;
            info!(
                "log janitor started (every {}h, keep {} rows per group)",
                self.cfg.interval_hours, keep
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.store.trim_message_logs(keep) {
                            Ok(0) => debug!("log janitor pass: nothing to trim"),
                            Ok(n) => info!("log janitor trimmed {} rows", n),
                            Err(e) => warn!("log janitor pass failed: {}", e),
                        }
                    }
                    _ = shutdown.changed() => {
                        debug!("log janitor stopped");
                        return;
                    }
                }
            }
        }))
    }
}
