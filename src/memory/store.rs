use super::embeddings::EmbeddingClient;
use super::models::{
    Expression, Jargon, MemberProfile, Memory, MemoryType, MessageLog, MoodState, StoreStats,
    Sticker,
};
use super::vector::{Metric, VectorIndex};
use crate::config::{LongTermConfig, MemoryConfig};
use crate::utils::clamp_f64;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Keyword fallback uses at most this many query tokens.
const MAX_KEYWORD_TOKENS: usize = 8;

/// Unified façade over the relational store and the vector index.
///
/// All records are owned here; other components never touch the connection
/// directly. Methods are cheap single-statement queries guarded by one
/// `Mutex<Connection>`; only memory save/query suspend (embedding HTTP).
pub struct MemoryStore {
    conn: Arc<Mutex<Connection>>,
    vectors: Option<VectorIndex>,
    embeddings: Option<Arc<EmbeddingClient>>,
    long_term: LongTermConfig,
}

impl MemoryStore {
    pub fn new(cfg: &MemoryConfig, embeddings: Option<Arc<EmbeddingClient>>) -> Result<Self> {
        let db_path = Path::new(&cfg.sqlite.path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database dir {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;
             PRAGMA foreign_keys=ON;",
        )?;

        ensure_schema(&conn).context("failed to initialize database schema")?;

        let conn = Arc::new(Mutex::new(conn));
        let vectors = if cfg.vector.enabled {
            let metric = Metric::parse(&cfg.vector.metric)
                .with_context(|| format!("unknown vector metric '{}'", cfg.vector.metric))?;
            Some(VectorIndex::new(conn.clone(), metric))
        } else {
            None
        };

        Ok(Self {
            conn,
            vectors,
            embeddings,
            long_term: cfg.long_term.clone(),
        })
    }

    pub fn long_term(&self) -> &LongTermConfig {
        &self.long_term
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // ==================== message log ====================

    pub fn add_message(&self, log: &MessageLog) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO message_logs
                (message_id, group_id, user_id, nickname, content, msg_type,
                 mention_self, forwards, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                log.message_id,
                log.group_id,
                log.user_id,
                log.nickname,
                log.content,
                log.msg_type,
                log.mention_self,
                log.forwards,
                log.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Recent rows for one group, oldest first.
    pub fn recent_messages(&self, group_id: i64, limit: usize, offset: usize) -> Result<Vec<MessageLog>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, message_id, group_id, user_id, nickname, content, msg_type,
                    mention_self, forwards, created_at
             FROM message_logs WHERE group_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        )?;
        let mut rows: Vec<MessageLog> = stmt
            .query_map(params![group_id, limit, offset], map_message_log)?
            .collect::<rusqlite::Result<_>>()?;
        rows.reverse();
        Ok(rows)
    }

    pub fn get_message_log(&self, message_id: &str) -> Result<Option<MessageLog>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, message_id, group_id, user_id, nickname, content, msg_type,
                        mention_self, forwards, created_at
                 FROM message_logs WHERE message_id = ?1",
                params![message_id],
                map_message_log,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_message_logs(
        &self,
        group_id: i64,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<MessageLog>, i64)> {
        let conn = self.lock();
        let (filter, total) = if group_id > 0 {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM message_logs WHERE group_id = ?1",
                params![group_id],
                |row| row.get(0),
            )?;
            (" WHERE group_id = ?3", total)
        } else {
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM message_logs", [], |row| row.get(0))?;
            ("", total)
        };
        let sql = format!(
            "SELECT id, message_id, group_id, user_id, nickname, content, msg_type,
                    mention_self, forwards, created_at
             FROM message_logs{filter}
             ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let offset = (page.max(1) - 1) * page_size;
        let rows: Vec<MessageLog> = if group_id > 0 {
            stmt.query_map(params![page_size, offset, group_id], map_message_log)?
                .collect::<rusqlite::Result<_>>()?
        } else {
            stmt.query_map(params![page_size, offset], map_message_log)?
                .collect::<rusqlite::Result<_>>()?
        };
        Ok((rows, total))
    }

    /// Janitor pass: per distinct group, keep the `keep_latest` newest rows.
    /// Returns how many rows were deleted.
    pub fn trim_message_logs(&self, keep_latest: usize) -> Result<usize> {
        let conn = self.lock();
        let groups: Vec<i64> = conn
            .prepare("SELECT DISTINCT group_id FROM message_logs")?
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        let mut deleted = 0;
        for group_id in groups {
            deleted += conn.execute(
                "DELETE FROM message_logs
                 WHERE group_id = ?1 AND id NOT IN (
                     SELECT id FROM message_logs WHERE group_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2
                 )",
                params![group_id, keep_latest],
            )?;
        }
        Ok(deleted)
    }

    // ==================== long-term memory ====================

    /// Persist one memory, then best-effort embed it into the vector index.
    /// Vector failures are logged, never fatal.
    pub async fn save_memory(&self, mem: &mut Memory) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.lock();
            conn.execute(
                "INSERT INTO memories
                    (type, group_id, user_id, content, importance, access_count,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
                params![
                    mem.mem_type.as_str(),
                    mem.group_id,
                    mem.user_id,
                    mem.content,
                    mem.importance,
                    now,
                ],
            )?;
            mem.id = conn.last_insert_rowid();
        }

        if let (Some(embeddings), Some(vectors)) = (&self.embeddings, &self.vectors) {
            match embeddings.embed(&mem.content).await {
                Ok(vector) => {
                    if let Err(e) =
                        vectors.insert(mem.id, mem.group_id, mem.mem_type.as_str(), &vector)
                    {
                        warn!("vector insert failed for memory {}: {}", mem.id, e);
                    }
                }
                Err(e) => warn!("embedding failed for memory {}: {}", mem.id, e),
            }
        }
        Ok(())
    }

    /// Hybrid retrieval. Vector-first when the index and embedding client are
    /// live; keyword fallback otherwise or when the vector path comes back
    /// empty. Vector hits are re-emitted in exact rank order.
    pub async fn query_memory(
        &self,
        query: &str,
        group_id: i64,
        mem_type: Option<MemoryType>,
        limit: usize,
    ) -> Result<Vec<Memory>> {
        if let (Some(embeddings), Some(vectors)) = (&self.embeddings, &self.vectors) {
            match embeddings.embed(query).await {
                Ok(vector) => {
                    match vectors.search(
                        &vector,
                        group_id,
                        mem_type.map(MemoryType::as_str),
                        limit,
                        self.long_term.similarity_threshold,
                    ) {
                        Ok(hits) if !hits.is_empty() => {
                            let ids: Vec<i64> = hits.iter().map(|h| h.memory_id).collect();
                            let found = self.memories_by_ids_ranked(&ids)?;
                            if !found.is_empty() {
                                self.bump_access_counts(&ids)?;
                                return Ok(found);
                            }
                        }
                        Ok(_) => {}
                        Err(e) => debug!("vector search failed, falling back: {}", e),
                    }
                }
                Err(e) => debug!("query embedding failed, falling back: {}", e),
            }
        }

        self.keyword_search(query, group_id, mem_type, limit)
    }

    /// Fetch memories by id, preserving the given rank order.
    fn memories_by_ids_ranked(&self, ids: &[i64]) -> Result<Vec<Memory>> {
        let conn = self.lock();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, type, group_id, user_id, content, importance, access_count,
                    created_at, updated_at
             FROM memories WHERE id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<Memory> = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), map_memory)?
            .collect::<rusqlite::Result<_>>()?;

        let mut by_id: std::collections::HashMap<i64, Memory> =
            rows.into_iter().map(|m| (m.id, m)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    fn bump_access_counts(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.lock();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE memories SET access_count = access_count + 1 WHERE id IN ({placeholders})"
        );
        conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        Ok(())
    }

    /// Keyword fallback: whitespace tokens OR-ed over `content LIKE`,
    /// ordered by importance then recency.
    fn keyword_search(
        &self,
        query: &str,
        group_id: i64,
        mem_type: Option<MemoryType>,
        limit: usize,
    ) -> Result<Vec<Memory>> {
        let tokens: Vec<&str> = query
            .split_whitespace()
            .filter(|t| !t.is_empty())
            .take(MAX_KEYWORD_TOKENS)
            .collect();
        if tokens.is_empty() {
            return Ok(vec![]);
        }

        let mut sql = String::from(
            "SELECT id, type, group_id, user_id, content, importance, access_count,
                    created_at, updated_at
             FROM memories WHERE 1=1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if group_id != 0 {
            sql.push_str(" AND group_id = ?");
            args.push(Box::new(group_id));
        }
        if let Some(t) = mem_type {
            sql.push_str(" AND type = ?");
            args.push(Box::new(t.as_str().to_string()));
        }
        let likes = vec!["content LIKE ?"; tokens.len()].join(" OR ");
        sql.push_str(&format!(" AND ({likes})"));
        for token in &tokens {
            args.push(Box::new(format!("%{}%", token)));
        }
        sql.push_str(" ORDER BY importance DESC, updated_at DESC LIMIT ?");
        args.push(Box::new(limit));

        let found: Vec<Memory> = {
            let conn = self.lock();
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                map_memory,
            )?
            .collect::<rusqlite::Result<_>>()?
        };

        let ids: Vec<i64> = found.iter().map(|m| m.id).collect();
        self.bump_access_counts(&ids)?;
        Ok(found)
    }

    pub fn get_memory(&self, id: i64) -> Result<Option<Memory>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, type, group_id, user_id, content, importance, access_count,
                        created_at, updated_at
                 FROM memories WHERE id = ?1",
                params![id],
                map_memory,
            )
            .optional()?;
        Ok(row)
    }

    /// Deleting a memory cascades its vector row.
    pub fn delete_memory(&self, id: i64) -> Result<bool> {
        let deleted = {
            let conn = self.lock();
            conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?
        };
        if deleted > 0 {
            if let Some(vectors) = &self.vectors {
                if let Err(e) = vectors.delete_by_memory_ids(&[id]) {
                    warn!("vector cascade failed for memory {}: {}", id, e);
                }
            }
        }
        Ok(deleted > 0)
    }

    pub fn list_memories(
        &self,
        group_id: i64,
        mem_type: Option<MemoryType>,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<Memory>, i64)> {
        let conn = self.lock();
        let mut filter = String::from(" WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if group_id > 0 {
            filter.push_str(" AND group_id = ?");
            args.push(Box::new(group_id));
        }
        if let Some(t) = mem_type {
            filter.push_str(" AND type = ?");
            args.push(Box::new(t.as_str().to_string()));
        }

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM memories{filter}"),
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT id, type, group_id, user_id, content, importance, access_count,
                    created_at, updated_at
             FROM memories{filter} ORDER BY updated_at DESC LIMIT ? OFFSET ?"
        );
        args.push(Box::new(page_size));
        args.push(Box::new((page.max(1) - 1) * page_size));
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<Memory> = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                map_memory,
            )?
            .collect::<rusqlite::Result<_>>()?;
        Ok((rows, total))
    }

    // ==================== member profiles ====================

    pub fn get_member_profile(&self, user_id: i64) -> Result<Option<MemberProfile>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, user_id, nickname, speak_style, interests, common_words,
                        activity, intimacy, last_speak, msg_count, created_at, updated_at
                 FROM member_profiles WHERE user_id = ?1",
                params![user_id],
                map_profile,
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_or_create_member_profile(
        &self,
        user_id: i64,
        nickname: &str,
    ) -> Result<MemberProfile> {
        if let Some(profile) = self.get_member_profile(user_id)? {
            return Ok(profile);
        }
        let now = Utc::now();
        {
            let conn = self.lock();
            conn.execute(
                "INSERT OR IGNORE INTO member_profiles
                    (user_id, nickname, speak_style, interests, common_words,
                     activity, intimacy, last_speak, msg_count, created_at, updated_at)
                 VALUES (?1, ?2, '', '', '', 0.5, 0.3, ?3, 0, ?3, ?3)",
                params![user_id, nickname, now.to_rfc3339()],
            )?;
        }
        self.get_member_profile(user_id)?
            .context("member profile vanished after insert")
    }

    /// Save a profile, recomputing `activity` first: idle days erode it by
    /// 0.1/day down to a 0.1 floor, speaking within the last hour earns
    /// +0.05 up to 1.0. Both float fields are clamped on every write.
    pub fn update_member_profile(&self, profile: &mut MemberProfile) -> Result<()> {
        let idle = Utc::now().signed_duration_since(profile.last_speak);
        let idle_secs = idle.num_seconds();
        if idle_secs > 0 {
            let days = idle_secs as f64 / 86_400.0;
            profile.activity = (profile.activity - 0.1 * days).max(0.1);
        }
        if idle_secs < 3600 {
            profile.activity = (profile.activity + 0.05).min(1.0);
        }
        profile.activity = clamp_f64(profile.activity, 0.0, 1.0);
        profile.intimacy = clamp_f64(profile.intimacy, 0.0, 1.0);
        profile.updated_at = Utc::now();

        let conn = self.lock();
        conn.execute(
            "UPDATE member_profiles SET
                nickname = ?2, speak_style = ?3, interests = ?4, common_words = ?5,
                activity = ?6, intimacy = ?7, last_speak = ?8, msg_count = ?9,
                updated_at = ?10
             WHERE user_id = ?1",
            params![
                profile.user_id,
                profile.nickname,
                profile.speak_style,
                profile.interests,
                profile.common_words,
                profile.activity,
                profile.intimacy,
                profile.last_speak.to_rfc3339(),
                profile.msg_count,
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_member_profiles(
        &self,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<MemberProfile>, i64)> {
        let conn = self.lock();
        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM member_profiles", [], |row| row.get(0))?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, nickname, speak_style, interests, common_words,
                    activity, intimacy, last_speak, msg_count, created_at, updated_at
             FROM member_profiles ORDER BY msg_count DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows: Vec<MemberProfile> = stmt
            .query_map(
                params![page_size, (page.max(1) - 1) * page_size],
                map_profile,
            )?
            .collect::<rusqlite::Result<_>>()?;
        Ok((rows, total))
    }

    // ==================== jargon ====================

    /// Upsert on (group_id, content). Updates overwrite meaning/context and
    /// bump the reference count; a jargon referenced more than 3 times is
    /// auto-verified.
    pub fn save_jargon(&self, group_id: i64, content: &str, meaning: &str, context: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock();
        let existing: Option<(i64, i64)> = conn
            .query_row(
                "SELECT id, count FROM jargons WHERE group_id = ?1 AND content = ?2",
                params![group_id, content],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match existing {
            Some((id, count)) => {
                let verified_bump = count >= 3;
                conn.execute(
                    "UPDATE jargons SET meaning = ?2, context = ?3, count = count + 1,
                            verified = CASE WHEN ?4 THEN 1 ELSE verified END,
                            updated_at = ?5
                     WHERE id = ?1",
                    params![id, meaning, context, verified_bump, now],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO jargons
                        (group_id, content, meaning, context, count, verified,
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 1, 0, ?5, ?5)",
                    params![group_id, content, meaning, context, now],
                )?;
            }
        }
        Ok(())
    }

    /// Verified entries rank first, then by reference count.
    pub fn get_jargons(&self, group_id: i64, limit: usize) -> Result<Vec<Jargon>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, group_id, content, meaning, context, count, verified,
                    created_at, updated_at
             FROM jargons WHERE group_id = ?1
             ORDER BY verified DESC, count DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![group_id, limit], map_jargon)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(rows)
    }

    pub fn get_unverified_jargons(&self, group_id: i64, limit: usize) -> Result<Vec<Jargon>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, group_id, content, meaning, context, count, verified,
                    created_at, updated_at
             FROM jargons WHERE group_id = ?1 AND verified = 0
             ORDER BY count DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![group_id, limit], map_jargon)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(rows)
    }

    pub fn review_jargon(&self, id: i64, approve: bool) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE jargons SET verified = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, approve, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ==================== expressions ====================

    /// Returns `true` when a new row was created. An existing row whose
    /// examples are empty gets them backfilled; otherwise an existing row
    /// only has its count bumped.
    pub fn save_expression(
        &self,
        group_id: i64,
        situation: &str,
        style: &str,
        examples: &str,
    ) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock();
        let existing: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, examples FROM expressions
                 WHERE group_id = ?1 AND situation = ?2 AND style = ?3",
                params![group_id, situation, style],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match existing {
            Some((id, old_examples)) => {
                if old_examples.is_empty() && !examples.is_empty() {
                    conn.execute(
                        "UPDATE expressions SET examples = ?2, count = count + 1, updated_at = ?3
                         WHERE id = ?1",
                        params![id, examples, now],
                    )?;
                } else {
                    conn.execute(
                        "UPDATE expressions SET count = count + 1, updated_at = ?2 WHERE id = ?1",
                        params![id, now],
                    )?;
                }
                Ok(false)
            }
            None => {
                conn.execute(
                    "INSERT INTO expressions
                        (group_id, situation, style, examples, count, checked, rejected,
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 1, 0, 0, ?5, ?5)",
                    params![group_id, situation, style, examples, now],
                )?;
                Ok(true)
            }
        }
    }

    /// Rejected rows never come back from retrieval.
    pub fn get_expressions(&self, group_id: i64, limit: usize) -> Result<Vec<Expression>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, group_id, situation, style, examples, count, checked, rejected,
                    created_at, updated_at
             FROM expressions WHERE group_id = ?1 AND rejected = 0
             ORDER BY count DESC, updated_at DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![group_id, limit], map_expression)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(rows)
    }

    pub fn get_unchecked_expressions(&self, group_id: i64, limit: usize) -> Result<Vec<Expression>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, group_id, situation, style, examples, count, checked, rejected,
                    created_at, updated_at
             FROM expressions WHERE group_id = ?1 AND checked = 0
             ORDER BY count DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![group_id, limit], map_expression)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(rows)
    }

    pub fn review_expression(&self, id: i64, approve: bool) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE expressions SET checked = 1, rejected = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, !approve, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ==================== stickers ====================

    /// Returns `true` when the hash was already present (no row created).
    /// The caller removes the freshly downloaded file on duplicates.
    pub fn save_sticker(&self, file_name: &str, file_hash: &str, description: &str) -> Result<bool> {
        let conn = self.lock();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM stickers WHERE file_hash = ?1",
                params![file_hash],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Ok(true);
        }
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO stickers (file_name, file_hash, description, use_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
            params![file_name, file_hash, description, now],
        )?;
        Ok(false)
    }

    pub fn get_sticker(&self, id: i64) -> Result<Option<Sticker>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, file_name, file_hash, description, use_count, created_at, updated_at
                 FROM stickers WHERE id = ?1",
                params![id],
                map_sticker,
            )
            .optional()?;
        Ok(row)
    }

    pub fn search_stickers(&self, keyword: &str, limit: usize) -> Result<Vec<Sticker>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, file_name, file_hash, description, use_count, created_at, updated_at
             FROM stickers WHERE description LIKE ?1
             ORDER BY use_count DESC, updated_at DESC LIMIT ?2",
        )?;
        let pattern = if keyword.is_empty() {
            "%".to_string()
        } else {
            format!("%{}%", keyword)
        };
        let rows = stmt
            .query_map(params![pattern, limit], map_sticker)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(rows)
    }

    pub fn touch_sticker(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE stickers SET use_count = use_count + 1, updated_at = ?2 WHERE id = ?1",
            params![id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn sticker_count(&self) -> Result<i64> {
        let conn = self.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM stickers", [], |row| row.get(0))?)
    }

    // ==================== mood ====================

    pub fn get_mood_state(&self) -> Result<MoodState> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT valence, energy, sociability, updated_at, last_reason
                 FROM mood_state WHERE id = 1",
                [],
                map_mood,
            )
            .optional()?;
        if let Some(mood) = row {
            return Ok(mood);
        }
        let mood = MoodState::default();
        conn.execute(
            "INSERT OR IGNORE INTO mood_state (id, valence, energy, sociability, updated_at, last_reason)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                mood.valence,
                mood.energy,
                mood.sociability,
                mood.updated_at.to_rfc3339(),
                mood.last_reason,
            ],
        )?;
        Ok(mood)
    }

    /// Read-modify-write with per-field clamping.
    pub fn update_mood_state(
        &self,
        valence_delta: f64,
        energy_delta: f64,
        sociability_delta: f64,
        reason: &str,
    ) -> Result<MoodState> {
        let mut mood = self.get_mood_state()?;
        mood.valence = clamp_f64(mood.valence + valence_delta, -1.0, 1.0);
        mood.energy = clamp_f64(mood.energy + energy_delta, 0.0, 1.0);
        mood.sociability = clamp_f64(mood.sociability + sociability_delta, 0.0, 1.0);
        mood.updated_at = Utc::now();
        mood.last_reason = reason.to_string();
        self.write_mood(&mood)?;
        Ok(mood)
    }

    /// Idempotent decay tick toward the (0, 0.5, 0.5) attractor.
    pub fn apply_mood_decay(&self) -> Result<MoodState> {
        let mut mood = self.get_mood_state()?;
        mood.valence = clamp_f64(mood.valence * 0.95, -1.0, 1.0);
        mood.energy = clamp_f64(mood.energy + (0.5 - mood.energy) * 0.05, 0.0, 1.0);
        mood.sociability = clamp_f64(mood.sociability + (0.5 - mood.sociability) * 0.05, 0.0, 1.0);
        mood.updated_at = Utc::now();
        self.write_mood(&mood)?;
        Ok(mood)
    }

    fn write_mood(&self, mood: &MoodState) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE mood_state SET valence = ?1, energy = ?2, sociability = ?3,
                    updated_at = ?4, last_reason = ?5
             WHERE id = 1",
            params![
                mood.valence,
                mood.energy,
                mood.sociability,
                mood.updated_at.to_rfc3339(),
                mood.last_reason,
            ],
        )?;
        Ok(())
    }

    // ==================== stats ====================

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock();
        let count = |table: &str| -> Result<i64> {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
        };
        Ok(StoreStats {
            memories: count("memories")?,
            members: count("member_profiles")?,
            messages: count("message_logs")?,
            expressions: count("expressions")?,
            jargons: count("jargons")?,
            stickers: count("stickers")?,
        })
    }
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            id INTEGER PRIMARY KEY,
            type TEXT NOT NULL,
            group_id INTEGER NOT NULL DEFAULT 0,
            user_id INTEGER NOT NULL DEFAULT 0,
            content TEXT NOT NULL,
            importance REAL NOT NULL DEFAULT 0.5,
            access_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memories_group_type ON memories(group_id, type);

        CREATE TABLE IF NOT EXISTS memory_vectors (
            id INTEGER PRIMARY KEY,
            memory_id INTEGER NOT NULL,
            group_id INTEGER NOT NULL,
            mem_type TEXT NOT NULL,
            embedding BLOB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memory_vectors_memory ON memory_vectors(memory_id);
        CREATE INDEX IF NOT EXISTS idx_memory_vectors_group ON memory_vectors(group_id);

        CREATE TABLE IF NOT EXISTS member_profiles (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL UNIQUE,
            nickname TEXT NOT NULL DEFAULT '',
            speak_style TEXT NOT NULL DEFAULT '',
            interests TEXT NOT NULL DEFAULT '',
            common_words TEXT NOT NULL DEFAULT '',
            activity REAL NOT NULL DEFAULT 0.5,
            intimacy REAL NOT NULL DEFAULT 0.3,
            last_speak TEXT NOT NULL,
            msg_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS expressions (
            id INTEGER PRIMARY KEY,
            group_id INTEGER NOT NULL,
            situation TEXT NOT NULL,
            style TEXT NOT NULL,
            examples TEXT NOT NULL DEFAULT '',
            count INTEGER NOT NULL DEFAULT 1,
            checked INTEGER NOT NULL DEFAULT 0,
            rejected INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (group_id, situation, style)
        );
        CREATE INDEX IF NOT EXISTS idx_expressions_group ON expressions(group_id);

        CREATE TABLE IF NOT EXISTS jargons (
            id INTEGER PRIMARY KEY,
            group_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            meaning TEXT NOT NULL DEFAULT '',
            context TEXT NOT NULL DEFAULT '',
            count INTEGER NOT NULL DEFAULT 1,
            verified INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (group_id, content)
        );

        CREATE TABLE IF NOT EXISTS stickers (
            id INTEGER PRIMARY KEY,
            file_name TEXT NOT NULL,
            file_hash TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            use_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS mood_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            valence REAL NOT NULL DEFAULT 0.0,
            energy REAL NOT NULL DEFAULT 0.5,
            sociability REAL NOT NULL DEFAULT 0.5,
            updated_at TEXT NOT NULL,
            last_reason TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS message_logs (
            id INTEGER PRIMARY KEY,
            message_id TEXT NOT NULL UNIQUE,
            group_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            nickname TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            msg_type TEXT NOT NULL DEFAULT 'group',
            mention_self INTEGER NOT NULL DEFAULT 0,
            forwards TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_message_logs_group ON message_logs(group_id);
        CREATE INDEX IF NOT EXISTS idx_message_logs_created ON message_logs(created_at);",
    )?;
    Ok(())
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

fn map_message_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageLog> {
    let created: String = row.get(9)?;
    Ok(MessageLog {
        id: row.get(0)?,
        message_id: row.get(1)?,
        group_id: row.get(2)?,
        user_id: row.get(3)?,
        nickname: row.get(4)?,
        content: row.get(5)?,
        msg_type: row.get(6)?,
        mention_self: row.get(7)?,
        forwards: row.get(8)?,
        created_at: parse_ts(&created),
    })
}

fn map_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let type_str: String = row.get(1)?;
    let created: String = row.get(7)?;
    let updated: String = row.get(8)?;
    Ok(Memory {
        id: row.get(0)?,
        mem_type: MemoryType::parse(&type_str).unwrap_or(MemoryType::Conversation),
        group_id: row.get(2)?,
        user_id: row.get(3)?,
        content: row.get(4)?,
        importance: row.get(5)?,
        access_count: row.get(6)?,
        created_at: parse_ts(&created),
        updated_at: parse_ts(&updated),
    })
}

fn map_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemberProfile> {
    let last_speak: String = row.get(8)?;
    let created: String = row.get(10)?;
    let updated: String = row.get(11)?;
    Ok(MemberProfile {
        id: row.get(0)?,
        user_id: row.get(1)?,
        nickname: row.get(2)?,
        speak_style: row.get(3)?,
        interests: row.get(4)?,
        common_words: row.get(5)?,
        activity: row.get(6)?,
        intimacy: row.get(7)?,
        last_speak: parse_ts(&last_speak),
        msg_count: row.get(9)?,
        created_at: parse_ts(&created),
        updated_at: parse_ts(&updated),
    })
}

fn map_expression(row: &rusqlite::Row<'_>) -> rusqlite::Result<Expression> {
    let created: String = row.get(8)?;
    let updated: String = row.get(9)?;
    Ok(Expression {
        id: row.get(0)?,
        group_id: row.get(1)?,
        situation: row.get(2)?,
        style: row.get(3)?,
        examples: row.get(4)?,
        count: row.get(5)?,
        checked: row.get(6)?,
        rejected: row.get(7)?,
        created_at: parse_ts(&created),
        updated_at: parse_ts(&updated),
    })
}

fn map_jargon(row: &rusqlite::Row<'_>) -> rusqlite::Result<Jargon> {
    let created: String = row.get(7)?;
    let updated: String = row.get(8)?;
    Ok(Jargon {
        id: row.get(0)?,
        group_id: row.get(1)?,
        content: row.get(2)?,
        meaning: row.get(3)?,
        context: row.get(4)?,
        count: row.get(5)?,
        verified: row.get(6)?,
        created_at: parse_ts(&created),
        updated_at: parse_ts(&updated),
    })
}

fn map_sticker(row: &rusqlite::Row<'_>) -> rusqlite::Result<Sticker> {
    let created: String = row.get(5)?;
    let updated: String = row.get(6)?;
    Ok(Sticker {
        id: row.get(0)?,
        file_name: row.get(1)?,
        file_hash: row.get(2)?,
        description: row.get(3)?,
        use_count: row.get(4)?,
        created_at: parse_ts(&created),
        updated_at: parse_ts(&updated),
    })
}

fn map_mood(row: &rusqlite::Row<'_>) -> rusqlite::Result<MoodState> {
    let updated: String = row.get(3)?;
    Ok(MoodState {
        valence: row.get(0)?,
        energy: row.get(1)?,
        sociability: row.get(2)?,
        updated_at: parse_ts(&updated),
        last_reason: row.get(4)?,
    })
}
