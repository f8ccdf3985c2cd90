use super::embeddings::{cosine_similarity, deserialize_embedding, dot, l2_distance, serialize_embedding};
use anyhow::Result;
use rusqlite::{Connection, params};
use std::sync::{Arc, Mutex};

/// Similarity metric for the embedded vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
    Ip,
    L2,
}

impl Metric {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COSINE" => Some(Self::Cosine),
            "IP" => Some(Self::Ip),
            "L2" => Some(Self::L2),
            _ => None,
        }
    }

    /// Higher is always better. L2 distances are negated so a single
    /// threshold semantics ("score must be at least X") holds for every
    /// metric.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::Ip => dot(a, b),
            Self::L2 => -l2_distance(a, b),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub memory_id: i64,
    pub score: f32,
}

/// Embedded vector index over the shared SQLite connection: one row per
/// memory embedding, brute-force scanned at query time. Row volume is
/// bounded by the memory table, which stays small enough that a linear
/// scan beats maintaining an ANN structure.
pub struct VectorIndex {
    conn: Arc<Mutex<Connection>>,
    metric: Metric,
}

impl VectorIndex {
    pub fn new(conn: Arc<Mutex<Connection>>, metric: Metric) -> Self {
        Self { conn, metric }
    }

    pub fn insert(
        &self,
        memory_id: i64,
        group_id: i64,
        mem_type: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO memory_vectors (memory_id, group_id, mem_type, embedding)
             VALUES (?1, ?2, ?3, ?4)",
            params![memory_id, group_id, mem_type, serialize_embedding(embedding)],
        )?;
        Ok(())
    }

    /// Filtered scan: `group_id == 0` drops the group filter, `None` drops
    /// the type filter. Hits below `threshold` are discarded; the survivors
    /// come back ordered best-first, at most `top_k`.
    pub fn search(
        &self,
        query: &[f32],
        group_id: i64,
        mem_type: Option<&str>,
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<VectorHit>> {
        let conn = self.lock();
        let mut sql = String::from("SELECT memory_id, embedding FROM memory_vectors WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if group_id != 0 {
            sql.push_str(" AND group_id = ?");
            args.push(Box::new(group_id));
        }
        if let Some(t) = mem_type {
            sql.push_str(" AND mem_type = ?");
            args.push(Box::new(t.to_string()));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())), |row| {
            let memory_id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((memory_id, blob))
        })?;

        let mut hits: Vec<VectorHit> = Vec::new();
        for row in rows {
            let (memory_id, blob) = row?;
            let embedding = deserialize_embedding(&blob);
            let score = self.metric.score(query, &embedding);
            if f64::from(score) >= threshold {
                hits.push(VectorHit { memory_id, score });
            }
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    pub fn delete_by_memory_ids(&self, memory_ids: &[i64]) -> Result<()> {
        if memory_ids.is_empty() {
            return Ok(());
        }
        let conn = self.lock();
        let placeholders = vec!["?"; memory_ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM memory_vectors WHERE memory_id IN ({})",
            placeholders
        );
        conn.execute(&sql, rusqlite::params_from_iter(memory_ids.iter()))?;
        Ok(())
    }

    pub fn delete_by_group(&self, group_id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM memory_vectors WHERE group_id = ?1",
            params![group_id],
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
