use std::sync::Mutex;

use rusqlite::Connection;
use tracing::warn;

use crate::embedder::cosine_distance;
use crate::error::MemoryError;

pub const EPISODE_TABLE_DDL: &str = "
CREATE TABLE IF NOT EXISTS episodes (
    id          TEXT PRIMARY KEY,
    collection  TEXT NOT NULL,
    snapshot    TEXT NOT NULL,
    embedding   TEXT NOT NULL,
    metadata    TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_episodes_collection ON episodes(collection);
";

/// One stored episode. Rows are append-only: written once by post-hoc
/// logging, never updated, retrieved by vector similarity only.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRow {
    pub id: String,
    pub collection: String,
    pub snapshot: String,
    pub embedding: Vec<f32>,
    pub metadata_json: String,
    pub created_at: String,
}

/// A row paired with the store's native distance to the query vector.
#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub row: EpisodeRow,
    pub distance: f32,
}

/// Capability interface for the episode store.
pub trait MemoryStore: Send + Sync {
    /// Append one episode. Must succeed on an empty store.
    fn add(&self, row: &EpisodeRow) -> Result<(), MemoryError>;

    /// Up to `k` rows in a collection, ordered by ascending distance to the
    /// query vector. An empty collection yields an empty vec, not an error.
    fn query(&self, collection: &str, embedding: &[f32], k: usize)
        -> Result<Vec<ScoredRow>, MemoryError>;

    fn count(&self, collection: &str) -> Result<u64, MemoryError>;
}

/// SQLite-backed episode store.
///
/// `rusqlite::Connection` is not `Sync`, so all access goes through a
/// `Mutex`; this also serializes concurrent writers from parallel pipeline
/// runs. Queries are a brute-force cosine scan over the collection, which
/// is fine at episode-log scale.
pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
}

impl SqliteMemoryStore {
    pub fn open(path: &str) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(EPISODE_TABLE_DDL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(EPISODE_TABLE_DDL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, MemoryError> {
        self.conn
            .lock()
            .map_err(|e| MemoryError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }
}

impl MemoryStore for SqliteMemoryStore {
    fn add(&self, row: &EpisodeRow) -> Result<(), MemoryError> {
        let embedding_json = serde_json::to_string(&row.embedding)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO episodes (id, collection, snapshot, embedding, metadata, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                row.id,
                row.collection,
                row.snapshot,
                embedding_json,
                row.metadata_json,
                row.created_at,
            ],
        )?;
        Ok(())
    }

    fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRow>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, collection, snapshot, embedding, metadata, created_at \
             FROM episodes WHERE collection = ?1",
        )?;

        let rows = stmt.query_map(rusqlite::params![collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut scored = Vec::new();
        for raw in rows {
            let (id, collection, snapshot, embedding_json, metadata_json, created_at) = raw?;
            // A row with an unreadable vector is skipped, not fatal.
            let stored: Vec<f32> = match serde_json::from_str(&embedding_json) {
                Ok(v) => v,
                Err(e) => {
                    warn!(id = %id, error = %e, "Skipping episode with malformed embedding");
                    continue;
                }
            };
            let distance = cosine_distance(embedding, &stored);
            scored.push(ScoredRow {
                row: EpisodeRow {
                    id,
                    collection,
                    snapshot,
                    embedding: stored,
                    metadata_json,
                    created_at,
                },
                distance,
            });
        }

        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }

    fn count(&self, collection: &str) -> Result<u64, MemoryError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM episodes WHERE collection = ?1",
            rusqlite::params![collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
