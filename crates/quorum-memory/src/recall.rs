use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use quorum_models::{AgentState, MemoryConfig};

use crate::embedder::Embedder;
use crate::error::MemoryError;
use crate::snapshot::{build_snapshot, truncate_chars};
use crate::store::{EpisodeRow, MemoryStore};

/// Post-hoc result descriptor logged alongside a decision situation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeOutcome {
    /// Free-form result, e.g. "+5.2% over 3 sessions".
    pub outcome: String,
    /// What to do differently next time.
    pub lesson: String,
}

/// Metadata blob stored with each episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EpisodeMetadata {
    investment_plan: String,
    outcome: String,
    lesson: String,
}

/// A past episode matched against the current situation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalledEpisode {
    pub matched_situation: String,
    pub investment_plan: String,
    pub outcome: String,
    pub lesson: String,
    /// `1 - distance` under the store's metric. Bounded in [0, 1] only to
    /// the extent the metric is; with the default cosine metric over
    /// normalized vectors it lies in [-1, 1] and is ~1 for near matches.
    pub similarity: f32,
}

/// Episode memory: snapshot projection + embedding + similarity retrieval
/// over the append-only store. Embeddings for identical snapshot text are
/// served from a moka cache.
pub struct EpisodeMemory {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    collection: String,
    excerpt_len: usize,
    embedding_cache: Cache<String, Vec<f32>>,
}

impl EpisodeMemory {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        config: &MemoryConfig,
        excerpt_len: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            collection: config.collection.clone(),
            excerpt_len,
            embedding_cache: Cache::builder()
                .max_capacity(config.embedding_cache_capacity)
                .time_to_live(Duration::from_secs(config.embedding_cache_ttl_seconds))
                .build(),
        }
    }

    async fn embed_snapshot(&self, snapshot: &str) -> Result<Vec<f32>, MemoryError> {
        if let Some(cached) = self.embedding_cache.get(snapshot).await {
            return Ok(cached);
        }
        let vector = self.embedder.embed(snapshot).await?;
        self.embedding_cache
            .insert(snapshot.to_string(), vector.clone())
            .await;
        Ok(vector)
    }

    /// Append one episode: the situation at decision time plus its eventual
    /// outcome. Returns the stored episode id.
    pub async fn add_episode(
        &self,
        state: &AgentState,
        outcome: &EpisodeOutcome,
    ) -> Result<String, MemoryError> {
        let snapshot = build_snapshot(state, self.excerpt_len);
        let embedding = self.embed_snapshot(&snapshot).await?;

        let metadata = EpisodeMetadata {
            investment_plan: truncate_chars(state.investment_plan_or_default(), 400).to_string(),
            outcome: outcome.outcome.clone(),
            lesson: outcome.lesson.clone(),
        };

        let row = EpisodeRow {
            id: Uuid::new_v4().to_string(),
            collection: self.collection.clone(),
            snapshot,
            embedding,
            metadata_json: serde_json::to_string(&metadata)?,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store.add(&row)?;
        debug!(id = %row.id, collection = %self.collection, "Stored trade episode");
        Ok(row.id)
    }

    /// The `k` most similar past episodes, best first.
    ///
    /// Degraded rather than fatal: store failures and rows with unreadable
    /// metadata yield fewer (possibly zero) results, never an error, so a
    /// broken memory store cannot take the pipeline down.
    pub async fn recall(&self, state: &AgentState, k: usize) -> Vec<RecalledEpisode> {
        if k == 0 {
            return Vec::new();
        }

        let snapshot = build_snapshot(state, self.excerpt_len);
        let embedding = match self.embed_snapshot(&snapshot).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Embedding failed; recalling nothing");
                return Vec::new();
            }
        };

        let hits = match self.store.query(&self.collection, &embedding, k) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Memory store query failed; recalling nothing");
                return Vec::new();
            }
        };

        hits.into_iter()
            .filter_map(|hit| {
                let metadata: EpisodeMetadata = match serde_json::from_str(&hit.row.metadata_json)
                {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(id = %hit.row.id, error = %e, "Skipping episode with malformed metadata");
                        return None;
                    }
                };
                Some(RecalledEpisode {
                    matched_situation: hit.row.snapshot,
                    investment_plan: metadata.investment_plan,
                    outcome: metadata.outcome,
                    lesson: metadata.lesson,
                    similarity: 1.0 - hit.distance,
                })
            })
            .collect()
    }
}
