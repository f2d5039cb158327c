pub mod embedder;
pub mod error;
pub mod recall;
pub mod snapshot;
pub mod store;

pub use embedder::{cosine_distance, Embedder, HashingEmbedder};
pub use error::MemoryError;
pub use recall::{EpisodeMemory, EpisodeOutcome, RecalledEpisode};
pub use snapshot::{build_snapshot, truncate_chars};
pub use store::{EpisodeRow, MemoryStore, ScoredRow, SqliteMemoryStore};
