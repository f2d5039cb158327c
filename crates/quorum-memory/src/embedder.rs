use async_trait::async_trait;

use crate::error::MemoryError;

/// Capability interface for turning snapshot text into a fixed-length
/// vector. Treated as a black box by the rest of the subsystem.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;
}

/// Deterministic local embedder: hashed bag of word unigrams and bigrams,
/// L2-normalized. Not a semantic model, but stable across runs and good
/// enough for lexical similarity between situation snapshots, which keeps
/// the binary and the tests free of any external embedding service.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        for token in &tokens {
            bump(&mut vector, fnv1a(token.as_bytes()));
        }
        for pair in tokens.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            bump(&mut vector, fnv1a(joined.as_bytes()));
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

fn bump(vector: &mut [f32], hash: u64) {
    let bucket = (hash % vector.len() as u64) as usize;
    // Second hash bit decides the sign, so unrelated tokens can cancel
    // rather than all piling up positive.
    let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
    vector[bucket] += sign;
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Cosine distance in [0, 2]: `1 - cos(a, b)`. A zero vector is treated as
/// maximally distant from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}
