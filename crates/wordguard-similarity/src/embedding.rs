//! Embedding provider port and the offline feature-hashing embedder

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use wordguard_core::{Error, Result};

/// Default dimensionality of [`HashingEmbedder`] vectors
pub const DEFAULT_HASHING_DIM: usize = 256;

/// Text → fixed-length vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`; identical text and model always give identical vectors
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier stored alongside every vector this provider produces
    fn model_id(&self) -> &str;

    /// Vector length
    fn dimension(&self) -> usize;
}

/// Deterministic character n-gram embedder.
///
/// Not a neural model: unigrams, bigrams and trigrams of the normalized text
/// are hashed into signed buckets and the result is L2-normalized. Texts that
/// share many n-grams land close together, identical texts land on the same
/// vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimension`-length vectors
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::config("embedding dimension must be positive"));
        }

        Ok(Self {
            dimension,
            model_id: format!("hashing-ngram-{}", dimension),
        })
    }

    fn normalize(text: &str) -> Vec<char> {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
            .chars()
            .collect()
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());

        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let idx = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        (idx, sign)
    }

    /// Synchronous embedding, shared by the async trait method
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let chars = Self::normalize(text);
        let mut vec = vec![0.0f32; self.dimension];

        for n in 1..=3 {
            for window in chars.windows(n) {
                let feature: String = std::iter::once(char::from(b'0' + n as u8))
                    .chain(window.iter().copied())
                    .collect();
                let (idx, sign) = self.bucket(&feature);
                vec[idx] += sign;
            }
        }

        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vec {
                *x /= norm;
            }
        }

        vec
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASHING_DIM,
            model_id: format!("hashing-ngram-{}", DEFAULT_HASHING_DIM),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Serialize a vector as little-endian `f32` bytes
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Parse little-endian `f32` bytes
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::store(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
