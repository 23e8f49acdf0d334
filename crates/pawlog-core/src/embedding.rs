//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, the batch checks every caller goes through
//! ([`embed_batch`], [`embed_query`], [`ensure_dimension`]), a
//! deterministic [`HashingProvider`] for offline use, and pure helpers
//! for vector serialization and similarity computation.
//!
//! Network-backed providers (OpenAI, Ollama, fastembed) live in the
//! `pawlog` app crate.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Trait for embedding providers.
///
/// One instance always returns vectors of [`dims`](Self::dims) floats,
/// one per input text, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a batch and verify the response shape.
///
/// A response with the wrong number of vectors, or a vector of the wrong
/// width, is a provider error; vectors are never truncated or padded.
pub async fn embed_batch(provider: &dyn EmbeddingProvider, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = provider.embed(texts).await?;
    if vectors.len() != texts.len() {
        return Err(Error::provider(format!(
            "{} returned {} vectors for {} texts",
            provider.model_name(),
            vectors.len(),
            texts.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != provider.dims()) {
        return Err(Error::provider(format!(
            "{} returned a {}-dimensional vector, expected {}",
            provider.model_name(),
            bad.len(),
            provider.dims()
        )));
    }
    Ok(vectors)
}

/// Embed a single query text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let mut vectors = embed_batch(provider, &[text.to_string()]).await?;
    vectors
        .pop()
        .ok_or_else(|| Error::provider("empty embedding response"))
}

/// Check a provider against the index's declared vector width.
///
/// `declared` is `None` for an index that has not fixed its width yet.
pub fn ensure_dimension(provider: &dyn EmbeddingProvider, declared: Option<usize>) -> Result<()> {
    if provider.dims() == 0 {
        return Err(Error::configuration(format!(
            "embedding provider '{}' has no dimension",
            provider.model_name()
        )));
    }
    match declared {
        Some(width) if width != provider.dims() => Err(Error::configuration(format!(
            "embedding provider '{}' produces {}-dimensional vectors but the index is declared with {}",
            provider.model_name(),
            provider.dims(),
            width
        ))),
        _ => Ok(()),
    }
}

/// Deterministic feature-hashing embedder.
///
/// Each lowercased alphanumeric token is hashed with SHA-256 into one of
/// `dims` buckets with a ±1 sign, and the result is L2-normalized. Texts
/// sharing vocabulary land close together; no network or model download
/// is involved.
pub struct HashingProvider {
    dims: usize,
}

impl HashingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        if self.dims == 0 {
            return v;
        }
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        "hashing"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use pawlog_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `1 − similarity` is the cosine
/// distance. Returns `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
