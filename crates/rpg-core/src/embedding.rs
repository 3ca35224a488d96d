//! The embedding client contract (§6.3): a small async trait implemented by each concrete
//! provider in `rpg-encoder`, plus cosine similarity and a deterministic hash-based client for
//! tests.

use anyhow::Result;

/// Shared contract for text-embedding providers, used by the Structural Reorganizer (domain
/// similarity), the Semantic Router (`findBestParent`), and the Evolver (drift detection).
pub trait EmbeddingClient: Send + Sync {
    /// Embeds a single piece of text.
    fn embed(&self, text: &str) -> impl std::future::Future<Output = Result<Vec<f32>>> + Send;

    /// Embeds a batch of texts in one round-trip where the provider supports it. The default
    /// implementation embeds sequentially.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>>> + Send
    where
        Self: Sized,
    {
        async move {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }
    }

    /// Dimensionality of vectors this client produces.
    fn dimension(&self) -> usize;
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty, mismatched-length, or
/// zero-magnitude vectors rather than producing `NaN` (§4.12 edge case).
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// A deterministic, offline `EmbeddingClient` for tests. Hashes each token into a fixed-size
/// vector so that identical text always embeds identically and semantically unrelated text
/// reliably embeds differently enough for cosine-similarity assertions in tests. Not suitable for
/// production use — it captures no real semantics.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        HashEmbeddingClient { dimension }
    }
}

impl Default for HashEmbeddingClient {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EmbeddingClient for HashEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0.0f32; self.dimension];
        for token in text.split_whitespace().map(str::to_lowercase) {
            let hash = fnv1a(token.as_bytes());
            #[allow(clippy::cast_possible_truncation)]
            let idx = (hash as usize) % self.dimension;
            vec[idx] += 1.0;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vec {
                *x /= norm;
            }
        }
        Ok(vec)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}
