use crate::services::oracle::{Embedding, EmbeddingOracle, OracleResult};

pub const DEFAULT_DIMENSIONS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const BIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic, model-free oracle: a feature-hashed bag of token unigrams
/// and bigrams, L2-normalized, compared by cosine similarity.
///
/// Useful as a baseline and whenever no trained model is available. Equal
/// token sequences always produce equal embeddings and a similarity of 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingOracle {
    dimensions: usize,
}

impl Default for HashingOracle {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashingOracle {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_one(&self, tokens: &[String]) -> Embedding {
        let mut values = vec![0.0f32; self.dimensions];
        for token in tokens {
            values[self.bucket(&[token.as_bytes()])] += 1.0;
        }
        for pair in tokens.windows(2) {
            values[self.bucket(&[pair[0].as_bytes(), b"\x1f", pair[1].as_bytes()])] +=
                BIGRAM_WEIGHT;
        }
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            values.iter_mut().for_each(|v| *v /= norm);
        }
        Embedding::new(values)
    }

    fn bucket(&self, parts: &[&[u8]]) -> usize {
        (fnv1a(parts) % self.dimensions as u64) as usize
    }
}

fn fnv1a(parts: &[&[u8]]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in parts.iter().flat_map(|p| p.iter()) {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a == b && a.iter().any(|v| *v != 0.0) {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

impl EmbeddingOracle for HashingOracle {
    fn embed(&self, batch: &[Vec<String>]) -> OracleResult<Vec<Embedding>> {
        Ok(batch.iter().map(|tokens| self.embed_one(tokens)).collect())
    }

    fn compare(&self, a: &[Embedding], b: &[Embedding]) -> OracleResult<Vec<f32>> {
        Ok(a.iter().zip(b).map(|(x, y)| cosine(x.as_slice(), y.as_slice())).collect())
    }

    fn name(&self) -> &'static str {
        "hashing"
    }
}
