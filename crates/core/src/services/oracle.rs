use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OracleConfig;

/// Opaque embedding vector produced by an oracle.
///
/// The search engine never looks inside; it only hands embeddings back to the
/// oracle that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    /// Worth retrying: resource exhaustion, timeouts, temporary failures.
    #[error("Transient oracle failure: {0}")]
    Transient(String),
    #[error("Oracle error: {0}")]
    Backend(String),
    #[error("Oracle returned {found} results for a batch of {expected}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("Oracle returned invalid similarity {score} at position {index}")]
    InvalidScore { index: usize, score: f32 },
    #[error("Oracle not found: {name} (available: {available})")]
    Unknown { name: String, available: String },
}

impl OracleError {
    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::Transient(_))
    }
}

pub type OracleResult<T> = Result<T, OracleError>;

/// Trait implemented by embedding oracles (built-in or backed by a model process).
pub trait EmbeddingOracle: Send + Sync {
    /// Convert each token sequence into one embedding, same length and order.
    fn embed(&self, batch: &[Vec<String>]) -> OracleResult<Vec<Embedding>>;

    /// Elementwise similarity in `[0, 1]` for two equally long batches.
    fn compare(&self, a: &[Embedding], b: &[Embedding]) -> OracleResult<Vec<f32>>;

    fn name(&self) -> &'static str;
}

/// `embed`, with the response length checked against the request.
pub fn embed_checked(
    oracle: &dyn EmbeddingOracle,
    batch: &[Vec<String>],
) -> OracleResult<Vec<Embedding>> {
    let embeddings = oracle.embed(batch)?;
    if embeddings.len() != batch.len() {
        return Err(OracleError::LengthMismatch { expected: batch.len(), found: embeddings.len() });
    }
    Ok(embeddings)
}

/// `compare`, with the response length and score range checked.
pub fn compare_checked(
    oracle: &dyn EmbeddingOracle,
    a: &[Embedding],
    b: &[Embedding],
) -> OracleResult<Vec<f32>> {
    if a.len() != b.len() {
        return Err(OracleError::LengthMismatch { expected: b.len(), found: a.len() });
    }
    let scores = oracle.compare(a, b)?;
    if scores.len() != b.len() {
        return Err(OracleError::LengthMismatch { expected: b.len(), found: scores.len() });
    }
    if let Some((index, &score)) =
        scores.iter().enumerate().find(|(_, s)| !(0.0..=1.0).contains(*s))
    {
        return Err(OracleError::InvalidScore { index, score });
    }
    Ok(scores)
}

/// Registry for embedding oracles; callers select by name.
#[derive(Default)]
pub struct OracleRegistry {
    oracles: HashMap<String, Box<dyn EmbeddingOracle>>,
}

impl OracleRegistry {
    pub fn new() -> Self {
        Self { oracles: HashMap::new() }
    }

    pub fn register<O: EmbeddingOracle + 'static>(&mut self, oracle: O) -> &mut Self {
        self.oracles.insert(oracle.name().to_string(), Box::new(oracle));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn EmbeddingOracle> {
        self.oracles.get(name).map(|o| &**o)
    }

    /// Like `get`, but reports the registered names when `name` is missing.
    pub fn require(&self, name: &str) -> OracleResult<&dyn EmbeddingOracle> {
        self.get(name).ok_or_else(|| OracleError::Unknown {
            name: name.to_string(),
            available: self.names().join(", "),
        })
    }

    /// Return a sorted list of registered oracle names for error messages/help.
    pub fn names(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.oracles.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Registry populated from config: the hashing oracle always, the command
/// oracle when a command line is configured.
pub fn default_oracle_registry(config: &OracleConfig) -> OracleRegistry {
    let mut registry = OracleRegistry::new();
    registry.register(crate::services::oracles::HashingOracle::new(config.dimensions));
    if !config.command.is_empty() {
        registry.register(crate::services::oracles::CommandOracle::new(
            config.command.clone(),
            config.timeout_secs.map(std::time::Duration::from_secs),
        ));
    }
    registry
}
