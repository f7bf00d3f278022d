//! Run configuration shared by ingestion and query runs.
//!
//! A config file is optional; frontends start from `SearchConfig::default()`,
//! overlay a JSON or YAML file if one is given, then apply command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::services::oracles::{RetryPolicy, DEFAULT_DIMENSIONS};
use crate::services::search::{SearchOptions, DEFAULT_BATCH_SIZE};

/// Serializable run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Records per embedding-oracle call, for both queries and corpus.
    pub batch_size: usize,
    /// Keep only the best `top_k` matches per query. Unset ranks the whole corpus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Drop matches scoring below this similarity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_similarity: Option<f32>,
    /// Newline-delimited list of known library exports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<PathBuf>,
    /// Skip `FUN_` placeholder names when ingesting a reference corpus.
    pub ignore_placeholder_names: bool,
    /// Skip malformed subroutines instead of failing the run.
    pub lenient: bool,
    /// Skip functions whose token stream is already stored.
    pub dedupe: bool,
    pub oracle: OracleConfig,
    pub retry: RetryPolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            top_k: None,
            minimum_similarity: None,
            symbols: None,
            ignore_placeholder_names: true,
            lenient: false,
            dedupe: false,
            oracle: OracleConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SearchConfig {
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            batch_size: self.batch_size,
            top_k: self.top_k,
            minimum_similarity: self.minimum_similarity,
        }
    }

    /// Reject values the search engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if let Some(min) = self.minimum_similarity {
            if !(0.0..=1.0).contains(&min) {
                bail!("minimum_similarity must be within 0..=1, got {min}");
            }
        }
        if self.oracle.kind.trim().is_empty() {
            bail!("oracle.kind must not be empty");
        }
        Ok(())
    }
}

/// Which embedding oracle to use and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Registered oracle name (`hashing` or `command`).
    pub kind: String,
    /// Embedding width for the built-in hashing oracle.
    pub dimensions: usize,
    /// Program and arguments for the `command` oracle.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Per-call deadline for the `command` oracle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: "hashing".to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            command: Vec::new(),
            timeout_secs: None,
        }
    }
}

/// Load a config file; `.yaml`/`.yml` parse as YAML, anything else as JSON.
pub fn load_config(path: &Path) -> Result<SearchConfig> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let config: SearchConfig = if matches!(ext, "yaml" | "yml") {
        serde_yaml::from_str(&body).context("Failed to parse config YAML")?
    } else {
        serde_json::from_str(&body).context("Failed to parse config JSON")?
    };
    config.validate()?;
    Ok(config)
}

/// Load `path` if given, else return the defaults.
pub fn load_config_or_default(path: Option<&Path>) -> Result<SearchConfig> {
    match path {
        Some(p) => load_config(p),
        None => Ok(SearchConfig::default()),
    }
}
