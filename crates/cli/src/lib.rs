use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use binsim_core::config::{load_config_or_default, SearchConfig};
use binsim_core::symbols::SymbolCatalog;
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub mod commands;

/// Canonicalize a path if possible, falling back to the given string
/// relative to the current working directory.
pub fn canonicalize_or_current(root: &str) -> Result<PathBuf> {
    let path = Path::new(root);
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        // Paths that do not exist yet (a fresh store dir) cannot be canonicalized.
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over the default level.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub batch_size: Option<usize>,
    pub top_k: Option<usize>,
    pub minimum_similarity: Option<f32>,
    pub symbols: Option<PathBuf>,
    pub oracle: Option<String>,
    pub lenient: bool,
    pub dedupe: bool,
    pub include_placeholders: bool,
}

/// Load the optional config file and apply command-line overrides on top.
pub fn resolve_config(path: Option<&str>, overrides: &ConfigOverrides) -> Result<SearchConfig> {
    let mut config = load_config_or_default(path.map(Path::new))?;
    if let Some(size) = overrides.batch_size {
        config.batch_size = size;
    }
    if overrides.top_k.is_some() {
        config.top_k = overrides.top_k;
    }
    if overrides.minimum_similarity.is_some() {
        config.minimum_similarity = overrides.minimum_similarity;
    }
    if let Some(symbols) = &overrides.symbols {
        config.symbols = Some(symbols.clone());
    }
    if let Some(oracle) = &overrides.oracle {
        config.oracle.kind = oracle.clone();
    }
    config.lenient |= overrides.lenient;
    config.dedupe |= overrides.dedupe;
    if overrides.include_placeholders {
        config.ignore_placeholder_names = false;
    }
    config.validate()?;
    Ok(config)
}

/// Load the configured symbol list, or an empty catalog when none is set.
pub fn load_catalog(config: &SearchConfig) -> Result<SymbolCatalog> {
    match &config.symbols {
        Some(path) => Ok(SymbolCatalog::load(path)?),
        None => {
            warn!("no symbol list configured; every call target normalizes to call:unknown");
            Ok(SymbolCatalog::empty())
        }
    }
}
