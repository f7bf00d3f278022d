use std::path::Path;

use anyhow::{Context, Result};
use binsim_core::config::SearchConfig;
use binsim_core::db::{open_existing_store, StoreLayout};
use binsim_core::loader::{load_program_file, LoadOptions};
use binsim_core::normalize::Normalizer;
use binsim_core::services::oracle::default_oracle_registry;
use binsim_core::services::oracles::RetryingOracle;
use binsim_core::services::report::write_report;
use binsim_core::services::search::SearchEngine;

use crate::{canonicalize_or_current, load_catalog};

/// Rank every stored function against each function of a query document and
/// write the report to `output`.
pub fn query_command(store: &str, input: &str, output: &str, config: &SearchConfig) -> Result<()> {
    let layout = StoreLayout::new(canonicalize_or_current(store)?);
    let catalog = load_catalog(config)?;
    let normalizer = Normalizer::new(&catalog);

    // Every query function is evaluated, named or not.
    let load_options = LoadOptions::query().with_lenient(config.lenient);
    let queries = load_program_file(Path::new(input), &normalizer, load_options)?;

    let db = open_existing_store(&layout)?;
    let registry = default_oracle_registry(&config.oracle);
    let inner = registry.require(&config.oracle.kind)?;
    let oracle = RetryingOracle::new(inner, config.retry);
    let engine = SearchEngine::new(&oracle, config.search_options())?;

    let report = engine.search(&queries, &db).context("Similarity search failed")?;
    write_report(Path::new(output), &report)?;

    println!("Query complete:");
    println!("  Queries: {}", report.funcs.len());
    println!("  Oracle: {}", inner.name());
    println!("  Store: {}", layout.db_path.display());
    println!("  Report: {output}");

    Ok(())
}
