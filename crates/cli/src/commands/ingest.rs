use std::path::Path;

use anyhow::{Context, Result};
use binsim_core::config::SearchConfig;
use binsim_core::db::{open_store, StoreLayout};
use binsim_core::loader::{load_program_file, LoadOptions};
use binsim_core::normalize::Normalizer;
use binsim_core::services::ingest::{ingest_records, IngestOptions};

use crate::{canonicalize_or_current, load_catalog};

/// Load an IR document and add its named functions to the store.
pub fn ingest_command(store: &str, input: &str, config: &SearchConfig, json: bool) -> Result<()> {
    let layout = StoreLayout::new(canonicalize_or_current(store)?);
    let catalog = load_catalog(config)?;
    let normalizer = Normalizer::new(&catalog);

    let load_options = LoadOptions {
        ignore_placeholder_names: config.ignore_placeholder_names,
        lenient: config.lenient,
    };
    let records = load_program_file(Path::new(input), &normalizer, load_options)?;

    let mut db = open_store(&layout)?;
    let summary = ingest_records(
        &mut db,
        records,
        input,
        IngestOptions { lenient: config.lenient, dedupe: config.dedupe },
    )
    .with_context(|| format!("Failed to ingest {input}"))?;
    let total = db.count()?;
    db.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Ingested functions:");
    println!("  Source: {input}");
    println!("  Loaded: {}", summary.loaded);
    println!("  Inserted: {}", summary.inserted);
    println!("  Skipped (no identifier): {}", summary.skipped_missing_identifier);
    println!("  Skipped (duplicate): {}", summary.skipped_duplicates);
    println!("  Store: {} ({} functions)", layout.db_path.display(), total);

    Ok(())
}
