use anyhow::Result;
use binsim_core::db::{open_existing_store, IngestRunRecord, StoreLayout};
use serde::Serialize;

use crate::canonicalize_or_current;

#[derive(Debug, Serialize)]
pub struct StoreInfo {
    pub path: String,
    pub schema_version: i32,
    pub functions: u64,
    pub ingest_runs: Vec<IngestRunRecord>,
}

/// Show the size, schema version and ingestion history of a store.
pub fn store_info_command(store: &str, json: bool) -> Result<()> {
    let layout = StoreLayout::new(canonicalize_or_current(store)?);
    let db = open_existing_store(&layout)?;
    let info = StoreInfo {
        path: layout.db_path.display().to_string(),
        schema_version: db.schema_version()?,
        functions: db.count()?,
        ingest_runs: db.list_ingest_runs()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Fingerprint store:");
    println!("  Path: {}", info.path);
    println!("  Schema version: {}", info.schema_version);
    println!("  Functions: {}", info.functions);
    if info.ingest_runs.is_empty() {
        println!("  Ingest runs: (none)");
    } else {
        println!("  Ingest runs:");
        for run in &info.ingest_runs {
            println!("  - {} ({} functions, {})", run.source, run.function_count, run.finished_at);
        }
    }

    Ok(())
}
