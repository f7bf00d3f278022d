use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{codec, FingerprintStore, IngestRunRecord, StoreError};
use crate::model::{FunctionRecord, StoredFunction};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Function {name} at 0x{address:x} has no identifier")]
    MissingIdentifier { name: String, address: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Skip functions without an identifier instead of failing.
    pub lenient: bool,
    /// Skip functions whose token stream is already stored (or repeated in the input).
    pub dedupe: bool,
}

/// What an ingestion pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub loaded: usize,
    pub inserted: usize,
    pub skipped_missing_identifier: usize,
    pub skipped_duplicates: usize,
}

/// Write loaded functions and the run record into the store as one transaction.
pub fn ingest_records(
    store: &mut FingerprintStore,
    records: Vec<FunctionRecord>,
    source: &str,
    options: IngestOptions,
) -> Result<IngestSummary, IngestError> {
    let started_at = Utc::now().to_rfc3339();
    let mut summary = IngestSummary { loaded: records.len(), ..IngestSummary::default() };
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(records.len());

    for record in records {
        let Some(identifier) = record.identifier else {
            if !options.lenient {
                return Err(IngestError::MissingIdentifier {
                    name: record.name,
                    address: record.entry_address,
                });
            }
            warn!(name = %record.name, address = record.entry_address, "skipping function without identifier");
            summary.skipped_missing_identifier += 1;
            continue;
        };

        if options.dedupe {
            let digest = codec::digest(&codec::join_tokens(&record.instructions)?);
            if !seen.insert(digest.clone()) || store.contains_digest(&digest)? {
                summary.skipped_duplicates += 1;
                continue;
            }
        }

        rows.push(StoredFunction::new(record.name, identifier, record.instructions));
    }

    let run = IngestRunRecord {
        source: source.to_string(),
        function_count: rows.len() as u64,
        started_at,
        finished_at: Utc::now().to_rfc3339(),
    };
    summary.inserted = store.insert_many_with_run(&rows, &run)?;

    info!(
        source,
        loaded = summary.loaded,
        inserted = summary.inserted,
        duplicates = summary.skipped_duplicates,
        "ingested functions"
    );
    Ok(summary)
}
