use serde::{Deserialize, Serialize};

/// Record describing one ingestion pass into the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestRunRecord {
    /// IR document the functions came from.
    pub source: String,
    /// Number of functions written by this pass.
    pub function_count: u64,
    pub started_at: String,
    pub finished_at: String,
}
