//! Core data model shared by the loader, the fingerprint store and the search engine.

use serde::{Deserialize, Serialize};

/// A function recovered from a decompiled program, with its normalized token stream.
///
/// `instructions` is in execution order and is never empty once a record has
/// passed through the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Symbol name as reported by the decompiler (may be a `FUN_<addr>` placeholder).
    pub name: String,
    /// Stable identifier assigned upstream; absent for freshly analyzed functions.
    pub identifier: Option<String>,
    /// Function start address.
    pub entry_address: u64,
    /// Normalized instruction tokens.
    pub instructions: Vec<String>,
}

impl FunctionRecord {
    pub fn new(
        name: impl Into<String>,
        identifier: Option<String>,
        entry_address: u64,
        instructions: Vec<String>,
    ) -> Self {
        Self { name: name.into(), identifier, entry_address, instructions }
    }
}

/// A fingerprint as it lives in (or is headed for) the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFunction {
    pub name: String,
    pub identifier: String,
    pub instructions: Vec<String>,
}

impl StoredFunction {
    pub fn new(
        name: impl Into<String>,
        identifier: impl Into<String>,
        instructions: Vec<String>,
    ) -> Self {
        Self { name: name.into(), identifier: identifier.into(), instructions }
    }
}

/// One ranked candidate for a query function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    #[serde(rename = "sim")]
    pub similarity: f32,
    pub name: String,
    #[serde(rename = "cve_uuid")]
    pub identifier: String,
}

/// Ranked candidates for a single query function, best match first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "addr", with = "hex_address")]
    pub query_address: u64,
    #[serde(rename = "fname")]
    pub query_name: String,
    #[serde(rename = "results")]
    pub ranked_matches: Vec<SimilarityMatch>,
}

/// The full search report written at the end of a query run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub funcs: Vec<QueryResult>,
}

/// Render an address as lowercase hexadecimal with no `0x` prefix.
pub fn format_address(address: u64) -> String {
    format!("{address:x}")
}

/// Serde adapter storing addresses as bare lowercase hex strings.
mod hex_address {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(address: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_address(*address))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        u64::from_str_radix(&text, 16).map_err(D::Error::custom)
    }
}
