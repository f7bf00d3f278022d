//! Loader for decompiler IR documents.
//!
//! The document shape is:
//!
//! ```text
//! {"program": {"term": {"subs": [
//!     {"tid": {"address": "<hex>"},
//!      "term": {"name": "...", "uuid": "...", "ops": ["MNEMONIC a,b", ...]}}
//! ]}}}
//! ```
//!
//! Subroutines without `ops` (imports, thunks) are skipped, as are subroutines
//! whose op list is empty. Everything else is normalized in order.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::FunctionRecord;
use crate::normalize::{NormalizeError, Normalizer};

/// Name prefix the decompiler gives to functions it could not name.
pub const PLACEHOLDER_PREFIX: &str = "FUN_";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read IR document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document does not match the expected structure.
    #[error("IR document schema error: {0}")]
    Schema(String),

    #[error("Invalid hexadecimal address {address:?} for subroutine {name}")]
    AddressParse { name: String, address: String },

    #[error("Subroutine {name}: {source}")]
    Malformed {
        name: String,
        #[source]
        source: NormalizeError,
    },
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Typed view of the IR document.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramDocument {
    pub program: ProgramNode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramNode {
    pub term: ProgramTerm,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramTerm {
    pub subs: Vec<SubroutineEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubroutineEntry {
    pub tid: TermId,
    pub term: SubroutineTerm,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TermId {
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubroutineTerm {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub ops: Option<Vec<String>>,
}

/// Options controlling which subroutines survive loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Skip decompiler placeholder names (`FUN_...`). Used for reference corpora.
    pub ignore_placeholder_names: bool,
    /// Skip subroutines with bad addresses or malformed operations instead of failing.
    pub lenient: bool,
}

impl LoadOptions {
    pub fn ingestion() -> Self {
        Self { ignore_placeholder_names: true, lenient: false }
    }

    pub fn query() -> Self {
        Self { ignore_placeholder_names: false, lenient: false }
    }

    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }
}

/// Parse a JSON IR document, mapping structural problems to `LoadError::Schema`.
pub fn parse_document(body: &str) -> LoadResult<ProgramDocument> {
    serde_json::from_str(body).map_err(|e| LoadError::Schema(e.to_string()))
}

/// Read, parse and load an IR document from disk.
pub fn load_program_file(
    path: &Path,
    normalizer: &Normalizer<'_>,
    options: LoadOptions,
) -> LoadResult<Vec<FunctionRecord>> {
    let body = std::fs::read_to_string(path)
        .map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    let document = parse_document(&body)?;
    let records = load_program(&document, normalizer, options)?;
    debug!(path = %path.display(), functions = records.len(), "loaded IR document");
    Ok(records)
}

/// Turn a parsed document into function records, in document order.
pub fn load_program(
    document: &ProgramDocument,
    normalizer: &Normalizer<'_>,
    options: LoadOptions,
) -> LoadResult<Vec<FunctionRecord>> {
    let mut records = Vec::new();
    for sub in &document.program.term.subs {
        match load_subroutine(sub, normalizer, options) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(err) if options.lenient => {
                warn!(error = %err, "skipping subroutine");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(records)
}

fn load_subroutine(
    sub: &SubroutineEntry,
    normalizer: &Normalizer<'_>,
    options: LoadOptions,
) -> LoadResult<Option<FunctionRecord>> {
    let term = &sub.term;
    let ops = match term.ops.as_deref() {
        Some(ops) if !ops.is_empty() => ops,
        _ => return Ok(None),
    };
    if options.ignore_placeholder_names && is_placeholder_name(&term.name) {
        return Ok(None);
    }

    let entry_address = parse_address(&sub.tid.address).ok_or_else(|| LoadError::AddressParse {
        name: term.name.clone(),
        address: sub.tid.address.clone(),
    })?;

    let instructions = ops
        .iter()
        .map(|op| normalizer.normalize(op))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| LoadError::Malformed { name: term.name.clone(), source })?;

    Ok(Some(FunctionRecord::new(term.name.clone(), term.uuid.clone(), entry_address, instructions)))
}

pub fn is_placeholder_name(name: &str) -> bool {
    name.starts_with(PLACEHOLDER_PREFIX)
}

/// Parse a hexadecimal address, with or without a `0x` prefix.
pub fn parse_address(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_address_accepts_prefixed_and_bare_hex() {
        assert_eq!(parse_address("401000"), Some(0x401000));
        assert_eq!(parse_address("0x401000"), Some(0x401000));
        assert_eq!(parse_address("0XFF"), Some(0xff));
        assert_eq!(parse_address(""), None);
        assert_eq!(parse_address("0x"), None);
        assert_eq!(parse_address("zz"), None);
        assert_eq!(parse_address("-1"), None);
    }
}
