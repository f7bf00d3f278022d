//! Training-corpus export.
//!
//! Each IR document in a directory becomes one tab-separated line per
//! function: `binary`, `function`, comma-joined tokens, `compiler optlevel`.
//! Documents must be named `<binary>-<arch>-<compiler>-<optlevel>.json`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::codec::TOKEN_DELIMITER;
use crate::loader::{load_program_file, LoadError, LoadOptions};
use crate::normalize::Normalizer;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IR file name {0:?} does not match <binary>-<arch>-<compiler>-<optlevel>.json")]
    FileName(String),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Build facts encoded in an IR file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFileName {
    /// Full file stem, used as the binary label.
    pub binary: String,
    pub arch: String,
    pub compiler: String,
    pub opt_level: String,
}

impl CorpusFileName {
    pub fn parse(path: &Path) -> Result<Self, CorpusError> {
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let stem = file_name
            .strip_suffix(".json")
            .ok_or_else(|| CorpusError::FileName(file_name.clone()))?;

        let mut parts = stem.rsplitn(4, '-');
        let (Some(opt_level), Some(compiler), Some(arch), Some(prefix)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CorpusError::FileName(file_name));
        };
        if [opt_level, compiler, arch, prefix].iter().any(|p| p.is_empty()) {
            return Err(CorpusError::FileName(file_name));
        }

        Ok(Self {
            binary: stem.to_string(),
            arch: arch.to_string(),
            compiler: compiler.to_string(),
            opt_level: opt_level.to_string(),
        })
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.compiler, self.opt_level)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusSummary {
    pub files: usize,
    pub functions: usize,
    /// Token frequencies across every exported function.
    pub vocabulary: BTreeMap<String, u64>,
}

/// Write token frequencies as `token\tcount` lines, most frequent first and
/// ties in token order.
pub fn write_vocabulary<W: Write>(
    vocabulary: &BTreeMap<String, u64>,
    out: &mut W,
) -> std::io::Result<()> {
    let mut entries: Vec<(&String, &u64)> = vocabulary.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (token, count) in entries {
        writeln!(out, "{token}\t{count}")?;
    }
    Ok(())
}

/// List `*.json` files in `dir`, sorted by path.
pub fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>, CorpusError> {
    let io_err = |source| CorpusError::Io { path: dir.to_path_buf(), source };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Write corpus lines for every IR document in `dir`.
pub fn export_corpus<W: Write>(
    dir: &Path,
    normalizer: &Normalizer<'_>,
    out: &mut W,
) -> Result<CorpusSummary, CorpusError> {
    let mut summary = CorpusSummary::default();
    let delimiter = TOKEN_DELIMITER.to_string();

    for path in corpus_files(dir)? {
        let file = CorpusFileName::parse(&path)?;
        let records = load_program_file(&path, normalizer, LoadOptions::query())?;
        let label = file.label();

        for record in &records {
            let line = format!(
                "{}\t{}\t{}\t{}\n",
                file.binary,
                record.name,
                record.instructions.join(&delimiter),
                label
            );
            out.write_all(line.as_bytes())
                .map_err(|source| CorpusError::Io { path: path.clone(), source })?;
            for token in &record.instructions {
                *summary.vocabulary.entry(token.clone()).or_default() += 1;
            }
        }

        debug!(path = %path.display(), functions = records.len(), "exported IR document");
        summary.files += 1;
        summary.functions += records.len();
    }

    info!(
        files = summary.files,
        functions = summary.functions,
        vocabulary = summary.vocabulary.len(),
        "exported training corpus"
    );
    Ok(summary)
}
