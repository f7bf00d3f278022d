//! Catalog of known library-exported symbol names (e.g. libc exports).
//!
//! The catalog is built once per process and then only read. It is `Send + Sync`
//! and can be shared by reference across worker threads.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to load symbol catalog from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Immutable set of known exported symbol names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolCatalog {
    names: HashSet<String>,
}

impl SymbolCatalog {
    /// An empty catalog; every call target resolves as unknown.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a newline-delimited symbol list, one name per line.
    ///
    /// Surrounding whitespace is stripped and blank lines are ignored.
    pub fn load(path: &Path) -> CatalogResult<Self> {
        let file = std::fs::File::open(path)
            .map_err(|source| CatalogError::Load { path: path.to_path_buf(), source })?;
        Self::from_reader(std::io::BufReader::new(file))
            .map_err(|source| CatalogError::Load { path: path.to_path_buf(), source })
    }

    /// Build a catalog from any buffered line source.
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut names = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            let name = line.trim();
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
        Ok(Self { names })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
