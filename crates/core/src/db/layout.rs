use std::path::{Path, PathBuf};

/// File name of the fingerprint database inside a store directory.
pub const STORE_DB_FILE: &str = "functions.db";

/// Logical layout of a fingerprint store on disk.
///
/// This is derived from a chosen directory. It does *not* perform any IO itself;
/// frontends create the directory before opening the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    /// Store directory.
    pub root: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let db_path = root.join(STORE_DB_FILE);
        Self { root, db_path }
    }
}
