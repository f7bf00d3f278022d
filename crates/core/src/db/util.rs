use anyhow::{Context, Result};

use crate::db::{FingerprintStore, StoreLayout};

/// Create the store directory if needed and open (or create) its database.
pub fn open_store(layout: &StoreLayout) -> Result<FingerprintStore> {
    std::fs::create_dir_all(&layout.root)
        .with_context(|| format!("Failed to create store dir: {}", layout.root.display()))?;
    FingerprintStore::open(&layout.db_path).with_context(|| {
        format!("Failed to open fingerprint store at {}", layout.db_path.display())
    })
}

/// Open an existing store; fails instead of creating an empty database.
pub fn open_existing_store(layout: &StoreLayout) -> Result<FingerprintStore> {
    if !layout.db_path.is_file() {
        anyhow::bail!("Fingerprint store not found at {}", layout.db_path.display());
    }
    FingerprintStore::open(&layout.db_path).with_context(|| {
        format!("Failed to open fingerprint store at {}", layout.db_path.display())
    })
}
