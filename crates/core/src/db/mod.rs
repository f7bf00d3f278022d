//! Fingerprint store integration and on-disk layout.
//!
//! This module wraps a SQLite database holding one row per indexed function:
//! - `functions`: identifier, name, and the zlib-compressed token stream
//! - `ingest_runs`: bookkeeping for each ingestion pass
//!
//! It defines:
//! - `StoreLayout`: computed paths for a store directory.
//! - `FingerprintStore`: a small SQLite wrapper with versioned schema.
//! - `codec`: the token join/compress/digest helpers shared by reads and writes.

pub mod codec;
mod layout;
mod models;
mod store;
mod util;

pub use layout::*;
pub use models::*;
pub use store::*;
pub use util::*;
