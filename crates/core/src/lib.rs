//! binsim-core
//!
//! Core library for binary-code similarity search over normalized disassembly.
//!
//! This crate defines the function model, the symbol catalog and instruction
//! normalizer, the decompiler IR loader, the compressed fingerprint store, and
//! the batched search and ranking engine that drives an embedding oracle.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends (CLI, batch jobs, etc.).

pub mod config;
pub mod db;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod services;
pub mod symbols;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
