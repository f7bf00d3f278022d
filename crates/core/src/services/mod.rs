//! Pipelines built on top of the store and the embedding oracle.

pub mod corpus;
pub mod ingest;
pub mod oracle;
pub mod oracles;
pub mod report;
pub mod search;
