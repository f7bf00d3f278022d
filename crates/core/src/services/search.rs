//! Batched similarity search and ranking.
//!
//! Both the query set and the stored corpus are cut into fixed-size batches so
//! each oracle call covers many records. Every query embedding is then compared
//! against every corpus batch (broadcast to that batch's width), and the scores
//! for one query are merged into a single ranking, best first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::db::{FingerprintStore, StoreError};
use crate::model::{FunctionRecord, QueryResult, SearchReport, SimilarityMatch, StoredFunction};
use crate::services::oracle::{
    compare_checked, embed_checked, Embedding, EmbeddingOracle, OracleError,
};

/// Records per oracle call unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("Invalid search options: {0}")]
    InvalidOptions(String),
}

pub type SearchResult<T> = Result<T, SearchError>;

/// Tuning for a search run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub batch_size: usize,
    /// Truncate each ranking to this many matches. `None` keeps the full corpus.
    pub top_k: Option<usize>,
    /// Drop matches scoring below this value.
    pub minimum_similarity: Option<f32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE, top_k: None, minimum_similarity: None }
    }
}

/// Split an iterator into `Vec`s of `size` items; the last may be shorter.
///
/// A `size` of zero is treated as one.
pub fn batched<I: IntoIterator>(items: I, size: usize) -> Batched<I::IntoIter> {
    Batched { inner: items.into_iter(), size: size.max(1) }
}

pub struct Batched<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Batched<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<_> = self.inner.by_ref().take(self.size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// Identity of a stored candidate, kept alongside its embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateInfo {
    pub name: String,
    pub identifier: String,
}

/// One embedded corpus batch; `info[i]` describes `embeddings[i]`.
#[derive(Debug, Clone)]
pub struct CandidateBatch {
    pub info: Vec<CandidateInfo>,
    pub embeddings: Vec<Embedding>,
}

impl CandidateBatch {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Heap entry: higher similarity wins, earlier encounter breaks ties.
struct Ranked {
    similarity: f32,
    seq: usize,
    batch: usize,
    index: usize,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.similarity.total_cmp(&other.similarity).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Drives the oracle over queries and corpus and assembles the report.
pub struct SearchEngine<'a> {
    oracle: &'a dyn EmbeddingOracle,
    options: SearchOptions,
}

impl<'a> SearchEngine<'a> {
    pub fn new(oracle: &'a dyn EmbeddingOracle, options: SearchOptions) -> SearchResult<Self> {
        if options.batch_size == 0 {
            return Err(SearchError::InvalidOptions("batch_size must be at least 1".into()));
        }
        if let Some(min) = options.minimum_similarity {
            if !(0.0..=1.0).contains(&min) {
                return Err(SearchError::InvalidOptions(format!(
                    "minimum_similarity must be within 0..=1, got {min}"
                )));
            }
        }
        Ok(Self { oracle, options })
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Rank the whole store for every query function.
    pub fn search(
        &self,
        queries: &[FunctionRecord],
        store: &FingerprintStore,
    ) -> SearchResult<SearchReport> {
        if queries.is_empty() {
            return Ok(SearchReport::default());
        }
        let candidates = self.embed_store(store)?;
        self.search_candidates(queries, &candidates)
    }

    /// Stream the store in batches and embed each one.
    ///
    /// Token streams are dropped as soon as their batch is embedded; only the
    /// embeddings and candidate identities are retained.
    pub fn embed_store(&self, store: &FingerprintStore) -> SearchResult<Vec<CandidateBatch>> {
        let mut out = Vec::new();
        let mut total = 0usize;
        for batch in batched(store.iter_all()?, self.options.batch_size) {
            let batch = batch.into_iter().collect::<Result<Vec<StoredFunction>, _>>()?;
            let mut info = Vec::with_capacity(batch.len());
            let mut tokens = Vec::with_capacity(batch.len());
            for record in batch {
                info.push(CandidateInfo { name: record.name, identifier: record.identifier });
                tokens.push(record.instructions);
            }
            let embeddings = embed_checked(self.oracle, &tokens)?;
            total += embeddings.len();
            out.push(CandidateBatch { info, embeddings });
        }
        info!(functions = total, batches = out.len(), "embedded stored corpus");
        Ok(out)
    }

    /// Embed query functions batch by batch, returning one embedding per query.
    pub fn embed_queries(&self, queries: &[FunctionRecord]) -> SearchResult<Vec<Embedding>> {
        let mut out = Vec::with_capacity(queries.len());
        for chunk in queries.chunks(self.options.batch_size) {
            let tokens: Vec<Vec<String>> = chunk.iter().map(|q| q.instructions.clone()).collect();
            out.extend(embed_checked(self.oracle, &tokens)?);
        }
        info!(functions = out.len(), "embedded query functions");
        Ok(out)
    }

    /// Rank pre-embedded candidates for each query. Output order is query order.
    pub fn search_candidates(
        &self,
        queries: &[FunctionRecord],
        candidates: &[CandidateBatch],
    ) -> SearchResult<SearchReport> {
        let embeddings = self.embed_queries(queries)?;
        let funcs = queries
            .par_iter()
            .zip(embeddings.par_iter())
            .map(|(query, embedding)| {
                let ranked_matches = self.rank(embedding, candidates)?;
                debug!(query = %query.name, matches = ranked_matches.len(), "ranked query");
                Ok(QueryResult {
                    query_address: query.entry_address,
                    query_name: query.name.clone(),
                    ranked_matches,
                })
            })
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(SearchReport { funcs })
    }

    /// Score one query against every candidate batch and drain the heap.
    pub fn rank(
        &self,
        query: &Embedding,
        candidates: &[CandidateBatch],
    ) -> SearchResult<Vec<SimilarityMatch>> {
        let full_width = vec![query.clone(); self.options.batch_size];
        let mut heap = BinaryHeap::new();
        let mut seq = 0usize;

        for (batch_idx, batch) in candidates.iter().enumerate() {
            let scores = if batch.len() == full_width.len() {
                compare_checked(self.oracle, &full_width, &batch.embeddings)?
            } else {
                let resized = vec![query.clone(); batch.len()];
                compare_checked(self.oracle, &resized, &batch.embeddings)?
            };

            for (index, similarity) in scores.into_iter().enumerate() {
                let entry = Ranked { similarity, seq, batch: batch_idx, index };
                seq += 1;
                if self.options.minimum_similarity.is_some_and(|min| similarity < min) {
                    continue;
                }
                heap.push(entry);
            }
        }

        let limit = self.options.top_k.unwrap_or(usize::MAX);
        let mut out = Vec::with_capacity(heap.len().min(limit));
        while out.len() < limit {
            let Some(entry) = heap.pop() else { break };
            let info = &candidates[entry.batch].info[entry.index];
            out.push(SimilarityMatch {
                similarity: entry.similarity,
                name: info.name.clone(),
                identifier: info.identifier.clone(),
            });
        }
        Ok(out)
    }
}
