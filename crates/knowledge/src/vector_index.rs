//! Vector index abstraction for knowledge passages.
//!
//! Defines a trait for backend-agnostic vector storage and retrieval.

use crate::filter::MetadataFilter;
use crate::passage::{IndexStats, Passage, RetrievedPassage};
use grounded_core::AppResult;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Upserting passages with their (unit-length) embeddings
/// - Filtered top-k search by similarity
/// - Collecting statistics
/// - Replacing the whole contents atomically
///
/// Methods take `&self`; backends synchronize internally so one index can
/// be shared across concurrent requests. Calls block, so async callers run
/// them off the runtime threads.
pub trait VectorIndex: Send + Sync {
    /// Embedding dimension the index was created with.
    fn dimensions(&self) -> usize;

    /// Insert or overwrite passages by id. Returns the number written.
    fn upsert(&self, batch: &[(Passage, Vec<f32>)]) -> AppResult<usize>;

    /// Atomically swap the whole contents for `batch`.
    ///
    /// On error the previous contents are left in place.
    fn replace_all(&self, batch: &[(Passage, Vec<f32>)]) -> AppResult<usize>;

    /// Top-k passages matching `filter`, by descending similarity.
    ///
    /// The filter is applied before truncation, so up to `top_k` matching
    /// passages are returned whenever that many exist.
    fn search(
        &self,
        query_embedding: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
    ) -> AppResult<Vec<RetrievedPassage>>;

    /// Get statistics about the index.
    fn stats(&self) -> AppResult<IndexStats>;

    /// Commit any pending changes (for backends that buffer writes).
    fn flush(&self) -> AppResult<()> {
        Ok(())
    }
}
