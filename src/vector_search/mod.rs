//! Nearest-neighbour search over named vector collections.

pub mod qdrant;

use crate::types::SearchHit;

pub use qdrant::QdrantSearch;

/// Searches one collection for the closest points to `vector`.
///
/// Implementations return hits sorted by descending score and come back empty
/// (after logging) when the backend is unreachable or misconfigured.
pub trait VectorSearch: Send + Sync {
    /// Returns at most `limit` hits from `collection`.
    fn search(&self, collection: &str, vector: &[f32], limit: usize) -> Vec<SearchHit>;
}
