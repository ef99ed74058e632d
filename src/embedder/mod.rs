//! Query embedding.

pub mod openai;

use crate::error::ServiceError;
use crate::types::EmbeddingVector;

pub use openai::OpenAiEmbedder;

/// Turns a question into the vector both collections are indexed with.
pub trait Embedder: Send + Sync {
    /// Embeds `text`. Failures are returned to the caller, which treats them
    /// as an empty vector.
    fn embed(&self, text: &str) -> Result<EmbeddingVector, ServiceError>;
}
