#![warn(missing_docs)]
//! Question answering over two vector knowledge bases with a web fallback.

pub mod arbitration;
pub mod config;
pub mod context;
pub mod embedder;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod telemetry;
pub mod types;
pub mod vector_search;
pub mod web_search;

pub use arbitration::{Arbitration, Qualifier, SourceArbitrator, SourceTier};
pub use config::{BackendChoice, Settings, SettingsArgs};
pub use context::assemble;
pub use embedder::{Embedder, OpenAiEmbedder};
pub use error::{GenerationError, ServiceError};
pub use generation::{
    build_prompt, render_answer, AnswerBackend, AnswerGenerator, OllamaBackend, OpenAiChatBackend,
};
pub use pipeline::{QuestionAnsweringPipeline, Session, EMPTY_QUESTION, NO_INFORMATION};
pub use types::{AnswerResult, EmbeddingVector, Evidence, SearchHit, SourceLabel, WebResult};
pub use vector_search::{QdrantSearch, VectorSearch};
pub use web_search::{SerperSearch, WebSearch};
