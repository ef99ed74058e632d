//! Runtime settings shared by the CLI and the HTTP server.

use std::time::Duration;

use clap::{Args, ValueEnum};

/// Default Qdrant REST endpoint.
pub const DEFAULT_QDRANT_URL: &str = "http://host.docker.internal:6333/";
/// Default reference-manager collection.
pub const DEFAULT_REFERENCES_COLLECTION: &str = "ZoteroNeu";
/// Default notes collection.
pub const DEFAULT_NOTES_COLLECTION: &str = "obsidianNeu";
/// Top-hit score a reference hit must exceed to be trusted.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.35;
/// Hits requested per collection.
pub const DEFAULT_SEARCH_LIMIT: usize = 3;
/// Embedding dimensionality expected by both collections.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
/// Web results requested per search.
pub const DEFAULT_WEB_RESULTS: usize = 3;
/// Default local model-server endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434/api/generate";
/// Default Serper endpoint.
pub const DEFAULT_SERPER_URL: &str = "https://google.serper.dev/search";

/// Which text-generation backend composes the answer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Hosted chat-completion API.
    #[default]
    Cloud,
    /// Local model server.
    Local,
}

/// Fully resolved settings.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Qdrant REST base URL; `None` leaves the vector client unconfigured.
    pub qdrant_url: Option<String>,
    /// Optional Qdrant `api-key` header value.
    pub qdrant_api_key: Option<String>,
    /// Reference-manager collection name.
    pub references_collection: String,
    /// Notes collection name.
    pub notes_collection: String,
    /// Score the top reference hit must exceed.
    pub confidence_threshold: f32,
    /// Hits requested per collection.
    pub search_limit: usize,
    /// OpenAI API key for embeddings and cloud generation.
    pub openai_api_key: Option<String>,
    /// Base URL for OpenAI-compatible endpoints.
    pub openai_base_url: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Embedding dimensionality.
    pub embedding_dimensions: usize,
    /// Chat model used by the cloud backend.
    pub chat_model: String,
    /// Serper API key.
    pub serper_api_key: Option<String>,
    /// Serper search endpoint.
    pub serper_url: String,
    /// Web results requested per search.
    pub web_results: usize,
    /// Local model-server endpoint.
    pub ollama_url: String,
    /// Local model name.
    pub ollama_model: String,
    /// Language every answer is written in.
    pub answer_language: String,
    /// Timeout applied to every external HTTP call.
    pub http_timeout: Duration,
    /// Attempts made for transient embedding failures.
    pub max_retries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qdrant_url: Some(DEFAULT_QDRANT_URL.to_string()),
            qdrant_api_key: None,
            references_collection: DEFAULT_REFERENCES_COLLECTION.to_string(),
            notes_collection: DEFAULT_NOTES_COLLECTION.to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            search_limit: DEFAULT_SEARCH_LIMIT,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            chat_model: "gpt-3.5-turbo".to_string(),
            serper_api_key: None,
            serper_url: DEFAULT_SERPER_URL.to_string(),
            web_results: DEFAULT_WEB_RESULTS,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: "mistral".to_string(),
            answer_language: "German".to_string(),
            http_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Command-line and environment surface for [`Settings`].
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Qdrant REST endpoint (empty disables vector search)
    #[arg(long, env = "QDRANT_URL", default_value = DEFAULT_QDRANT_URL)]
    pub qdrant_url: String,

    /// Qdrant API key sent as the `api-key` header
    #[arg(long, env = "QDRANT_API_KEY")]
    pub qdrant_api_key: Option<String>,

    /// Reference-manager collection searched first
    #[arg(long, env = "KB_COLLECTION_REFERENCES", default_value = DEFAULT_REFERENCES_COLLECTION)]
    pub references_collection: String,

    /// Notes collection searched when references are not confident
    #[arg(long, env = "KB_COLLECTION_NOTES", default_value = DEFAULT_NOTES_COLLECTION)]
    pub notes_collection: String,

    /// Score the top reference hit must exceed
    #[arg(long, env = "KB_CONFIDENCE_THRESHOLD", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    pub confidence_threshold: f32,

    /// Hits requested per collection
    #[arg(long, env = "KB_SEARCH_LIMIT", default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub search_limit: usize,

    /// OpenAI API key for embeddings and the cloud backend
    #[arg(long, env = "API_KEY")]
    pub openai_api_key: Option<String>,

    /// Fallback OpenAI API key, used when `API_KEY` is unset or blank
    #[arg(long = "openai-api-key-fallback", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key_fallback: Option<String>,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(long, env = "KB_OPENAI_BASE", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// Embedding model identifier
    #[arg(long, env = "KB_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    /// Embedding dimensionality of both collections
    #[arg(long, env = "KB_EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    pub embedding_dimensions: usize,

    /// Chat model used by the cloud backend
    #[arg(long, env = "KB_CHAT_MODEL", default_value = "gpt-3.5-turbo")]
    pub chat_model: String,

    /// Serper API key for web search
    #[arg(long, env = "SERPER_API_KEY")]
    pub serper_api_key: Option<String>,

    /// Serper search endpoint
    #[arg(long, env = "KB_SERPER_URL", default_value = DEFAULT_SERPER_URL)]
    pub serper_url: String,

    /// Web results requested per search
    #[arg(long, env = "KB_WEB_RESULTS", default_value_t = DEFAULT_WEB_RESULTS)]
    pub web_results: usize,

    /// Local model-server generate endpoint
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    /// Local model name
    #[arg(long, env = "OLLAMA_MODEL", default_value = "mistral")]
    pub ollama_model: String,

    /// Language every answer is written in
    #[arg(long, env = "KB_ANSWER_LANGUAGE", default_value = "German")]
    pub answer_language: String,

    /// Seconds before any external request times out
    #[arg(long, env = "KB_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Attempts made for transient embedding failures
    #[arg(long, env = "KB_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: usize,
}

impl SettingsArgs {
    /// Converts the parsed arguments into [`Settings`].
    pub fn build_settings(&self) -> Settings {
        Settings {
            qdrant_url: non_empty(Some(&self.qdrant_url)),
            qdrant_api_key: non_empty(self.qdrant_api_key.as_ref()),
            references_collection: self.references_collection.clone(),
            notes_collection: self.notes_collection.clone(),
            confidence_threshold: self.confidence_threshold,
            search_limit: self.search_limit.max(1),
            openai_api_key: non_empty(self.openai_api_key.as_ref())
                .or_else(|| non_empty(self.openai_api_key_fallback.as_ref())),
            openai_base_url: self.openai_base_url.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_dimensions: self.embedding_dimensions,
            chat_model: self.chat_model.clone(),
            serper_api_key: non_empty(self.serper_api_key.as_ref()),
            serper_url: self.serper_url.clone(),
            web_results: self.web_results.max(1),
            ollama_url: self.ollama_url.clone(),
            ollama_model: self.ollama_model.clone(),
            answer_language: self.answer_language.clone(),
            http_timeout: Duration::from_secs(self.http_timeout_secs.max(1)),
            max_retries: self.max_retries.max(1),
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
