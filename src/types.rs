//! Data carried between pipeline stages.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder title used when a hit or web result carries none.
pub const UNTITLED: &str = "Untitled";
/// Provenance name used when a hit has metadata but no `name` field.
pub const UNKNOWN_TITLE: &str = "Unknown title";

/// Query embedding. Empty means the embedding step failed.
pub type EmbeddingVector = Vec<f32>;

/// One scored result of a vector-collection search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Point identifier as reported by the vector database.
    #[serde(default)]
    pub id: Value,
    /// Similarity score; higher is more relevant.
    pub score: f32,
    /// Raw point payload (`metadata` object plus `content` string).
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl SearchHit {
    /// Builds a hit from its score, title, and content.
    pub fn new(score: f32, title: impl Into<String>, content: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("name".into(), Value::String(title.into()));
        let mut payload = Map::new();
        payload.insert("metadata".into(), Value::Object(metadata));
        payload.insert("content".into(), Value::String(content.into()));
        Self {
            id: Value::Null,
            score,
            payload,
        }
    }

    /// Non-empty `metadata` object of the payload, if any.
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.payload
            .get("metadata")
            .and_then(Value::as_object)
            .filter(|meta| !meta.is_empty())
    }

    /// Item name from the metadata.
    pub fn title(&self) -> Option<&str> {
        self.metadata()
            .and_then(|meta| meta.get("name"))
            .and_then(Value::as_str)
    }

    /// Passage text; empty when the payload has none.
    pub fn content(&self) -> &str {
        self.payload
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// One organic result from the web-search provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResult {
    /// Page title.
    #[serde(default)]
    pub title: Option<String>,
    /// Page URL.
    #[serde(default)]
    pub link: Option<String>,
    /// Result snippet.
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Knowledge source that supplied the context for an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLabel {
    /// Curated reference-manager collection; needs a confident top hit.
    References,
    /// Personal notes collection; any hit qualifies.
    Notes,
    /// Open web search.
    Web,
    /// Nothing usable was found.
    None,
}

impl SourceLabel {
    /// Whether this label names one of the vector collections.
    pub fn is_knowledge_base(self) -> bool {
        matches!(self, SourceLabel::References | SourceLabel::Notes)
    }
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceLabel::References => "References",
            SourceLabel::Notes => "Notes",
            SourceLabel::Web => "Web",
            SourceLabel::None => "No source",
        };
        f.write_str(label)
    }
}

/// Retrieved material backing one answer; never mixes provenance kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    /// Hits from one vector collection.
    Knowledge(Vec<SearchHit>),
    /// Results from the web-search provider.
    Web(Vec<WebResult>),
}

impl Evidence {
    /// Raw payloads kept in the session's last-result cache.
    pub fn raw_payloads(&self) -> Vec<Value> {
        match self {
            Evidence::Knowledge(hits) => hits
                .iter()
                .map(|hit| Value::Object(hit.payload.clone()))
                .collect(),
            Evidence::Web(results) => results
                .iter()
                .filter_map(|result| serde_json::to_value(result).ok())
                .collect(),
        }
    }

    /// Number of retrieved items.
    pub fn len(&self) -> usize {
        match self {
            Evidence::Knowledge(hits) => hits.len(),
            Evidence::Web(results) => results.len(),
        }
    }

    /// Whether nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Final packaged answer handed to front-ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    /// Displayable answer or explanation.
    pub answer: String,
    /// Source that supplied the context.
    pub source: SourceLabel,
    /// Names of the retrieved items, in retrieval order.
    pub provenance: Vec<String>,
}
