//! Qdrant REST search client.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::VectorSearch;
use crate::config::Settings;
use crate::error::ServiceError;
use crate::types::SearchHit;

const SERVICE: &str = "Qdrant";

/// Blocking client for `POST /collections/{name}/points/search`.
pub struct QdrantSearch {
    client: Client,
    base_url: Option<String>,
}

impl QdrantSearch {
    /// Builds a new Qdrant search client.
    ///
    /// `base_url` of `None` yields a client whose searches always come back
    /// empty, mirroring an unreachable server.
    pub fn new(
        base_url: Option<&str>,
        api_key: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.map(str::trim).filter(|key| !key.is_empty()) {
            let value = HeaderValue::from_str(key).map_err(|_| ServiceError::Unconfigured {
                service: SERVICE,
                reason: "API key contains invalid header characters".into(),
            })?;
            headers.insert("api-key", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| ServiceError::Transport {
                service: SERVICE,
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    /// Builds the client from resolved settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Self::new(
            settings.qdrant_url.as_deref(),
            settings.qdrant_api_key.as_deref(),
            settings.http_timeout,
        )
    }

    /// Configured endpoint, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Runs one search and surfaces every failure.
    pub fn try_search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        let base = self.base_url.as_deref().ok_or_else(|| ServiceError::Unconfigured {
            service: SERVICE,
            reason: "no QDRANT_URL set".into(),
        })?;
        let url = search_url(base, collection)?;
        let request = SearchRequest {
            vector,
            limit: limit.max(1),
            with_payload: true,
        };
        let resp = self
            .client
            .post(url)
            .json(&request)
            .send()
            .map_err(|source| ServiceError::Transport {
                service: SERVICE,
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ServiceError::Status {
                service: SERVICE,
                status,
                body,
            });
        }
        let parsed: SearchResponse = resp.json().map_err(|err| ServiceError::Decode {
            service: SERVICE,
            message: err.to_string(),
        })?;
        Ok(parsed.into_hits())
    }
}

impl VectorSearch for QdrantSearch {
    fn search(&self, collection: &str, vector: &[f32], limit: usize) -> Vec<SearchHit> {
        if vector.is_empty() {
            return Vec::new();
        }
        match self.try_search(collection, vector, limit) {
            Ok(hits) => {
                debug!(collection, hits = hits.len(), "vector search finished");
                hits
            }
            Err(err) => {
                warn!(collection, error = %err, "vector search failed; continuing without hits");
                Vec::new()
            }
        }
    }
}

/// Appends `collections/{name}/points/search`, percent-encoding the name.
fn search_url(base: &str, collection: &str) -> Result<Url, ServiceError> {
    let invalid = |reason: String| ServiceError::Unconfigured {
        service: SERVICE,
        reason,
    };
    let mut url = Url::parse(base).map_err(|err| invalid(format!("invalid QDRANT_URL: {err}")))?;
    url.path_segments_mut()
        .map_err(|_| invalid(format!("QDRANT_URL {base} cannot carry a path")))?
        .pop_if_empty()
        .extend(["collections", collection, "points", "search"]);
    Ok(url)
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchHit>,
}

impl SearchResponse {
    fn into_hits(self) -> Vec<SearchHit> {
        let mut hits = self.result;
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits
    }
}
