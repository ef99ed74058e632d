//! OpenAI-based embedding client implementation.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Embedder;
use crate::config::Settings;
use crate::error::ServiceError;
use crate::types::EmbeddingVector;

const SERVICE: &str = "OpenAI embeddings";

/// Blocking embeddings client that talks to OpenAI-compatible endpoints.
///
/// Built without an API key it stays usable but every call fails with
/// [`ServiceError::Unconfigured`].
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: Option<HeaderValue>,
    model: String,
    dimensions: usize,
    max_retries: usize,
}

impl OpenAiEmbedder {
    /// Builds a new OpenAI embeddings client.
    pub fn new(
        api_key: Option<&str>,
        base_url: &str,
        model: &str,
        dimensions: usize,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, ServiceError> {
        let api_key = match api_key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => Some(HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                ServiceError::Unconfigured {
                    service: SERVICE,
                    reason: "API key contains invalid header characters".into(),
                }
            })?),
            None => None,
        };
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ServiceError::Transport {
                service: SERVICE,
                source,
            })?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            api_key,
            model: model.to_string(),
            dimensions,
            max_retries: max_retries.max(1),
        })
    }

    /// Builds the client from resolved settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Self::new(
            settings.openai_api_key.as_deref(),
            &settings.openai_base_url,
            &settings.embedding_model,
            settings.embedding_dimensions,
            settings.http_timeout,
            settings.max_retries,
        )
    }

    fn request_once(&self, auth: &HeaderValue, text: &str) -> Result<EmbeddingVector, ServiceError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimensions,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, auth.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
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
        let parsed: EmbeddingResponse = resp.json().map_err(|err| ServiceError::Decode {
            service: SERVICE,
            message: err.to_string(),
        })?;
        parsed.into_vector(self.dimensions)
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<EmbeddingVector, ServiceError> {
        let auth = self.api_key.as_ref().ok_or_else(|| ServiceError::Unconfigured {
            service: SERVICE,
            reason: "missing OpenAI API key".into(),
        })?;
        let mut attempt = 0usize;
        loop {
            match self.request_once(auth, text) {
                Ok(vector) => {
                    debug!(dimensions = vector.len(), "query embedded");
                    return Ok(vector);
                }
                Err(err) if err.is_transient() && attempt + 1 < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "retrying embedding request");
                    thread::sleep(retry_backoff(attempt));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl EmbeddingResponse {
    fn into_vector(mut self, expected: usize) -> Result<EmbeddingVector, ServiceError> {
        self.data.sort_by_key(|entry| entry.index);
        let vector = self
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| ServiceError::Decode {
                service: SERVICE,
                message: "response contained no embeddings".into(),
            })?;
        if vector.len() != expected {
            return Err(ServiceError::Dimension {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}
