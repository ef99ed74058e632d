//! Web search through the Serper API.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::Settings;
use crate::error::ServiceError;
use crate::types::WebResult;

const SERVICE: &str = "Serper";

/// Fetches organic web results for a query.
pub trait WebSearch: Send + Sync {
    /// Returns at most `max_results` results, empty on any failure.
    fn search(&self, query: &str, max_results: usize) -> Vec<WebResult>;
}

/// Blocking Serper client.
pub struct SerperSearch {
    client: Client,
    endpoint: String,
    api_key: Option<HeaderValue>,
}

impl SerperSearch {
    /// Builds a new Serper client; a missing key disables searching.
    pub fn new(
        api_key: Option<&str>,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let api_key = match api_key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => Some(HeaderValue::from_str(key).map_err(|_| {
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
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
        })
    }

    /// Builds the client from resolved settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Self::new(
            settings.serper_api_key.as_deref(),
            &settings.serper_url,
            settings.http_timeout,
        )
    }

    /// Runs one search and surfaces every failure.
    pub fn try_search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>, ServiceError> {
        let key = self.api_key.as_ref().ok_or_else(|| ServiceError::Unconfigured {
            service: SERVICE,
            reason: "missing SERPER_API_KEY".into(),
        })?;
        let request = SerperRequest {
            q: query,
            num: max_results,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", key.clone())
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
        let parsed: SerperResponse = resp.json().map_err(|err| ServiceError::Decode {
            service: SERVICE,
            message: err.to_string(),
        })?;
        Ok(parsed.into_results(max_results))
    }
}

impl WebSearch for SerperSearch {
    fn search(&self, query: &str, max_results: usize) -> Vec<WebResult> {
        match self.try_search(query, max_results) {
            Ok(results) => {
                debug!(results = results.len(), "web search finished");
                results
            }
            Err(err) => {
                error!(error = %err, "web search failed");
                Vec::new()
            }
        }
    }
}

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<WebResult>,
}

impl SerperResponse {
    fn into_results(self, max_results: usize) -> Vec<WebResult> {
        let mut organic = self.organic;
        organic.truncate(max_results);
        organic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organic_results_are_truncated() {
        let parsed: SerperResponse = serde_json::from_str(
            r#"{"searchParameters":{"q":"tls"},"organic":[
                {"title":"One","link":"https://one.test","snippet":"a","position":1},
                {"title":"Two","link":"https://two.test","snippet":"b","position":2},
                {"title":"Three","link":"https://three.test","snippet":"c","position":3}
            ]}"#,
        )
        .expect("parse");
        let results = parsed.into_results(2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].title.as_deref(), Some("Two"));
    }

    #[test]
    fn missing_organic_list_means_no_results() {
        let parsed: SerperResponse = serde_json::from_str(r#"{"answerBox":{}}"#).expect("parse");
        assert!(parsed.into_results(3).is_empty());
    }

    #[test]
    fn missing_key_yields_empty_results() {
        let client = SerperSearch::new(None, "http://127.0.0.1:9/search", Duration::from_secs(1))
            .expect("client");
        assert!(client.search("zero trust", 3).is_empty());
    }
}
