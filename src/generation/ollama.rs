//! Local model-server backend (Ollama `/api/generate`).

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::AnswerBackend;
use crate::config::Settings;
use crate::error::{GenerationError, ServiceError};

const BACKEND: &str = "Ollama";
const TEMPERATURE: f32 = 0.5;
const NUM_PREDICT: usize = 1000;
/// Returned when the server answers without a `response` field.
pub const NO_ANSWER: &str = "No answer received.";

/// Non-streaming client for a local Ollama server.
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaBackend {
    /// Builds the backend for `endpoint` (the full generate URL).
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ServiceError::Transport {
                service: BACKEND,
                source,
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
        })
    }

    /// Builds the backend from resolved settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Self::new(&settings.ollama_url, &settings.ollama_model, settings.http_timeout)
    }
}

impl AnswerBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn answer(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: SamplingOptions {
                temperature: TEMPERATURE,
                num_predict: NUM_PREDICT,
            },
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|source| ServiceError::Transport {
                service: BACKEND,
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ServiceError::Status {
                service: BACKEND,
                status,
                body,
            }
            .into());
        }
        let parsed: GenerateResponse = resp.json().map_err(|err| ServiceError::Decode {
            service: BACKEND,
            message: err.to_string(),
        })?;
        parsed.into_answer()
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct SamplingOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

impl GenerateResponse {
    fn into_answer(self) -> Result<String, GenerationError> {
        let Some(text) = self.response else {
            return Ok(NO_ANSWER.to_string());
        };
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse { backend: BACKEND });
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_non_streaming_with_sampling_options() {
        let request = GenerateRequest {
            model: "mistral",
            prompt: "p",
            stream: false,
            options: SamplingOptions {
                temperature: TEMPERATURE,
                num_predict: NUM_PREDICT,
            },
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["stream"], false);
        assert_eq!(json["model"], "mistral");
        assert_eq!(json["options"]["num_predict"], 1000);
        assert_eq!(json["options"]["temperature"], 0.5);
    }

    #[test]
    fn missing_response_field_falls_back() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"model":"mistral","done":true}"#).expect("parse");
        assert_eq!(parsed.into_answer().expect("fallback"), NO_ANSWER);
    }

    #[test]
    fn blank_response_is_an_error_not_an_empty_answer() {
        for body in [
            r#"{"model":"mistral","response":"","done":true}"#,
            r#"{"model":"mistral","response":"  \n ","done":true}"#,
        ] {
            let parsed: GenerateResponse = serde_json::from_str(body).expect("parse");
            let outcome = parsed.into_answer();
            assert!(matches!(outcome, Err(GenerationError::EmptyResponse { .. })));
            assert!(!crate::generation::render_answer(outcome).is_empty());
        }
    }

    #[test]
    fn response_text_is_trimmed() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"response":" Antwort\n"}"#).expect("parse");
        assert_eq!(parsed.into_answer().expect("answer"), "Antwort");
    }

    #[test]
    fn unreachable_server_is_a_backend_error() {
        let backend = OllamaBackend::new(
            "http://127.0.0.1:9/api/generate",
            "mistral",
            Duration::from_millis(200),
        )
        .expect("backend");
        assert!(matches!(
            backend.answer("prompt"),
            Err(GenerationError::Backend(_))
        ));
    }
}
