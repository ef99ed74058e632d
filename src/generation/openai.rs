//! Hosted chat-completion backend (OpenAI `/chat/completions`).

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::AnswerBackend;
use crate::config::Settings;
use crate::error::{GenerationError, ServiceError};

const BACKEND: &str = "OpenAI";
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: usize = 1000;

/// Hosted chat-completion backend.
pub struct OpenAiChatBackend {
    api_key: Option<String>,
    model: String,
    endpoint: String,
    language: String,
    client: Client,
}

impl OpenAiChatBackend {
    /// Builds the backend; without a key every call reports it unavailable.
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: String,
        language: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ServiceError::Transport {
                service: BACKEND,
                source,
            })?;
        Ok(Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            language,
            client,
        })
    }

    /// Builds the backend from resolved settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Self::new(
            settings.openai_api_key.clone(),
            &settings.openai_base_url,
            settings.chat_model.clone(),
            settings.answer_language.clone(),
            settings.http_timeout,
        )
    }

    fn system_instruction(&self) -> String {
        format!("Answer precisely in {}.", self.language)
    }
}

impl AnswerBackend for OpenAiChatBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn answer(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::Unavailable { backend: BACKEND })?;
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| GenerationError::Unavailable { backend: BACKEND })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let system = self.system_instruction();
        let body = ChatRequest {
            model: &self.model,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .map_err(|source| ServiceError::Transport {
                service: BACKEND,
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ServiceError::Status {
                service: BACKEND,
                status,
                body: text,
            }
            .into());
        }
        let parsed: ChatResponse = resp.json().map_err(|err| ServiceError::Decode {
            service: BACKEND,
            message: err.to_string(),
        })?;
        parsed.into_answer()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_answer(self) -> Result<String, GenerationError> {
        self.choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(GenerationError::EmptyResponse { backend: BACKEND })
    }
}
