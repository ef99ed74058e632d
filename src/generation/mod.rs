//! Grounded prompt construction and the interchangeable answer backends.

pub mod ollama;
pub mod openai;

use tracing::{info, warn};

use crate::config::{BackendChoice, Settings};
use crate::error::{GenerationError, ServiceError};

pub use ollama::OllamaBackend;
pub use openai::OpenAiChatBackend;

/// Trait implemented by concrete text-generation backends.
pub trait AnswerBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Produces an answer for a fully rendered prompt.
    fn answer(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Builds the grounded prompt from the context block and the literal question.
pub fn build_prompt(question: &str, context: &str, language: &str) -> String {
    format!(
        "Context information:\n{context}\n\n\
         Question: {question}\n\n\
         Answer requirements:\n\
         - Answer based EXCLUSIVELY on the documents above; the documents are always right\n\
         - Keep the domain terminology\n\
         - Answer in {language}"
    )
}

/// Converts a generation outcome into the string shown to the user.
pub fn render_answer(outcome: Result<String, GenerationError>) -> String {
    match outcome {
        Ok(answer) => answer,
        Err(err @ GenerationError::Unavailable { .. }) => err.to_string(),
        Err(err) => format!("Error: {err}"),
    }
}

/// Holds one backend per [`BackendChoice`].
pub struct AnswerGenerator {
    cloud: Box<dyn AnswerBackend>,
    local: Box<dyn AnswerBackend>,
}

impl AnswerGenerator {
    /// Pairs a cloud and a local backend.
    pub fn new(cloud: Box<dyn AnswerBackend>, local: Box<dyn AnswerBackend>) -> Self {
        Self { cloud, local }
    }

    /// OpenAI chat completions for the cloud, Ollama for local answers.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Ok(Self::new(
            Box::new(OpenAiChatBackend::from_settings(settings)?),
            Box::new(OllamaBackend::from_settings(settings)?),
        ))
    }

    /// Runs the selected backend; failures stay structured.
    pub fn generate(&self, prompt: &str, choice: BackendChoice) -> Result<String, GenerationError> {
        let backend = match choice {
            BackendChoice::Cloud => self.cloud.as_ref(),
            BackendChoice::Local => self.local.as_ref(),
        };
        info!(backend = backend.name(), "generating answer");
        let outcome = backend.answer(prompt);
        if let Err(err) = &outcome {
            warn!(backend = backend.name(), error = %err, "answer generation failed");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    /// `None` fails with a backend error.
    struct Canned(Option<&'static str>);

    impl AnswerBackend for Canned {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn answer(&self, _prompt: &str) -> Result<String, GenerationError> {
            match self.0 {
                Some(text) => Ok(text.to_string()),
                None => Err(failing()),
            }
        }
    }

    fn failing() -> GenerationError {
        GenerationError::Backend(ServiceError::Status {
            service: "Ollama",
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "model crashed".into(),
        })
    }

    #[test]
    fn prompt_embeds_context_question_and_language() {
        let prompt = build_prompt("What is TLS?", "Source 1 (Notes): [Title: t]\nbody", "German");
        assert!(prompt.starts_with("Context information:\nSource 1 (Notes)"));
        assert!(prompt.contains("Question: What is TLS?"));
        assert!(prompt.contains("EXCLUSIVELY"));
        assert!(prompt.ends_with("- Answer in German"));
    }

    #[test]
    fn choice_selects_backend() {
        let generator = AnswerGenerator::new(
            Box::new(Canned(Some("cloud answer"))),
            Box::new(Canned(Some("local answer"))),
        );
        assert_eq!(
            generator.generate("p", BackendChoice::Cloud).expect("cloud"),
            "cloud answer"
        );
        assert_eq!(
            generator.generate("p", BackendChoice::Local).expect("local"),
            "local answer"
        );
    }

    #[test]
    fn failures_render_as_non_empty_text() {
        let generator = AnswerGenerator::new(Box::new(Canned(None)), Box::new(Canned(None)));
        let rendered = render_answer(generator.generate("p", BackendChoice::Local));
        assert!(rendered.starts_with("Error: "));
        assert!(rendered.contains("model crashed"));

        let unavailable = render_answer(Err(GenerationError::Unavailable { backend: "OpenAI" }));
        assert_eq!(unavailable, "OpenAI backend unavailable");

        let empty = render_answer(Err(GenerationError::EmptyResponse { backend: "OpenAI" }));
        assert!(!empty.is_empty());
    }
}
