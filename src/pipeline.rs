//! End-to-end question answering: embed, arbitrate, retrieve, assemble,
//! generate, package.
//!
//! The pipeline never returns an error. Every failure is absorbed by the stage
//! that hit it and ends up as a degraded but displayable [`AnswerResult`].

use serde_json::Value;
use tracing::{info, warn};

use crate::arbitration::SourceArbitrator;
use crate::config::{BackendChoice, Settings};
use crate::context::assemble;
use crate::embedder::{Embedder, OpenAiEmbedder};
use crate::error::ServiceError;
use crate::generation::{build_prompt, render_answer, AnswerGenerator};
use crate::types::{AnswerResult, Evidence, SourceLabel, WebResult, UNKNOWN_TITLE};
use crate::vector_search::{QdrantSearch, VectorSearch};
use crate::web_search::{SerperSearch, WebSearch};

/// Answer returned when no source produced anything.
pub const NO_INFORMATION: &str = "No relevant information found.";
/// Rejection message for blank questions, shared by every front-end.
pub const EMPTY_QUESTION: &str = "Please enter a question!";

/// Per-session state threaded through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Session {
    last_payloads: Vec<Value>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw payloads behind the most recent answer, for debugging.
    pub fn last_payloads(&self) -> &[Value] {
        &self.last_payloads
    }

    fn record(&mut self, payloads: Vec<Value>) {
        self.last_payloads = payloads;
    }
}

/// Orchestrates the retrieval-and-generation chain.
pub struct QuestionAnsweringPipeline {
    embedder: Box<dyn Embedder>,
    vectors: Box<dyn VectorSearch>,
    web: Box<dyn WebSearch>,
    arbitrator: SourceArbitrator,
    generator: AnswerGenerator,
    language: String,
    web_results: usize,
}

impl QuestionAnsweringPipeline {
    /// Wires the pipeline from its collaborators.
    pub fn new(
        embedder: Box<dyn Embedder>,
        vectors: Box<dyn VectorSearch>,
        web: Box<dyn WebSearch>,
        arbitrator: SourceArbitrator,
        generator: AnswerGenerator,
    ) -> Self {
        Self {
            embedder,
            vectors,
            web,
            arbitrator,
            generator,
            language: Settings::default().answer_language,
            web_results: Settings::default().web_results,
        }
    }

    /// Overrides the answer language placed in the prompt.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Overrides how many web results are fetched on fallback.
    pub fn with_web_results(mut self, count: usize) -> Self {
        self.web_results = count.max(1);
        self
    }

    /// Builds the production pipeline (OpenAI, Qdrant, Serper, Ollama).
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Ok(Self::new(
            Box::new(OpenAiEmbedder::from_settings(settings)?),
            Box::new(QdrantSearch::from_settings(settings)?),
            Box::new(SerperSearch::from_settings(settings)?),
            SourceArbitrator::from_settings(settings),
            AnswerGenerator::from_settings(settings)?,
        )
        .with_language(settings.answer_language.clone())
        .with_web_results(settings.web_results))
    }

    /// Answers `question` and records the retrieved payloads in `session`.
    pub fn answer(
        &self,
        session: &mut Session,
        question: &str,
        backend: BackendChoice,
    ) -> AnswerResult {
        let vector = match self.embedder.embed(question) {
            Ok(vector) => vector,
            Err(err) => {
                warn!(error = %err, "embedding failed");
                Vec::new()
            }
        };
        if vector.is_empty() {
            session.record(Vec::new());
            return no_information();
        }

        let arbitration = self.arbitrator.choose_source(self.vectors.as_ref(), &vector);
        let source = arbitration.source;
        let (evidence, provenance) = if source == SourceLabel::Web {
            let results = self.web_search(question);
            if results.is_empty() {
                session.record(Vec::new());
                return no_information();
            }
            (Evidence::Web(results), Vec::new())
        } else {
            let provenance: Vec<String> = arbitration
                .hits
                .iter()
                .filter(|hit| hit.metadata().is_some())
                .map(|hit| hit.title().unwrap_or(UNKNOWN_TITLE).to_string())
                .collect();
            (Evidence::Knowledge(arbitration.hits), provenance)
        };

        session.record(evidence.raw_payloads());
        let context = assemble(&evidence, source);
        let prompt = build_prompt(question, &context, &self.language);
        let answer = render_answer(self.generator.generate(&prompt, backend));
        info!(%source, items = evidence.len(), "question answered");
        AnswerResult {
            answer,
            source,
            provenance,
        }
    }

    /// Runs only the web-search branch.
    pub fn web_search(&self, question: &str) -> Vec<WebResult> {
        self.web.search(question, self.web_results)
    }

    /// Runs only the web-search branch with a caller-chosen result count.
    pub fn web_search_with(&self, question: &str, max_results: usize) -> Vec<WebResult> {
        self.web.search(question, max_results.max(1))
    }
}

fn no_information() -> AnswerResult {
    AnswerResult {
        answer: NO_INFORMATION.to_string(),
        source: SourceLabel::None,
        provenance: Vec::new(),
    }
}
