use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use kb_assistant::{
    telemetry, AnswerResult, BackendChoice, QuestionAnsweringPipeline, Session, SettingsArgs,
    WebResult, EMPTY_QUESTION,
};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "kb-assistant-server",
    about = "HTTP API around the knowledge-base question answering pipeline"
)]
struct ServerCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "KB_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Sessions kept in memory; the least recently used one is dropped first.
    #[arg(long, env = "KB_MAX_SESSIONS", default_value_t = 1024)]
    max_sessions: usize,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<QuestionAnsweringPipeline>,
    sessions: Arc<Mutex<LruCache<String, Session>>>,
}

impl AppState {
    fn new(pipeline: Arc<QuestionAnsweringPipeline>, max_sessions: NonZeroUsize) -> Self {
        Self {
            pipeline,
            sessions: Arc::new(Mutex::new(LruCache::new(max_sessions))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    question: String,
    #[serde(default)]
    backend: Option<BackendChoice>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebSearchRequest {
    question: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
struct WebSearchResponse {
    results: Vec<WebResult>,
}

#[derive(Debug, Serialize)]
struct PayloadsResponse {
    payloads: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = ServerCli::parse();
    telemetry::init_tracing(cli.verbose, cli.log_json);
    let settings = cli.settings.build_settings();
    let max_sessions = NonZeroUsize::new(cli.max_sessions)
        .ok_or_else(|| anyhow!("--max-sessions must be at least 1"))?;
    // Blocking HTTP clients must be built and dropped outside the async runtime.
    let pipeline = Arc::new(
        QuestionAnsweringPipeline::from_settings(&settings)
            .context("failed to build HTTP clients")?,
    );
    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    let state = AppState::new(Arc::clone(&pipeline), max_sessions);
    runtime.block_on(serve(addr, state))?;
    drop(runtime);
    drop(pipeline);
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/answer", post(answer_handler))
        .route("/v1/web-search", post(web_search_handler))
        .route("/v1/sessions/:id/last-payloads", get(last_payloads_handler))
        .with_state(state)
}

async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "kb-assistant-server listening");
    axum::serve(listener, app).await.context("server shutdown")?;
    Ok(())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn answer_handler(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResult>, ApiError> {
    let question = request.question.trim().to_string();
    if question.is_empty() {
        return Err(bad_request(EMPTY_QUESTION));
    }
    let backend = request.backend.unwrap_or_default();
    let session_id = request.session_id;
    let mut session = match &session_id {
        Some(id) => state.sessions.lock().await.pop(id).unwrap_or_default(),
        None => Session::new(),
    };
    let pipeline = Arc::clone(&state.pipeline);
    let (result, session) = tokio::task::spawn_blocking(move || {
        let result = pipeline.answer(&mut session, &question, backend);
        (result, session)
    })
    .await
    .map_err(|err| internal_error(anyhow!("answer task join error: {err}")))?;
    if let Some(id) = session_id {
        state.sessions.lock().await.put(id, session);
    }
    Ok(Json(result))
}

async fn web_search_handler(
    State(state): State<AppState>,
    Json(request): Json<WebSearchRequest>,
) -> Result<Json<WebSearchResponse>, ApiError> {
    let question = request.question.trim().to_string();
    if question.is_empty() {
        return Err(bad_request(EMPTY_QUESTION));
    }
    let pipeline = Arc::clone(&state.pipeline);
    let results = tokio::task::spawn_blocking(move || match request.max_results {
        Some(count) => pipeline.web_search_with(&question, count),
        None => pipeline.web_search(&question),
    })
    .await
    .map_err(|err| internal_error(anyhow!("web search task join error: {err}")))?;
    Ok(Json(WebSearchResponse { results }))
}

async fn last_payloads_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PayloadsResponse>, ApiError> {
    let mut sessions = state.sessions.lock().await;
    let session = sessions
        .get(&id)
        .ok_or_else(|| not_found(format!("unknown session {id}")))?;
    Ok(Json(PayloadsResponse {
        payloads: session.last_payloads().to_vec(),
    }))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}

fn not_found(message: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}

fn internal_error(err: anyhow::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            message: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use kb_assistant::{
        AnswerBackend, AnswerGenerator, Embedder, EmbeddingVector, GenerationError, SearchHit,
        ServiceError, Settings, SourceArbitrator, VectorSearch, WebSearch,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tower::ServiceExt;

    struct UnitEmbedder;

    impl Embedder for UnitEmbedder {
        fn embed(&self, _text: &str) -> Result<EmbeddingVector, ServiceError> {
            Ok(vec![0.1; 4])
        }
    }

    /// Only the reference collection has a (confident) hit.
    struct ReferencesOnly;

    impl VectorSearch for ReferencesOnly {
        fn search(&self, collection: &str, _vector: &[f32], _limit: usize) -> Vec<SearchHit> {
            if collection == "ZoteroNeu" {
                vec![SearchHit::new(0.9, "iso27001.pdf", "Annex A controls")]
            } else {
                Vec::new()
            }
        }
    }

    struct NumberedWeb;

    impl WebSearch for NumberedWeb {
        fn search(&self, _query: &str, max_results: usize) -> Vec<WebResult> {
            (1..=5)
                .map(|i| WebResult {
                    title: Some(format!("result {i}")),
                    link: None,
                    snippet: None,
                })
                .take(max_results)
                .collect()
        }
    }

    struct Fixed;

    impl AnswerBackend for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn answer(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("grounded answer".into())
        }
    }

    fn app(max_sessions: usize) -> Router {
        let pipeline = QuestionAnsweringPipeline::new(
            Box::new(UnitEmbedder),
            Box::new(ReferencesOnly),
            Box::new(NumberedWeb),
            SourceArbitrator::from_settings(&Settings::default()),
            AnswerGenerator::new(Box::new(Fixed), Box::new(Fixed)),
        );
        router(AppState::new(
            Arc::new(pipeline),
            NonZeroUsize::new(max_sessions).expect("capacity"),
        ))
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        let resp = ServiceExt::<Request<Body>>::oneshot(app.clone(), request)
            .await
            .expect("response");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let (status, _) = call(&app(4), "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn blank_questions_are_rejected() {
        let app = app(4);
        for uri in ["/v1/answer", "/v1/web-search"] {
            let (status, body) = call(&app, "POST", uri, Some(json!({ "question": "  " }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["message"], EMPTY_QUESTION);
        }
    }

    #[tokio::test]
    async fn answer_round_trips_through_session_payloads() {
        let app = app(4);
        let (status, body) = call(
            &app,
            "POST",
            "/v1/answer",
            Some(json!({ "question": "What is Annex A?", "session_id": "s1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "grounded answer");
        assert_eq!(body["source"], "references");
        assert_eq!(body["provenance"], json!(["iso27001.pdf"]));

        let (status, body) = call(&app, "GET", "/v1/sessions/s1/last-payloads", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payloads"][0]["content"], "Annex A controls");

        let (status, _) = call(&app, "GET", "/v1/sessions/nobody/last-payloads", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn least_recent_session_is_evicted() {
        let app = app(1);
        for id in ["first", "second"] {
            let (status, _) = call(
                &app,
                "POST",
                "/v1/answer",
                Some(json!({ "question": "q", "session_id": id })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = call(&app, "GET", "/v1/sessions/first/last-payloads", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "GET", "/v1/sessions/second/last-payloads", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn web_search_honours_max_results() {
        let app = app(4);
        let (status, body) = call(
            &app,
            "POST",
            "/v1/web-search",
            Some(json!({ "question": "tls", "max_results": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"].as_array().map(Vec::len), Some(1));

        let (_, body) =
            call(&app, "POST", "/v1/web-search", Some(json!({ "question": "tls" }))).await;
        assert_eq!(body["results"].as_array().map(Vec::len), Some(3));
    }
}
