//! HTTP server for the chat service.
//!
//! Each request runs at most two sequential upstream calls: one search, then
//! (for chat) one model call. Handlers share only read-only state.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner and configuration flags |
//! | `GET`  | `/health` | Liveness and capability flags |
//! | `POST` | `/chat` | Search, then answer (model or fallback) |
//! | `POST` | `/chat/analyze` | Search and return statistics plus raw hits |
//! | `GET`  | `/chat/document/{document_id}` | Document passthrough (`?page=N`) |
//!
//! `/chat/` is accepted as an alias of `/chat`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `search_timeout` (500),
//! `search_unavailable` (500), `document_fetch_failed` (500).
//! Model failures never produce an error response.

use anyhow::Result;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};

use crate::analysis::analyze_results;
use crate::config::Config;
use crate::evidence::format_evidence;
use crate::generator::ResponseGenerator;
use crate::models::{
    AnalysisResponse, ChatRequest, ChatResponse, RequestError, RAW_RESULTS_LIMIT,
};
use crate::search::{SearchClient, SearchError};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    search: Arc<SearchClient>,
    generator: Arc<ResponseGenerator>,
}

impl AppState {
    /// Build state from configuration, creating the upstream clients.
    pub fn from_config(config: &Config) -> Result<Self> {
        let search = SearchClient::new(&config.search)?;
        let generator = ResponseGenerator::from_config(&config.llm)?;
        Ok(Self::new(config.clone(), search, generator))
    }

    /// Build state from explicit parts.
    pub fn new(config: Config, search: SearchClient, generator: ResponseGenerator) -> Self {
        Self {
            config: Arc::new(config),
            search: Arc::new(search),
            generator: Arc::new(generator),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/chat/", post(handle_chat))
        .route("/chat/analyze", post(handle_analyze))
        .route("/chat/document/{document_id}", get(handle_document))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` and serves until the process is terminated.
pub async fn run_server(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        search = %config.search.url,
        model_enabled = config.llm.is_configured(),
        "chat server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<RequestError> for AppError {
    fn from(e: RequestError) -> Self {
        bad_request(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        bad_request(e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        bad_request(e.body_text())
    }
}

/// Upstream search failures all map to a generic 500; the code tells them apart.
impl From<SearchError> for AppError {
    fn from(e: SearchError) -> Self {
        let code = match &e {
            SearchError::Timeout(_) => "search_timeout",
            SearchError::Unavailable { .. } => "search_unavailable",
            SearchError::DocumentFetchFailed { .. } => "document_fetch_failed",
        };
        warn!(code, error = %e, "search service call failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code,
            message: e.to_string(),
        }
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    search_service_connected: bool,
    search_service_url: String,
    llm_gateway_configured: bool,
    note: &'static str,
}

async fn handle_root(State(state): State<AppState>) -> Json<RootResponse> {
    let configured = state.generator.is_model_enabled();
    Json(RootResponse {
        message: "AI Conversational Agent is running",
        search_service_connected: true,
        search_service_url: state.config.search.url.clone(),
        llm_gateway_configured: configured,
        note: if configured {
            "Full AI functionality available"
        } else {
            "LLM responses will show search results even when not configured"
        },
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    search_service_url: String,
    llm_gateway_configured: bool,
    capabilities: Capabilities,
}

#[derive(Serialize)]
struct Capabilities {
    semantic_search: bool,
    ai_responses: bool,
    fallback_responses: bool,
}

/// Handler for `GET /health`. Used by load balancers and monitoring tools.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let configured = state.generator.is_model_enabled();
    Json(HealthResponse {
        status: "healthy",
        service: "chatbot",
        version: env!("CARGO_PKG_VERSION"),
        search_service_url: state.config.search.url.clone(),
        llm_gateway_configured: configured,
        capabilities: Capabilities {
            semantic_search: true,
            ai_responses: configured,
            fallback_responses: true,
        },
    })
}

// ============ POST /chat ============

/// Handler for `POST /chat`.
///
/// Validates before any upstream call. Search failures surface as errors;
/// model failures are absorbed into a fallback reply.
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload?;
    let top_k = request.validate(state.config.search.default_top_k)?;

    let span = request_span("chat", &request, top_k);
    async move {
        let results = state.search.search(&request.query, top_k).await?;
        let context = format_evidence(&results);
        let reply = state
            .generator
            .generate(&request.query, &context, &results)
            .await;

        info!(matches = results.len(), origin = ?reply.origin, "chat answered");
        Ok::<_, AppError>(Json(ChatResponse {
            reply: reply.text,
            context,
        }))
    }
    .instrument(span)
    .await
}

// ============ POST /chat/analyze ============

/// Handler for `POST /chat/analyze`. Same search as `/chat`, no generation.
async fn handle_analyze(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let Json(request) = payload?;
    let top_k = request.validate(state.config.search.default_top_k)?;

    let span = request_span("analyze", &request, top_k);
    async move {
        let mut results = state.search.search(&request.query, top_k).await?;
        let analysis = analyze_results(&request.query, &results);
        results.truncate(RAW_RESULTS_LIMIT);

        info!(matches = analysis.total_results, "analysis returned");
        Ok::<_, AppError>(Json(AnalysisResponse {
            analysis,
            raw_results: results,
            query: request.query,
        }))
    }
    .instrument(span)
    .await
}

// ============ GET /chat/document/{document_id} ============

#[derive(Deserialize)]
struct DocumentParams {
    page: Option<i64>,
}

/// Handler for `GET /chat/document/{document_id}`. Passes the upstream body
/// through unchanged.
async fn handle_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    params: Result<Query<DocumentParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Query(params) = params?;
    let document = state
        .search
        .fetch_document(&document_id, params.page)
        .await?;
    Ok(Json(document))
}

fn request_span(operation: &'static str, request: &ChatRequest, top_k: u32) -> tracing::Span {
    info_span!(
        "request",
        id = %uuid::Uuid::new_v4(),
        operation,
        top_k,
        user_id = request.user_id.as_deref().unwrap_or("-"),
    )
}
