//! Route handlers.
//!
//! `/chat` always answers 200 for a well-formed body; only the admin routes
//! map errors to status codes.

use crate::AppState;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use grounded_engine::{ChatRequest, ChatResponse};
use grounded_knowledge::{load_corpus, IndexStats, Retriever};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

type SharedState = Arc<AppState>;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
const DEFAULT_CORPUS_PATH: &str = "./data/rag_corpus";

/// Admin route failure, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<grounded_core::AppError> for ApiError {
    fn from(err: grounded_core::AppError) -> Self {
        tracing::error!("Admin request failed: {}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

// ============================================================================
// Health
// ============================================================================

pub fn health_routes() -> Router<SharedState> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ============================================================================
// Chat
// ============================================================================

pub fn chat_routes() -> Router<SharedState> {
    Router::new().route("/chat", post(chat))
}

async fn chat(State(state): State<SharedState>, Json(request): Json<ChatRequest>) -> Json<ChatResponse> {
    Json(state.engine.handle(&request).await)
}

// ============================================================================
// Admin
// ============================================================================

pub fn admin_routes() -> Router<SharedState> {
    Router::new()
        .route("/admin/rag/ingest", post(ingest))
        .route("/admin/rag/stats", get(stats))
}

#[derive(Debug, Deserialize)]
pub struct IngestParams {
    path: Option<PathBuf>,
    /// Only files whose path contains this substring
    include: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub ingested: usize,
    pub files: Vec<String>,
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if token != Some(state.admin_token.as_str()) {
        tracing::warn!("Rejected admin request with invalid token");
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid admin token"));
    }
    Ok(())
}

fn retriever(state: &AppState) -> Result<Arc<Retriever>, ApiError> {
    state.retriever.clone().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "retrieval index is not available",
        )
    })
}

async fn ingest(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<IngestParams>,
) -> Result<Json<IngestResponse>, ApiError> {
    authorize(&state, &headers)?;
    let retriever = retriever(&state)?;

    let dir = params
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CORPUS_PATH));
    if !dir.is_dir() {
        tracing::info!("Corpus directory {:?} not found; nothing to ingest", dir);
        return Ok(Json(IngestResponse {
            ingested: 0,
            files: Vec::new(),
        }));
    }

    let include = params.include;
    let corpus = tokio::task::spawn_blocking(move || load_corpus(&dir, include.as_deref()))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    let files = corpus
        .files
        .iter()
        .map(|f| f.display().to_string())
        .collect();
    let ingested = retriever.ingest(corpus.documents).await?;

    Ok(Json(IngestResponse { ingested, files }))
}

async fn stats(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<IndexStats>, ApiError> {
    authorize(&state, &headers)?;
    Ok(Json(retriever(&state)?.stats()?))
}
