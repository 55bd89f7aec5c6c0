//! API route handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use idxscan_core::report::{
    self, ChunkEntry, DigestCount, FileEntry, FileReferences, PrefixHistograms, Summary,
};
use idxscan_core::ScanSession;
use serde::{Deserialize, Serialize};

use crate::ApiError;

/// Shared application state
#[derive(Clone, Default)]
pub struct ApiState {
    session: Arc<ScanSession>,
}

impl ApiState {
    pub fn new(session: Arc<ScanSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<ScanSession> {
        &self.session
    }
}

/// Create API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/stats", get(stats_handler))
        .route("/api/digests", get(digests_handler))
        .route("/api/chunks", get(chunks_handler))
        .route("/api/files", get(files_handler))
        .route("/api/refchunks", get(refchunks_handler))
        .route("/api/accucounter", get(accucounter_handler))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunksQuery {
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefChunksQuery {
    pub filename: Option<String>,
}

async fn stats_handler(State(state): State<ApiState>) -> Json<Summary> {
    let reg = state.session.read();
    Json(Summary::of(&reg))
}

async fn digests_handler(State(state): State<ApiState>) -> Json<Vec<DigestCount>> {
    let reg = state.session.read();
    Json(report::digest_counts(&reg))
}

async fn chunks_handler(
    State(state): State<ApiState>,
    Query(query): Query<ChunksQuery>,
) -> Json<Vec<ChunkEntry>> {
    let reg = state.session.read();
    Json(report::chunks_with_prefix(&reg, &query.prefix))
}

async fn files_handler(State(state): State<ApiState>) -> Json<Vec<FileEntry>> {
    let reg = state.session.read();
    Json(report::file_entries(&reg))
}

async fn refchunks_handler(
    State(state): State<ApiState>,
    Query(query): Query<RefChunksQuery>,
) -> std::result::Result<Json<FileReferences>, ApiErrorResponse> {
    let filename = query
        .filename
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("missing filename parameter".to_string()))?;

    let reg = state.session.read();
    report::file_references(&reg, &filename)
        .map(Json)
        .ok_or_else(|| ApiError::FileNotFound(filename).into())
}

async fn accucounter_handler(State(state): State<ApiState>) -> Json<PrefixHistograms> {
    let reg = state.session.read();
    Json(report::prefix_histograms(&reg))
}

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

/// Error response wrapper for Axum
#[derive(Debug)]
pub struct ApiErrorResponse(ApiError);

impl From<ApiError> for ApiErrorResponse {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ApiError::FileNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}
