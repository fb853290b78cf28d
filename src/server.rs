//! HTTP boundary.
//!
//! Exposes the upload and search pipelines as a JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/documents/upload` | Multipart upload (`file`, `fileName`, `mimeType`) |
//! | `POST` | `/api/search` | Query the corpus (`{"query", "maxResults"}`) |
//! | `GET`  | `/api/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one envelope:
//!
//! ```json
//! { "error": { "code": "unsupported_document_type", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `unsupported_document_type` (400),
//! `too_many_requests` (429), `internal` (500), `search_failed` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{SearchError, UploadError};
use crate::models::{SearchRequest, SearchResponse, UploadReceipt};
use crate::pipeline::DocumentProcessor;
use crate::search::SearchEngine;

/// Largest accepted upload body (file plus multipart framing).
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    processor: Arc<DocumentProcessor>,
    search: Arc<SearchEngine>,
}

/// Start the HTTP server on the configured bind address.
///
/// Runs until the process is terminated. Returns an error if binding fails.
pub async fn run_server(
    config: &Config,
    processor: Arc<DocumentProcessor>,
    search: Arc<SearchEngine>,
) -> anyhow::Result<()> {
    let state = AppState { processor, search };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/documents/upload", post(handle_upload))
        .route("/api/search", post(handle_search))
        .route("/api/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state);

    info!(bind = %config.server.bind, "server listening");

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
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

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match &err {
            UploadError::UnsupportedType(_) => {
                warn!(error = %err, "rejected upload");
                ApiError {
                    status: StatusCode::BAD_REQUEST,
                    code: "unsupported_document_type",
                    message: err.to_string(),
                }
            }
            UploadError::CapacityExceeded => {
                warn!("upload rejected: concurrency limit reached");
                ApiError {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    code: "too_many_requests",
                    message: err.to_string(),
                }
            }
            UploadError::Processing(cause) => {
                tracing::error!(error = %err, cause = ?cause, "error processing document");
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: err.to_string(),
                }
            }
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        tracing::error!(error = %err, "error performing search");
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "search_failed",
            message: format!("Search failed: {}", err),
        }
    }
}

// ============ GET /api/health ============

/// JSON response body for `GET /api/health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

/// Health check used by load balancers and monitoring tools.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/documents/upload ============

/// Multipart upload handler.
///
/// Accepts a `file` part with the raw document bytes plus optional
/// `fileName` and `mimeType` text parts. Missing metadata falls back to
/// `"unknown"` / `"application/octet-stream"`, which the pipeline will
/// reject as unsupported.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, ApiError> {
    let mut file: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut mime_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read file part: {}", e)))?;
                file = Some(bytes.to_vec());
            }
            "fileName" => {
                file_name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("failed to read fileName: {}", e)))?,
                );
            }
            "mimeType" => {
                mime_type = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("failed to read mimeType: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| bad_request("multipart field 'file' is required"))?;
    let file_name = file_name.unwrap_or_else(|| "unknown".to_string());
    let mime_type = mime_type.unwrap_or_else(|| "application/octet-stream".to_string());

    info!(%file_name, %mime_type, "received document upload request");

    let receipt = state.processor.process(file_name, mime_type, file).await?;
    Ok(Json(receipt))
}

// ============ POST /api/search ============

/// Search handler.
async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    info!(query = %request.query, "received search request");
    let response = state
        .search
        .search(&request.query, request.max_results)
        .await?;
    Ok(Json(response))
}
