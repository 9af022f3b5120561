use crate::config::ApiConfig;
use crate::error::MetadataError;
use crate::metadata::DicomMetadata;
use crate::pipeline::MetadataPipeline;
use anyhow::{Context, Result};
use axum::{
    extract::rejection::JsonRejection,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MetadataPipeline>,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// HTTP-mapped failure: status, machine code, and message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// The original system mapped every pipeline failure to 500; here the
/// taxonomy is surfaced: not-found is 404, bad paths and bad payloads are
/// 400, everything else stays 500.
impl From<MetadataError> for ApiError {
    fn from(err: MetadataError) -> Self {
        let (status, code) = match &err {
            MetadataError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            MetadataError::InvalidPath(_) => (StatusCode::BAD_REQUEST, "INVALID_PATH"),
            MetadataError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
            MetadataError::AccessDenied(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ACCESS_DENIED"),
            MetadataError::Transport { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "TRANSPORT"),
            MetadataError::Extraction(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXTRACTION"),
        };

        if status.is_server_error() {
            error!(error = %err, "request failed");
        }

        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Query parameters carrying the storage path
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub s3_path: Option<String>,
}

impl PathQuery {
    fn require(self) -> Result<String, ApiError> {
        self.s3_path
            .ok_or_else(|| ApiError::bad_request("missing required query parameter: s3_path"))
    }
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health))
        .route("/dicom-metadata", get(dicom_metadata))
        .route("/upload-json-to-s3", post(upload_json_to_s3))
        .route("/fetch-dicom-metadata", get(fetch_dicom_metadata))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "The server is running"
    }))
}

/// Extract metadata from a DICOM file in the blob store.
#[instrument(skip(state))]
async fn dicom_metadata(
    State(state): State<AppState>,
    Query(params): Query<PathQuery>,
) -> Result<Json<DicomMetadata>, ApiError> {
    let path = params.require()?;
    let record = state.pipeline.extract_from_blob(&path).await?;
    Ok(Json(record))
}

/// Persist an already-extracted record to both stores.
#[instrument(skip(state, body))]
async fn upload_json_to_s3(
    State(state): State<AppState>,
    body: Result<Json<DicomMetadata>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(record) = body
        .map_err(|rejection| ApiError::bad_request(format!("invalid request body: {rejection}")))?;

    state.pipeline.persist(&record).await?;

    Ok(StatusCode::OK)
}

/// Look up a previously indexed record. Unknown identifiers are an explicit
/// 404, not an empty 200.
#[instrument(skip(state))]
async fn fetch_dicom_metadata(
    State(state): State<AppState>,
    Query(params): Query<PathQuery>,
) -> Result<Json<DicomMetadata>, ApiError> {
    let path = params.require()?;

    match state.pipeline.lookup(&path).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::not_found(format!(
            "no metadata indexed for {path}"
        ))),
    }
}

/// Start the HTTP API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}
