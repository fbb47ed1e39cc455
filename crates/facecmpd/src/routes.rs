//! HTTP surface: routing, multipart extraction and error responses.

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use facecmp_core::{
    parse_threshold, ComparisonPipeline, ComparisonResult, ErrorClass, PipelineError, UploadedFile,
};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Level;

const SOURCE_FIELD: &str = "image_source";
const TARGET_FIELD: &str = "image_target";
const THRESHOLD_FIELD: &str = "similarity_threshold";

/// State shared by all handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pipeline: ComparisonPipeline,
    project_name: Arc<str>,
    api_prefix: Arc<str>,
}

impl AppState {
    pub fn new(pipeline: ComparisonPipeline, project_name: &str, api_prefix: &str) -> Self {
        Self {
            pipeline,
            project_name: Arc::from(project_name),
            api_prefix: Arc::from(api_prefix),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, body_limit: usize) -> Router {
    let compare_path = format!("{}/compare-faces/", state.api_prefix);
    let compare_path_bare = format!("{}/compare-faces", state.api_prefix);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(&compare_path, post(compare_faces))
        .route(&compare_path_bare, post(compare_faces))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error response body: `{"detail": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Wraps [`PipelineError`] so handlers can return it directly.
#[derive(Debug)]
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let level = response_log_level(self.0.class());
        if level == Level::ERROR {
            tracing::error!(status = status.as_u16(), error = %self.0, "comparison failed")
        } else if level == Level::INFO {
            tracing::info!(status = status.as_u16(), error = %self.0, "request rejected")
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "comparison failed")
        }
        let body = ErrorBody {
            detail: self.0.detail(),
        };
        (status, Json(body)).into_response()
    }
}

/// Provider failures are already logged at error where they happen.
fn response_log_level(class: ErrorClass) -> Level {
    match class {
        ErrorClass::ClientInput => Level::INFO,
        ErrorClass::ExternalService => Level::DEBUG,
        ErrorClass::Unexpected => Level::ERROR,
    }
}

async fn root(State(state): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let base = format!("http://{host}");
    Json(serde_json::json!({
        "message": format!("Welcome to the {}", state.project_name),
        "description": "Compare the faces found in two uploaded images",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "compare_faces": format!("{base}{}/compare-faces/", state.api_prefix),
            "health": format!("{base}/health"),
        },
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// A multipart file field, fully buffered.
struct FilePart {
    filename: String,
    content_type: Option<String>,
    data: axum::body::Bytes,
}

impl FilePart {
    fn into_upload(self) -> UploadedFile<Cursor<axum::body::Bytes>> {
        UploadedFile::new(self.filename, self.content_type, Cursor::new(self.data))
    }
}

async fn compare_faces(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ComparisonResult>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        PipelineError::InvalidRequest(format!("invalid query string: {}", rejection.body_text()))
    })?;
    // A repeated key keeps its last value.
    let query_threshold = query
        .into_iter()
        .rev()
        .find(|(key, _)| key == THRESHOLD_FIELD)
        .map(|(_, value)| value);
    let mut multipart = multipart.map_err(|rejection| {
        PipelineError::InvalidRequest(format!(
            "expected a multipart/form-data body: {}",
            rejection.body_text()
        ))
    })?;

    let max_mb = state.pipeline.limits().max_mb();
    let mut source = None;
    let mut target = None;
    let mut form_threshold = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_mb))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(SOURCE_FIELD) => source = Some(read_file(field, max_mb).await?),
            Some(TARGET_FIELD) => target = Some(read_file(field, max_mb).await?),
            Some(THRESHOLD_FIELD) => {
                form_threshold = Some(field.text().await.map_err(|e| multipart_error(e, max_mb))?)
            }
            other => tracing::debug!(field = ?other, "ignoring unknown form field"),
        }
    }

    let source = source.ok_or_else(|| missing_field(SOURCE_FIELD))?;
    let target = target.ok_or_else(|| missing_field(TARGET_FIELD))?;
    let threshold = parse_threshold(
        form_threshold
            .as_deref()
            .or(query_threshold.as_deref()),
    )?;

    let result = state
        .pipeline
        .run(source.into_upload(), target.into_upload(), threshold)
        .await?;
    Ok(Json(result))
}

async fn read_file(field: Field<'_>, max_mb: u64) -> Result<FilePart, PipelineError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);
    let data = field.bytes().await.map_err(|e| multipart_error(e, max_mb))?;
    Ok(FilePart {
        filename,
        content_type,
        data,
    })
}

fn multipart_error(e: MultipartError, max_mb: u64) -> PipelineError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PipelineError::PayloadTooLarge { max_mb }
    } else {
        PipelineError::InvalidRequest(format!("invalid multipart body: {}", e.body_text()))
    }
}

fn missing_field(name: &str) -> PipelineError {
    PipelineError::InvalidRequest(format!("{name} is required"))
}
