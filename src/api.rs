use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::labels::display_name;
use crate::metadata::DiseaseInfo;
use crate::pipeline::{round_confidence, ClassificationResult, Pipeline};

pub const NO_FILE_UPLOADED: &str = "No file uploaded";
pub const NO_FILE_SELECTED: &str = "No file selected";
pub const NOT_A_LEAF: &str = "Please upload a clear image of a plant leaf";
pub const INFERENCE_TIMED_OUT: &str = "Inference timed out";

pub struct AppState {
    pub pipeline: Pipeline,
    pub inference_timeout: Duration,
}

pub type SharedState = Arc<AppState>;

/// Body of every `/predict` reply. Success and error fields never appear together.
#[derive(Debug, Serialize, PartialEq)]
pub struct PredictResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<DiseaseInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            disease: None,
            confidence: None,
            image: None,
            info: None,
            error: Some(message.into()),
        }
    }
}

type PredictReply = (StatusCode, Json<PredictResponse>);

/// Malformed forms are 400, bodies over the limit 413, failed reads 500.
fn reject_multipart(error: MultipartError) -> PredictReply {
    reject(error.status(), error.body_text())
}

fn reject(status: StatusCode, message: impl Into<String>) -> PredictReply {
    let message = message.into();
    warn!("Prediction failed ({}): {}", status, message);
    (status, Json(PredictResponse::failure(message)))
}

pub fn router(state: SharedState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/predict", post(predict_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn health_check(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let model = if state.pipeline.has_model() {
        "loaded"
    } else {
        "mock"
    };
    Json(serde_json::json!({ "status": "healthy", "model": model }))
}

async fn predict_handler(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> PredictReply {
    let Ok(mut multipart) = multipart else {
        return reject(StatusCode::BAD_REQUEST, NO_FILE_UPLOADED);
    };

    let mut upload = None;

    // Process multipart form to find the file
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return reject_multipart(e),
        };

        if field.name() != Some("file") {
            continue;
        }
        // A `file` field without a filename is a plain form value, not an upload.
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };

        match field.bytes().await {
            Ok(bytes) => {
                upload = Some((filename, bytes));
                break;
            }
            Err(e) => return reject_multipart(e),
        }
    }

    let Some((filename, bytes)) = upload else {
        return reject(StatusCode::BAD_REQUEST, NO_FILE_UPLOADED);
    };
    if filename.is_empty() {
        return reject(StatusCode::BAD_REQUEST, NO_FILE_SELECTED);
    }

    debug!("Received {} ({} bytes)", filename, bytes.len());

    let timeout = state.inference_timeout;
    let task = tokio::task::spawn_blocking(move || state.pipeline.classify(&bytes, &filename));

    match tokio::time::timeout(timeout, task).await {
        Err(_) => reject(StatusCode::INTERNAL_SERVER_ERROR, INFERENCE_TIMED_OUT),
        Ok(Err(join_error)) => reject(StatusCode::INTERNAL_SERVER_ERROR, join_error.to_string()),
        Ok(Ok(Err(e))) => reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Ok(Ok(Ok(ClassificationResult::Rejected { .. }))) => {
            reject(StatusCode::BAD_REQUEST, NOT_A_LEAF)
        }
        Ok(Ok(Ok(ClassificationResult::Accepted {
            label,
            confidence,
            encoded_image,
            metadata,
        }))) => (
            StatusCode::OK,
            Json(PredictResponse {
                success: true,
                disease: Some(display_name(&label)),
                confidence: Some(round_confidence(confidence)),
                image: Some(format!("data:image/jpeg;base64,{}", encoded_image)),
                info: (!metadata.is_empty()).then_some(metadata),
                error: None,
            }),
        ),
    }
}
