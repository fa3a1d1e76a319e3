use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::navigator::{NavigationDecision, NavigationRequest, Navigator};
use crate::spatial::parse_detections;
use crate::state::{SceneSnapshot, SceneTracker};
use crate::stt::Transcriber;
use crate::tts;

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub checkpoint: String,
    /// Raw detection entries; malformed ones are skipped, not rejected.
    #[serde(default)]
    pub detections: Vec<Value>,
    pub img_w: Option<f32>,
    pub img_h: Option<f32>,
    #[serde(default)]
    pub recent_instructions: Vec<String>,
    #[serde(default)]
    pub history_snippets: Vec<String>,
    /// Base64-encoded camera frame; enables vision mode when present.
    pub frame: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub endpoints: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SpeakResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: &str, code: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: error.to_string(), code: code.to_string() }),
    )
}

pub struct ApiState {
    pub navigator: Navigator,
    pub tracker: SceneTracker,
    pub transcriber: Transcriber,
}

pub fn create_api_router(state: ApiState, max_upload_mb: usize) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/plan", post(plan_handler))
        .route("/scene", get(scene_handler))
        .route("/reset", post(reset_handler))
        .route("/stt", post(stt_handler))
        .route("/tts", post(tts_handler))
        .with_state(Arc::new(state))
        .layer(DefaultBodyLimit::max(max_upload_mb * 1024 * 1024))
        .layer(CorsLayer::permissive())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Seer API is running".to_string(),
        endpoints: vec![
            "/plan".to_string(),
            "/scene".to_string(),
            "/reset".to_string(),
            "/stt".to_string(),
            "/tts".to_string(),
        ],
    })
}

async fn plan_handler(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<PlanRequest>,
) -> Result<Json<NavigationDecision>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    info!("Processing plan request {}: checkpoint='{}'", request_id, body.checkpoint);

    if body.checkpoint.trim().is_empty() {
        return Err(bad_request("No checkpoint provided", "MISSING_CHECKPOINT"));
    }

    let frame = match &body.frame {
        Some(encoded) => Some(general_purpose::STANDARD.decode(encoded).map_err(|e| {
            warn!("Plan request {} carried undecodable frame: {}", request_id, e);
            bad_request("Frame is not valid base64", "INVALID_FRAME")
        })?),
        None => None,
    };

    let detections = parse_detections(&body.detections);
    let request = NavigationRequest {
        checkpoint: body.checkpoint.trim().to_string(),
        detections,
        frame_width: body.img_w,
        frame_height: body.img_h,
        recent_instructions: body.recent_instructions,
        history_snippets: body.history_snippets,
        frame,
        language: body.language,
    };

    // decide() degrades internally; a plan request never 500s past this point.
    let decision = state.navigator.decide(&request).await;
    info!("Plan request {} resolved: '{}'", request_id, decision.instruction);
    Ok(Json(decision))
}

async fn scene_handler(State(state): State<Arc<ApiState>>) -> Json<SceneSnapshot> {
    Json(state.tracker.read())
}

async fn reset_handler(State(state): State<Arc<ApiState>>) -> Json<SceneSnapshot> {
    state.tracker.reset();
    Json(state.tracker.read())
}

async fn stt_handler(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let mut audio: Option<(Vec<u8>, String)> = None;
    let mut language: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| {
            error!("Failed to parse multipart field: {}", e);
            bad_request("Invalid multipart data", "INVALID_MULTIPART")
        })?
    {
        let field_name = field.name().unwrap_or("unknown").to_string();
        match field_name.as_str() {
            "audio" => {
                let filename = field.file_name().unwrap_or("audio.m4a").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    error!("Failed to read audio bytes: {}", e);
                    bad_request("Failed to read audio data", "AUDIO_READ_ERROR")
                })?;
                audio = Some((bytes.to_vec(), filename));
            }
            "language" => {
                language = Some(field.text().await.map_err(|e| {
                    error!("Failed to read language field: {}", e);
                    bad_request("Failed to read language field", "LANGUAGE_READ_ERROR")
                })?);
            }
            other => {
                warn!("Unknown field in multipart data: {}", other);
            }
        }
    }

    let (bytes, filename) = audio.ok_or_else(|| bad_request("No audio file provided", "MISSING_AUDIO"))?;
    if bytes.is_empty() {
        return Err(bad_request("Audio file is empty", "EMPTY_AUDIO"));
    }

    let text = state
        .transcriber
        .transcribe(bytes, &filename, language.as_deref())
        .await
        .map_err(|e| {
            error!("Transcription failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Speech-to-text failed: {e}"),
                    code: "STT_ERROR".to_string(),
                }),
            )
        })?;

    Ok(Json(TranscriptionResponse { text }))
}

async fn tts_handler(Json(body): Json<SpeakRequest>) -> Result<Json<SpeakResponse>, ApiError> {
    if body.text.is_empty() {
        return Err(bad_request("No text provided", "MISSING_TEXT"));
    }
    Ok(Json(SpeakResponse { text: tts::synthesize(&body.text) }))
}

pub async fn start_api_server(config: &ServerConfig, state: ApiState) -> anyhow::Result<()> {
    let app = create_api_router(state, config.max_upload_mb);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting Seer API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
