//! HTTP request handlers
//!
//! Implementation of HTTP endpoints for the generation provider server.

use crate::{
    server::app::AppState,
    types::{ErrorResponse, HealthResponse, ImageRequest, ImageResponseData},
    utils::version,
};
use axum::{Json as RequestJson, extract::State, http::StatusCode, response::Json};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

/// Image generation endpoint
///
/// POST /api/txttoimage
///
/// Generates an image from the submitted prompt and returns it
/// base64-encoded with its metadata.
pub async fn text_to_image(
    State(state): State<AppState>,
    RequestJson(request): RequestJson<ImageRequest>,
) -> Result<Json<ImageResponseData>, (StatusCode, Json<ErrorResponse>)> {
    tracing::info!("Generating image for prompt: {}", request.prompt);

    let result = state
        .generator
        .generate(&request)
        .await
        .map_err(into_error_response)?;

    tracing::info!("Image generated, id: {}", result.image_id);

    let bytes = result.download().await.map_err(into_error_response)?;
    let image_base64 = BASE64.encode(bytes);

    Ok(Json(ImageResponseData {
        image_base64,
        image_type: result.file_ext.clone(),
        image_id: result.image_id.clone(),
        seed: result.seed,
        prompt: result.prompt.clone(),
        width: result.width,
        height: result.height,
        guidance_scale: result.guidance_scale,
        negative_prompt: result.negative_prompt.clone(),
        maybe_nsfw: result.maybe_nsfw,
    }))
}

/// Translate a generation failure into a client-facing response. The
/// three terminal kinds stay distinguishable: bad input, upstream auth
/// rejection, and upstream unavailability each get their own status.
fn into_error_response(error: crate::Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        crate::Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        crate::Error::Auth => StatusCode::BAD_GATEWAY,
        crate::Error::Connection(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    tracing::error!("Image generation failed: {}", error);
    (status, Json(ErrorResponse::new(error.to_string())))
}

/// Health check endpoint
///
/// GET /health
///
/// Reports whether the generator session has been initialized, plus
/// uptime and version.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();
    let response = HealthResponse::new(true, uptime, version::get_version());

    tracing::debug!("Health response: uptime={}s", uptime);
    Json(response)
}

/// Service banner
///
/// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Perchance generation provider running"
    }))
}
