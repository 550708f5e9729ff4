//! HTTP request handlers for the gateway API.
//!
//! Handlers only translate between HTTP and the gateway: request validation,
//! rate limiting and adapter dispatch all happen in [`Gateway`](gateway_routing::Gateway).
//! Validation failures become 400s, adapter failures come back as error
//! envelopes with status 500.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{Envelope, ModelInfo};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::{
    error::ApiError,
    extractors::{parse_json_body, RequestId},
    state::AppState,
};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Version
    pub version: String,
    /// Configured providers
    pub providers: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: state.gateway.len(),
    })
}

/// Describe every configured provider
#[instrument(skip(state))]
pub async fn list_models(State(state): State<AppState>) -> Json<BTreeMap<String, ModelInfo>> {
    Json(state.gateway.list_models())
}

/// `POST /api/:provider/generate`
#[instrument(skip(state, body))]
pub async fn generate(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    RequestId(request_id): RequestId,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload = payload_for(&state, &provider, &body)?;
    let envelope = state.gateway.generate_text(&provider, &payload).await?;
    Ok(envelope_response(envelope))
}

/// `POST /api/:provider/chat`
#[instrument(skip(state, body))]
pub async fn chat(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    RequestId(request_id): RequestId,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload = payload_for(&state, &provider, &body)?;
    let envelope = state.gateway.generate_chat(&provider, &payload).await?;
    Ok(envelope_response(envelope))
}

/// `POST /api/:provider/embed`
#[instrument(skip(state, body))]
pub async fn embed(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    RequestId(request_id): RequestId,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload = payload_for(&state, &provider, &body)?;
    let envelope = state.gateway.embed_text(&provider, &payload).await?;
    Ok(envelope_response(envelope))
}

/// `POST /api/:provider/moderate`
#[instrument(skip(state, body))]
pub async fn moderate(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    RequestId(request_id): RequestId,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload = payload_for(&state, &provider, &body)?;
    let envelope = state.gateway.moderate_content(&provider, &payload).await?;
    Ok(envelope_response(envelope))
}

/// `POST /api/:provider/analyze-image`, multipart with an `image` file part,
/// an optional `prompt` and optional JSON `options`
#[instrument(skip(state, multipart))]
pub async fn analyze_image(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    RequestId(request_id): RequestId,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    ensure_configured(&state, &provider)?;

    let upload = match multipart {
        Ok(multipart) => ImageUpload::read(multipart).await?,
        Err(rejection) => {
            debug!(reason = %rejection, "Request is not multipart");
            ImageUpload::default()
        }
    };

    let envelope = state
        .gateway
        .analyze_image(
            &provider,
            upload.image.as_deref(),
            upload.prompt.as_deref(),
            upload.options.as_ref(),
        )
        .await?;
    Ok(envelope_response(envelope))
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

#[derive(Debug, Default)]
struct ImageUpload {
    image: Option<Vec<u8>>,
    prompt: Option<String>,
    options: Option<Value>,
}

impl ImageUpload {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut upload = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match name.as_str() {
                "image" => {
                    upload.image = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
                }
                "prompt" => upload.prompt = Some(field.text().await.map_err(multipart_error)?),
                "options" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    if !text.trim().is_empty() {
                        let options = serde_json::from_str(&text).map_err(|e| {
                            ApiError::bad_request(format!("Invalid options JSON: {e}"))
                        })?;
                        upload.options = Some(options);
                    }
                }
                other => debug!(field = other, "Ignoring multipart field"),
            }
        }

        Ok(upload)
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    let code = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        "payload_too_large"
    } else {
        "bad_request"
    };
    ApiError::new(err.status(), code, err.body_text())
}

/// Unknown providers are rejected before the body is looked at
fn ensure_configured(state: &AppState, provider: &str) -> Result<(), ApiError> {
    if state.gateway.is_configured(provider) {
        Ok(())
    } else {
        Err(gateway_core::GatewayError::unknown_provider(provider).into())
    }
}

fn payload_for(state: &AppState, provider: &str, body: &Bytes) -> Result<Value, ApiError> {
    ensure_configured(state, provider)?;
    parse_json_body(body)
}

fn envelope_response<T: Serialize>(envelope: Envelope<T>) -> Response {
    match envelope {
        Envelope::Success(body) => (StatusCode::OK, Json(body)).into_response(),
        Envelope::Failure(failure) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(failure)).into_response()
        }
    }
}
