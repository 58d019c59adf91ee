//! Report simplification endpoints.
//!
//! `POST /api/simplify` takes a multipart form (`text` plus an optional
//! image in `report` or `image`). `POST /api/simplify/json` takes the same
//! input as JSON with the image base64-encoded. Both run one pipeline pass
//! and map its outcome onto a status code.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SimplifyJsonRequest};
use crate::models::{FinalReport, RawInput};
use crate::pipeline::PipelineOutcome;

/// `POST /api/simplify`: multipart upload.
pub async fn simplify_upload(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FinalReport>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = ctx.max_upload_bytes;
    let read_error = |e: MultipartError| multipart_error(e, limit);

    let mut input = RawInput::default();
    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "text" => {
                input.text = Some(field.text().await.map_err(read_error)?);
            }
            "report" | "image" => {
                let bytes = field.bytes().await.map_err(read_error)?;
                if bytes.len() > limit {
                    return Err(ApiError::PayloadTooLarge { limit });
                }
                if !bytes.is_empty() {
                    input.image = Some(bytes.to_vec());
                }
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    run_pipeline(&ctx, input).await
}

/// `POST /api/simplify/json`: JSON body with optional base64 image.
pub async fn simplify_json(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SimplifyJsonRequest>, JsonRejection>,
) -> Result<Json<FinalReport>, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge {
                limit: ctx.max_upload_bytes,
            }
        } else {
            ApiError::BadRequest(e.body_text())
        }
    })?;

    let image = match payload.image.as_deref().map(str::trim) {
        Some(data) if !data.is_empty() => {
            let bytes = decode_data_url(data)
                .map_err(|e| ApiError::BadRequest(format!("Invalid image data: {e}")))?;
            if bytes.len() > ctx.max_upload_bytes {
                return Err(ApiError::PayloadTooLarge {
                    limit: ctx.max_upload_bytes,
                });
            }
            Some(bytes)
        }
        _ => None,
    };

    let input = RawInput {
        text: payload.text,
        image,
    };
    run_pipeline(&ctx, input).await
}

async fn run_pipeline(ctx: &ApiContext, input: RawInput) -> Result<Json<FinalReport>, ApiError> {
    outcome_to_response(ctx.pipeline.run(input).await)
}

/// Map a terminal pipeline state onto the HTTP contract.
pub fn outcome_to_response(outcome: PipelineOutcome) -> Result<Json<FinalReport>, ApiError> {
    match outcome {
        PipelineOutcome::Success(report) => Ok(Json(report)),
        PipelineOutcome::Rejected { reason } => Err(ApiError::Unprocessed(reason)),
        PipelineOutcome::InputError => Err(ApiError::NoInput),
        PipelineOutcome::UpstreamFailure { message, timeout: true } => Err(ApiError::Timeout(message)),
        PipelineOutcome::UpstreamFailure { message, .. } => Err(ApiError::Upstream(message)),
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Decode a base64 data URL (`data:image/png;base64,...`) or bare base64.
fn decode_data_url(data_url: &str) -> Result<Vec<u8>, String> {
    let base64_data = match data_url.find(',') {
        Some(idx) => &data_url[idx + 1..],
        None => data_url,
    };

    base64::engine::general_purpose::STANDARD
        .decode(base64_data.trim())
        .map_err(|e| format!("Base64 decode failed: {e}"))
}
