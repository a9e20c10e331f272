//! HTTP request handlers

use crate::api::models::GenerateNoteRequest;
use crate::error::AppError;
use crate::AppState;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Expand or summarize clinical shorthand, streaming the generated text
#[utoipa::path(
    post,
    path = "/api/generate",
    request_body = GenerateNoteRequest,
    responses(
        (status = 200, description = "Generated note, streamed as it is produced", body = String, content_type = "text/plain"),
        (status = 400, description = "Invalid JSON or missing fields", body = String, content_type = "text/plain"),
        (status = 500, description = "Backend failed before producing output", body = String, content_type = "text/plain"),
    ),
    tag = "Notes"
)]
#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn generate_note(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = GenerateNoteRequest::parse(&body).map_err(|e| {
        warn!(error = %e, outcome = "rejected", "Invalid generation request");
        e
    })?;

    info!(mode = %request.mode, "Received note generation request");

    let relay = state.gateway.generate(request).await.map_err(|e| {
        error!(error = %e, outcome = "rejected", "Backend failed before streaming started");
        e
    })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(relay),
    )
        .into_response())
}
