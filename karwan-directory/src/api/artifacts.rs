//! Share reference, QR code and PDF for a stored profile
//!
//! Rendering is CPU-bound and runs on the blocking pool.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::render::RenderError;
use crate::AppState;

/// All artifacts in one JSON body; binary parts are base64
#[derive(Debug, Serialize)]
pub struct ArtifactsResponse {
    pub share_reference: String,
    pub visual_code_png: String,
    pub document_pdf: String,
    pub document_filename: String,
}

/// GET /api/profiles/:id/artifacts
pub async fn get_artifacts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ArtifactsResponse>> {
    let profile = state.directory.get_profile(id).await?;
    let filename = document_filename(&profile.full_name);

    let directory = state.directory.clone();
    let base_url = state.base_url.clone();
    let artifacts = render_blocking(move || directory.render_artifacts(&profile, &base_url)).await?;

    let engine = base64::engine::general_purpose::STANDARD;
    Ok(Json(ArtifactsResponse {
        share_reference: artifacts.share_reference,
        visual_code_png: engine.encode(&artifacts.visual_code),
        document_pdf: engine.encode(&artifacts.document),
        document_filename: filename,
    }))
}

/// GET /api/profiles/:id/code.png
pub async fn get_code(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let profile = state.directory.get_profile(id).await?;

    let directory = state.directory.clone();
    let base_url = state.base_url.clone();
    let png = render_blocking(move || directory.renderer().render_code(&profile, &base_url)).await?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// GET /api/profiles/:id/document.pdf
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let profile = state.directory.get_profile(id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        document_filename(&profile.full_name)
    );

    let directory = state.directory.clone();
    let base_url = state.base_url.clone();
    let pdf =
        render_blocking(move || directory.renderer().render_document(&profile, &base_url)).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

async fn render_blocking<T, F>(render: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, RenderError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(render)
        .await
        .map_err(|e| ApiError::Internal(format!("render task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// `<full name>_profile.pdf` with anything outside `[A-Za-z0-9_-]` replaced
pub fn document_filename(full_name: &str) -> String {
    let mut stem: String = full_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.chars().all(|c| c == '_') {
        stem = "member".to_string();
    }

    format!("{}_profile.pdf", stem)
}
