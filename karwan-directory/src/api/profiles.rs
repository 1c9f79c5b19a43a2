//! Profile registration and lookup

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use karwan_common::db::models::{Profile, ProfileSubmission};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::directory::{PhoneReport, SaveOutcome};
use crate::error::{ApiError, ApiResult};
use crate::identity::SaveMode;
use crate::render::share_reference;
use crate::AppState;

/// Profile as returned to callers: stored fields (photo bytes excluded),
/// whether a photo exists and the share reference
#[derive(Debug, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub has_photo: bool,
    pub share_reference: String,
}

impl ProfileView {
    pub fn new(profile: Profile, base_url: &str) -> Self {
        Self {
            has_photo: profile.has_photo(),
            share_reference: share_reference(base_url, profile.id),
            profile,
        }
    }
}

/// POST /api/profiles body
#[derive(Debug, Deserialize)]
pub struct SaveProfileRequest {
    pub mode: SaveMode,
    #[serde(flatten)]
    pub profile: ProfileSubmission,
    /// Base64 image, optionally as a `data:` URL
    #[serde(default)]
    pub photo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveProfileResponse {
    pub outcome: SaveOutcome,
    pub profile: ProfileView,
    pub phone_report: PhoneReport,
}

/// Query parameters for identity lookup
#[derive(Debug, Deserialize)]
pub struct IdentityQuery {
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Context for normalizing `phone`
    pub country: Option<String>,
}

/// Query parameters of a share reference
#[derive(Debug, Deserialize)]
pub struct ShareQuery {
    pub profile_id: Option<String>,
}

/// POST /api/profiles
///
/// 201 when a profile was created, 200 when one was updated.
pub async fn save_profile(
    State(state): State<AppState>,
    Json(request): Json<SaveProfileRequest>,
) -> ApiResult<(StatusCode, Json<SaveProfileResponse>)> {
    let mut submission = request.profile;
    submission.photo = match request.photo.as_deref().map(str::trim) {
        Some(encoded) if !encoded.is_empty() => Some(decode_photo(encoded)?),
        _ => None,
    };

    let saved = state
        .directory
        .create_or_update_profile(request.mode, submission)
        .await?;

    let status = match saved.outcome {
        SaveOutcome::Created => StatusCode::CREATED,
        SaveOutcome::Updated => StatusCode::OK,
    };

    Ok((
        status,
        Json(SaveProfileResponse {
            outcome: saved.outcome,
            profile: ProfileView::new(saved.profile, &state.base_url),
            phone_report: saved.phone_report,
        }),
    ))
}

/// GET /api/profiles/:id
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProfileView>> {
    let profile = state.directory.get_profile(id).await?;
    Ok(Json(ProfileView::new(profile, &state.base_url)))
}

/// GET /api/profiles?email=&phone=&country=
pub async fn find_profile(
    State(state): State<AppState>,
    Query(query): Query<IdentityQuery>,
) -> ApiResult<Json<ProfileView>> {
    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("email query parameter is required".to_string()))?;

    let key = state.directory.identity_key(
        email,
        query.phone.as_deref(),
        query.country.as_deref(),
    );
    let profile = state.directory.get_profile_by_identity(&key).await?;
    Ok(Json(ProfileView::new(profile, &state.base_url)))
}

/// GET /api/profiles/:id/photo
pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let profile = state.directory.get_profile(id).await?;
    let photo = profile
        .photo
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::NotFound(format!("photo of profile {}", id)))?;

    let content_type = image::guess_format(&photo)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], photo).into_response())
}

/// GET /?profile_id=<id>
///
/// Target of share references. Without `profile_id` it describes the API.
pub async fn share_view(
    State(state): State<AppState>,
    Query(query): Query<ShareQuery>,
) -> ApiResult<Response> {
    let Some(raw_id) = query.profile_id else {
        return Ok(Json(json!({
            "module": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "profiles": "/api/profiles",
            "search": "/api/search?q=",
        }))
        .into_response());
    };

    let id = Uuid::parse_str(raw_id.trim())
        .map_err(|_| ApiError::BadRequest(format!("invalid profile_id '{}'", raw_id)))?;
    let profile = state.directory.get_profile(id).await?;

    Ok(Json(ProfileView::new(profile, &state.base_url)).into_response())
}

fn decode_photo(encoded: &str) -> ApiResult<Vec<u8>> {
    // Accept `data:image/png;base64,....` as sent by browsers
    let payload = match encoded.split_once("base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };

    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::BadRequest(format!("photo is not valid base64: {}", e)))
}
