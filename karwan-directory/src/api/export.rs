//! Admin export (JSON table and CSV download)
//!
//! Mounted behind `admin_middleware`.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ApiResult;
use crate::export::ProfileTable;
use crate::AppState;

pub const CSV_FILENAME: &str = "karwan_profiles.csv";

/// GET /api/admin/export
pub async fn export_table(State(state): State<AppState>) -> ApiResult<Json<ProfileTable>> {
    Ok(Json(state.directory.export_all().await?))
}

/// GET /api/admin/export.csv
pub async fn export_csv(State(state): State<AppState>) -> ApiResult<Response> {
    let csv = state.directory.export_all().await?.to_csv()?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", CSV_FILENAME),
            ),
        ],
        csv,
    )
        .into_response())
}
