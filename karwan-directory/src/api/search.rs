//! Profile search
//!
//! Case-insensitive substring match over name, profession, expertise, city
//! and country; most recently updated first.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::profiles::ProfileView;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: usize,
    pub profiles: Vec<ProfileView>,
}

/// GET /api/search?q=<term>
///
/// A blank term matches nothing.
pub async fn search_profiles(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    let found = state.directory.search_profiles(&params.q).await?;

    let profiles: Vec<ProfileView> = found
        .into_iter()
        .map(|p| ProfileView::new(p, &state.base_url))
        .collect();

    Ok(Json(SearchResponse {
        query: params.q.trim().to_string(),
        total_results: profiles.len(),
        profiles,
    }))
}
