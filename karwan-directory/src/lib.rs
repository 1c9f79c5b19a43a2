//! karwan-directory library - professional directory service
//!
//! Registration with identity resolution, lookup, search, share artifacts
//! (QR code and PDF) and the admin export, served over HTTP.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod directory;
pub mod error;
pub mod export;
pub mod identity;
pub mod render;

use api::AdminGate;
use directory::Directory;

/// Largest accepted request body; photos travel base64 inside JSON
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub directory: Directory,
    /// Prefix of every share reference
    pub base_url: String,
    pub admin_gate: AdminGate,
}

impl AppState {
    pub fn new(directory: Directory, base_url: impl Into<String>, admin_gate: AdminGate) -> Self {
        Self {
            directory,
            base_url: base_url.into(),
            admin_gate,
        }
    }
}

/// Build application router
///
/// Health, profile, search and artifact routes are public; the export
/// routes sit behind the admin gate.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/api/admin/export", get(api::export_table))
        .route("/api/admin/export.csv", get(api::export_csv))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::admin_middleware,
        ));

    let public = Router::new()
        .route("/", get(api::share_view))
        .route("/api/profiles", post(api::save_profile).get(api::find_profile))
        .route("/api/profiles/:id", get(api::get_profile))
        .route("/api/profiles/:id/photo", get(api::get_photo))
        .route("/api/profiles/:id/artifacts", get(api::get_artifacts))
        .route("/api/profiles/:id/code.png", get(api::get_code))
        .route("/api/profiles/:id/document.pdf", get(api::get_document))
        .route("/api/search", get(api::search_profiles))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
