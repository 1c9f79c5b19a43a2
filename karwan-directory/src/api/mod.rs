//! HTTP API handlers for karwan-directory

pub mod artifacts;
pub mod auth;
pub mod export;
pub mod health;
pub mod profiles;
pub mod search;

pub use artifacts::{get_artifacts, get_code, get_document};
pub use auth::{admin_middleware, AdminGate};
pub use export::{export_csv, export_table};
pub use health::health_routes;
pub use profiles::{find_profile, get_photo, get_profile, save_profile, share_view};
pub use search::search_profiles;
