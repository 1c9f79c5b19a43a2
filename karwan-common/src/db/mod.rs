//! Database models, schema management and queries

pub mod init;
pub mod migrations;
pub mod models;
pub mod profiles;
pub mod schema_sync;
pub mod search;
pub mod table_schemas;

pub use init::*;
pub use migrations::*;
pub use models::*;
pub use schema_sync::*;
pub use search::*;
pub use table_schemas::*;
