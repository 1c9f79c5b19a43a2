//! Table Schema Definitions
//!
//! Single source of truth for the columns of each directory table.
//!
//! # Usage
//!
//! ```rust,ignore
//! // Sync all table schemas on startup
//! sync_all_table_schemas(&pool).await?;
//! ```

use crate::db::schema_sync::{ColumnDefinition, SchemaSync, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Profiles table schema
pub struct ProfilesTableSchema;

impl TableSchema for ProfilesTableSchema {
    fn table_name() -> &'static str {
        "profiles"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "TEXT")
                .primary_key(),

            ColumnDefinition::new("full_name", "TEXT")
                .not_null()
                .default("''"),

            // Identity key; uniqueness comes from the policy index (init.rs)
            ColumnDefinition::new("email", "TEXT")
                .not_null()
                .default("''"),

            ColumnDefinition::new("primary_phone", "TEXT"),
            ColumnDefinition::new("city", "TEXT"),
            ColumnDefinition::new("country", "TEXT"),

            ColumnDefinition::new("profession", "TEXT")
                .not_null()
                .default("''"),

            ColumnDefinition::new("expertise", "TEXT")
                .not_null()
                .default("''"),

            ColumnDefinition::new("how_to_help", "TEXT")
                .not_null()
                .default("''"),

            // Generation 1 columns
            ColumnDefinition::new("secondary_phone", "TEXT"),
            ColumnDefinition::new("help_needed", "TEXT"),
            ColumnDefinition::new("business_url", "TEXT"),

            // Generation 2 columns
            ColumnDefinition::new("social_media_reference", "TEXT"),
            ColumnDefinition::new("photo", "BLOB"),

            ColumnDefinition::new("created_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),

            // Backfilled from created_at by migration v2
            ColumnDefinition::new("updated_at", "TIMESTAMP"),
        ]
    }
}

/// Synchronize all table schemas
///
/// **Phase 2 of database initialization** (after CREATE TABLE IF NOT EXISTS, before migrations)
///
/// Automatically adds missing columns to all tables.
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    info!("=== Phase 2: Automatic Schema Synchronization ===");

    let added = SchemaSync::sync_table::<ProfilesTableSchema>(pool).await?;
    if !added.is_empty() {
        info!("  Added {} column(s) to profiles: {}", added.len(), added.join(", "));
    }

    info!("=== Schema Synchronization Complete ===");
    Ok(())
}
