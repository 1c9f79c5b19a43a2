//! Database schema migrations
//!
//! Versioned, forward-only schema generations. The applied generation is
//! recorded in the `schema_version` table; a generation never runs twice.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - Directories upgrading from older releases depend on them
//! 2. **Always add new migrations** - One function per generation, bump `CURRENT_SCHEMA_VERSION`
//! 3. **Additive only** - Add columns and indexes, fill new columns with defaults, never rewrite existing data
//! 4. **Idempotent bodies** - Check before altering; schema sync may already have added the column
//!
//! Each generation runs in its own transaction together with its version
//! marker, so a failed step leaves the previous generation intact.

use crate::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

/// Current schema generation
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema generation from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(Error::Migration(format!(
            "database schema v{} is newer than this build understands (v{})",
            current_version, CURRENT_SCHEMA_VERSION
        )));
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    for version in (current_version + 1)..=CURRENT_SCHEMA_VERSION {
        let mut tx = pool.begin().await?;

        match version {
            1 => migrate_v1(&mut tx).await?,
            2 => migrate_v2(&mut tx).await?,
            3 => migrate_v3(&mut tx).await?,
            other => {
                return Err(Error::Migration(format!("no migration defined for v{}", other)));
            }
        }

        set_schema_version(&mut tx, version).await?;
        tx.commit().await?;
        info!("✓ Migration v{} completed", version);
    }

    info!("All migrations completed successfully");
    Ok(())
}

async fn column_exists(conn: &mut SqliteConnection, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(&mut *conn)
            .await?;

    Ok(count > 0)
}

async fn add_column_if_missing(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    sql_type: &str,
) -> Result<bool> {
    if column_exists(conn, table, column).await? {
        return Ok(false);
    }

    match sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, sql_type))
        .execute(&mut *conn)
        .await
    {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            info!("  {} column added by concurrent initialization - skipping", column);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Migration v1: optional contact and needs columns
///
/// **Background:** The first directory releases stored only the required
/// fields plus one phone and a location. Secondary phone, help needed and
/// business URL came later.
async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
    info!("Running migration v1: secondary_phone, help_needed, business_url");

    let mut added = 0;
    for column in ["secondary_phone", "help_needed", "business_url"] {
        if add_column_if_missing(conn, "profiles", column, "TEXT").await? {
            added += 1;
        }
    }

    if added > 0 {
        info!("  ✓ Added {} columns to profiles", added);
    } else {
        info!("  Columns already present - skipping");
    }
    Ok(())
}

/// Migration v2: social reference, photo and modification tracking
///
/// `updated_at` of existing rows is filled from `created_at` so recency
/// ordering treats untouched legacy profiles by their creation time.
async fn migrate_v2(conn: &mut SqliteConnection) -> Result<()> {
    info!("Running migration v2: social_media_reference, photo, updated_at");

    add_column_if_missing(conn, "profiles", "social_media_reference", "TEXT").await?;
    add_column_if_missing(conn, "profiles", "photo", "BLOB").await?;
    add_column_if_missing(conn, "profiles", "updated_at", "TIMESTAMP").await?;

    let filled = sqlx::query("UPDATE profiles SET updated_at = created_at WHERE updated_at IS NULL")
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if filled > 0 {
        info!("  ✓ Backfilled updated_at on {} profiles", filled);
    }
    Ok(())
}

/// Migration v3: recency index used by search ordering
async fn migrate_v3(conn: &mut SqliteConnection) -> Result<()> {
    info!("Running migration v3: profiles recency index");

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_profiles_updated_at ON profiles(updated_at)")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
