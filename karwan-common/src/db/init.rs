//! Database initialization
//!
//! Startup sequence, safe to run on every process start:
//! 1. CREATE TABLE IF NOT EXISTS for `schema_version` and `profiles`
//! 2. Automatic schema synchronization (missing columns are added)
//! 3. Versioned migrations
//! 4. Identity index for the configured policy
//!
//! Any failure in steps 1-4 is reported as [`Error::Migration`].

use crate::db::models::IdentityPolicy;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Unique index enforcing one profile per email
pub const EMAIL_IDENTITY_INDEX: &str = "idx_profiles_identity_email";

/// Unique index enforcing one profile per (email, primary phone)
pub const PAIR_IDENTITY_INDEX: &str = "idx_profiles_identity_pair";

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the database file at `db_path`
///
/// WAL journaling plus a busy timeout lets concurrent writers queue on the
/// lock instead of failing immediately.
pub async fn open_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    Ok(pool)
}

/// Open the database and bring it to the current schema
pub async fn init_database(db_path: &Path, policy: IdentityPolicy) -> Result<SqlitePool> {
    let pool = open_database(db_path).await?;
    ensure_ready(&pool, policy).await?;
    Ok(pool)
}

/// Bring the schema of an open pool to the current generation
///
/// Idempotent: calling it again on a ready database changes nothing.
pub async fn ensure_ready(pool: &SqlitePool, policy: IdentityPolicy) -> Result<()> {
    prepare_schema(pool, policy)
        .await
        .map_err(Error::into_migration)
}

async fn prepare_schema(pool: &SqlitePool, policy: IdentityPolicy) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_profiles_table(pool).await?;

    // Phase 2: add columns missing from tables created by older releases
    crate::db::table_schemas::sync_all_table_schemas(pool).await?;

    // Phase 3: generation-specific steps (backfills, indexes)
    crate::db::migrations::run_migrations(pool).await?;

    // Phase 4: uniqueness of the identity key
    install_identity_index(pool, policy).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            primary_phone TEXT,
            city TEXT,
            country TEXT,
            profession TEXT NOT NULL DEFAULT '',
            expertise TEXT NOT NULL DEFAULT '',
            how_to_help TEXT NOT NULL DEFAULT '',
            secondary_phone TEXT,
            help_needed TEXT,
            business_url TEXT,
            social_media_reference TEXT,
            photo BLOB,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the unique index for `policy` and drop the other policy's index
///
/// Fails when existing rows already violate the requested uniqueness.
async fn install_identity_index(pool: &SqlitePool, policy: IdentityPolicy) -> Result<()> {
    let (keep, drop, definition) = match policy {
        IdentityPolicy::Email => (
            EMAIL_IDENTITY_INDEX,
            PAIR_IDENTITY_INDEX,
            "(email COLLATE NOCASE)",
        ),
        // IFNULL so two phone-less rows with one email still collide
        IdentityPolicy::EmailAndPhone => (
            PAIR_IDENTITY_INDEX,
            EMAIL_IDENTITY_INDEX,
            "(email COLLATE NOCASE, IFNULL(primary_phone, ''))",
        ),
    };

    sqlx::query(&format!("DROP INDEX IF EXISTS {}", drop))
        .execute(pool)
        .await?;

    sqlx::query(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON profiles {}",
        keep, definition
    ))
    .execute(pool)
    .await
    .map_err(|e| {
        Error::Migration(format!(
            "cannot enforce identity policy '{}': {}",
            policy, e
        ))
    })?;

    info!("Identity policy '{}' enforced by {}", policy, keep);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn index_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'profiles' AND name LIKE 'idx_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_ready_installs_policy_index() {
        let pool = memory_pool().await;

        ensure_ready(&pool, IdentityPolicy::Email).await.unwrap();
        let names = index_names(&pool).await;
        assert!(names.contains(&EMAIL_IDENTITY_INDEX.to_string()));
        assert!(!names.contains(&PAIR_IDENTITY_INDEX.to_string()));

        ensure_ready(&pool, IdentityPolicy::EmailAndPhone).await.unwrap();
        let names = index_names(&pool).await;
        assert!(!names.contains(&EMAIL_IDENTITY_INDEX.to_string()));
        assert!(names.contains(&PAIR_IDENTITY_INDEX.to_string()));
    }

    #[tokio::test]
    async fn test_email_index_is_case_insensitive() {
        let pool = memory_pool().await;
        ensure_ready(&pool, IdentityPolicy::Email).await.unwrap();

        sqlx::query("INSERT INTO profiles (id, email) VALUES ('a', 'Aisha@Example.com')")
            .execute(&pool)
            .await
            .unwrap();

        let result = sqlx::query("INSERT INTO profiles (id, email) VALUES ('b', 'aisha@example.com')")
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_duplicates_block_policy_index() {
        let pool = memory_pool().await;
        ensure_ready(&pool, IdentityPolicy::EmailAndPhone).await.unwrap();

        for (id, phone) in [("a", "+92 300 1234567"), ("b", "+92 300 7654321")] {
            sqlx::query("INSERT INTO profiles (id, email, primary_phone) VALUES (?, 'shared@example.com', ?)")
                .bind(id)
                .bind(phone)
                .execute(&pool)
                .await
                .unwrap();
        }

        let err = ensure_ready(&pool, IdentityPolicy::Email).await.unwrap_err();
        assert!(matches!(err, Error::Migration(_)));
    }
}
