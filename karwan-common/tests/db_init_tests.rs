//! Integration tests for database initialization and schema lifecycle
//!
//! Covers:
//! - Automatic database creation on first run
//! - Repeated initialization leaves the schema unchanged
//! - In-place upgrade of a legacy profiles table with rows preserved
//! - Fatal migration errors (conflicting column type, newer generation)
//! - Racing inserts of one identity on a file-backed database

use karwan_common::db::init::{ensure_ready, init_database, open_database};
use karwan_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use karwan_common::db::models::{IdentityKey, IdentityPolicy, ProfileDraft, ProfileSubmission};
use karwan_common::db::profiles;
use karwan_common::Error;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

async fn schema_snapshot(pool: &SqlitePool) -> Vec<(String, String, Option<String>)> {
    sqlx::query_as("SELECT type, name, sql FROM sqlite_master ORDER BY type, name")
        .fetch_all(pool)
        .await
        .unwrap()
}

fn draft(email: &str) -> ProfileDraft {
    ProfileDraft::from_submission(
        Uuid::new_v4(),
        ProfileSubmission {
            full_name: "Racer".to_string(),
            email: email.to_string(),
            profession: "Trader".to_string(),
            expertise: "Logistics".to_string(),
            how_to_help: "Introductions".to_string(),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("karwan_tijarat.db");

    let pool = init_database(&db_path, IdentityPolicy::Email).await.unwrap();

    assert!(db_path.exists(), "Database file was not created");
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    assert_eq!(profiles::count(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_reinitialization_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("karwan_tijarat.db");

    let pool = init_database(&db_path, IdentityPolicy::Email).await.unwrap();
    let first = schema_snapshot(&pool).await;

    for _ in 0..3 {
        ensure_ready(&pool, IdentityPolicy::Email).await.unwrap();
    }
    assert_eq!(schema_snapshot(&pool).await, first);
    drop(pool);

    // Reopening an existing file behaves the same
    let reopened = init_database(&db_path, IdentityPolicy::Email).await.unwrap();
    assert_eq!(schema_snapshot(&reopened).await, first);
}

#[tokio::test]
async fn test_legacy_table_is_upgraded_in_place() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("legacy.db");

    let pool = open_database(&db_path).await.unwrap();
    sqlx::query(
        r#"
        CREATE TABLE profiles (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            primary_phone TEXT,
            city TEXT,
            country TEXT,
            profession TEXT NOT NULL,
            expertise TEXT NOT NULL,
            how_to_help TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let legacy_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO profiles (id, full_name, email, primary_phone, city, country, profession, expertise, how_to_help)
         VALUES (?, 'Legacy Member', 'legacy@example.com', '+92 300 1234567', 'Karachi', 'Pakistan', 'Importer', 'Spices', 'Supplier contacts')",
    )
    .bind(legacy_id.to_string())
    .execute(&pool)
    .await
    .unwrap();

    ensure_ready(&pool, IdentityPolicy::Email).await.unwrap();

    let key = IdentityKey::Email("legacy@example.com".to_string());
    let profile = profiles::get_by_identity(&pool, &key).await.unwrap().unwrap();
    assert_eq!(profile.id, legacy_id);
    assert_eq!(profile.full_name, "Legacy Member");
    assert_eq!(profile.city.as_deref(), Some("Karachi"));
    assert_eq!(profile.secondary_phone, None);
    assert_eq!(profile.photo, None);
    assert_eq!(profile.updated_at, profile.created_at);
}

#[tokio::test]
async fn test_conflicting_column_type_is_migration_error() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("conflict.db");

    let pool = open_database(&db_path).await.unwrap();
    sqlx::query(
        r#"
        CREATE TABLE profiles (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            profession TEXT NOT NULL,
            expertise TEXT NOT NULL,
            how_to_help TEXT NOT NULL,
            photo INTEGER
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let err = ensure_ready(&pool, IdentityPolicy::Email).await.unwrap_err();
    assert!(matches!(err, Error::Migration(_)), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_newer_schema_generation_is_migration_error() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("future.db");

    let pool = init_database(&db_path, IdentityPolicy::Email).await.unwrap();
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION + 1)
        .execute(&pool)
        .await
        .unwrap();

    let err = ensure_ready(&pool, IdentityPolicy::Email).await.unwrap_err();
    assert!(matches!(err, Error::Migration(_)));
}

#[tokio::test]
async fn test_racing_inserts_of_one_email() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("race.db");
    let pool = init_database(&db_path, IdentityPolicy::Email).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            profiles::upsert(&pool, &draft("race@example.com")).await
        }));
    }

    let mut stored = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => stored += 1,
            Err(Error::DuplicateIdentity(_)) => duplicates += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(stored, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(profiles::count(&pool).await.unwrap(), 1);
}
