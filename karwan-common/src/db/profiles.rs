//! Profile persistence
//!
//! Upsert, point lookups, full listing and substring search over the
//! `profiles` table. Each call takes a pooled connection for its own
//! duration; writes run in a transaction.

use crate::db::models::{IdentityKey, Profile, ProfileDraft};
use crate::db::search::{SearchQuery, SEARCHABLE_FIELDS};
use crate::validation::validate_draft;
use crate::{Error, Result};
use chrono::{NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

/// Text format of `created_at` / `updated_at`; compatible with CURRENT_TIMESTAMP
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const PROFILE_COLUMNS: &str = r#"
    id, full_name, email, primary_phone, secondary_phone, city, country,
    profession, expertise, how_to_help, help_needed, business_url,
    social_media_reference, photo, created_at, updated_at
"#;

/// Insert a new profile or update the one with the same id
///
/// `created_at` is kept on update and a draft without a photo keeps the
/// stored one. Returns the record as stored.
pub async fn upsert(pool: &SqlitePool, draft: &ProfileDraft) -> Result<Profile> {
    validate_draft(draft)?;

    let now = Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO profiles (
            id, full_name, email, primary_phone, secondary_phone, city, country,
            profession, expertise, how_to_help, help_needed, business_url,
            social_media_reference, photo, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            full_name = excluded.full_name,
            email = excluded.email,
            primary_phone = excluded.primary_phone,
            secondary_phone = excluded.secondary_phone,
            city = excluded.city,
            country = excluded.country,
            profession = excluded.profession,
            expertise = excluded.expertise,
            how_to_help = excluded.how_to_help,
            help_needed = excluded.help_needed,
            business_url = excluded.business_url,
            social_media_reference = excluded.social_media_reference,
            photo = COALESCE(excluded.photo, profiles.photo),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(draft.id.to_string())
    .bind(&draft.full_name)
    .bind(&draft.email)
    .bind(&draft.primary_phone)
    .bind(&draft.secondary_phone)
    .bind(&draft.city)
    .bind(&draft.country)
    .bind(&draft.profession)
    .bind(&draft.expertise)
    .bind(&draft.how_to_help)
    .bind(&draft.help_needed)
    .bind(&draft.business_url)
    .bind(&draft.social_media_reference)
    .bind(&draft.photo)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await;

    if let Err(e) = result {
        return Err(match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::DuplicateIdentity(format!("email '{}'", draft.email))
            }
            other => other.into(),
        });
    }

    let row = sqlx::query(&format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS))
        .bind(draft.id.to_string())
        .fetch_one(&mut *tx)
        .await?;
    let profile = profile_from_row(&row)?;

    tx.commit().await?;

    debug!("Stored profile {} ({})", profile.id, profile.email);
    Ok(profile)
}

/// Load profile by id
pub async fn get_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Profile>> {
    let row = sqlx::query(&format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(profile_from_row).transpose()
}

/// Load profile by identity key (email compared case-insensitively)
pub async fn get_by_identity(pool: &SqlitePool, key: &IdentityKey) -> Result<Option<Profile>> {
    let row = match key {
        IdentityKey::Email(email) => {
            sqlx::query(&format!(
                "SELECT {} FROM profiles WHERE email = ? COLLATE NOCASE ORDER BY rowid LIMIT 1",
                PROFILE_COLUMNS
            ))
            .bind(email)
            .fetch_optional(pool)
            .await?
        }
        IdentityKey::EmailAndPhone { email, phone } => {
            sqlx::query(&format!(
                r#"
                SELECT {} FROM profiles
                WHERE email = ? COLLATE NOCASE
                  AND IFNULL(primary_phone, '') = IFNULL(?, '')
                ORDER BY rowid LIMIT 1
                "#,
                PROFILE_COLUMNS
            ))
            .bind(email)
            .bind(phone)
            .fetch_optional(pool)
            .await?
        }
    };

    row.as_ref().map(profile_from_row).transpose()
}

/// Load every profile, oldest first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Profile>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM profiles ORDER BY created_at ASC, rowid ASC",
        PROFILE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(profile_from_row).collect()
}

/// Profiles whose searchable fields contain `term`, most recently modified first
///
/// A blank term matches nothing.
pub async fn search(pool: &SqlitePool, term: &str) -> Result<Vec<Profile>> {
    let Some(query) = SearchQuery::parse(term) else {
        return Ok(Vec::new());
    };

    let sql = format!(
        "SELECT {} FROM profiles WHERE {} ORDER BY COALESCE(updated_at, created_at) DESC, rowid DESC",
        PROFILE_COLUMNS,
        SearchQuery::where_clause()
    );

    let pattern = query.like_pattern();
    let mut statement = sqlx::query(&sql);
    for _ in SEARCHABLE_FIELDS {
        statement = statement.bind(pattern.clone());
    }

    let rows = statement.fetch_all(pool).await?;
    debug!("Search '{}' matched {} profiles", query.term(), rows.len());

    rows.iter().map(profile_from_row).collect()
}

/// Count stored profiles
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn profile_from_row(row: &SqliteRow) -> Result<Profile> {
    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| Error::CorruptRecord(format!("profile id '{}': {}", id_str, e)))?;

    let created_str: String = row.try_get("created_at")?;
    let created_at = parse_timestamp(&created_str)?;
    let updated_at = match row.try_get::<Option<String>, _>("updated_at")? {
        Some(s) => parse_timestamp(&s)?,
        None => created_at,
    };

    Ok(Profile {
        id,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        primary_phone: row.try_get("primary_phone")?,
        secondary_phone: row.try_get("secondary_phone")?,
        city: row.try_get("city")?,
        country: row.try_get("country")?,
        profession: row.try_get("profession")?,
        expertise: row.try_get("expertise")?,
        how_to_help: row.try_get("how_to_help")?,
        help_needed: row.try_get("help_needed")?,
        business_url: row.try_get("business_url")?,
        social_media_reference: row.try_get("social_media_reference")?,
        photo: row.try_get("photo")?,
        created_at,
        updated_at,
    })
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|e| Error::CorruptRecord(format!("timestamp '{}': {}", value, e)))
}
