//! Identity resolution
//!
//! Decides whether a submission creates a new profile or updates an
//! existing one, based on the identity key of the configured policy and
//! the caller's mode.

use karwan_common::db::models::{IdentityKey, IdentityPolicy, Profile};
use karwan_common::db::profiles;
use karwan_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Caller's intent for a save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    Create,
    Update,
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveMode::Create => f.write_str("create"),
            SaveMode::Update => f.write_str("update"),
        }
    }
}

impl FromStr for SaveMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(SaveMode::Create),
            "update" => Ok(SaveMode::Update),
            other => Err(format!("unknown save mode '{}'", other)),
        }
    }
}

/// Outcome of resolving an identity key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Key is new; a fresh id must be generated
    Create,
    /// Key belongs to the profile with this id
    Update(Uuid),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver {
    policy: IdentityPolicy,
}

impl IdentityResolver {
    pub fn new(policy: IdentityPolicy) -> Self {
        Self { policy }
    }

    /// Build the key for `email` and an already-normalized primary phone
    pub fn key_for(&self, email: &str, normalized_phone: Option<&str>) -> IdentityKey {
        let email = email.trim().to_string();
        match self.policy {
            IdentityPolicy::Email => IdentityKey::Email(email),
            IdentityPolicy::EmailAndPhone => IdentityKey::EmailAndPhone {
                email,
                phone: normalized_phone.map(str::to_string),
            },
        }
    }

    /// Profile currently holding `key`, if any
    pub async fn lookup(&self, pool: &SqlitePool, key: &IdentityKey) -> Result<Option<Profile>> {
        profiles::get_by_identity(pool, key).await
    }

    /// Check `mode` against what is stored under `key`
    ///
    /// CREATE on a taken key is [`Error::DuplicateIdentity`]; UPDATE on an
    /// unknown key is [`Error::NotFound`].
    pub async fn resolve(
        &self,
        pool: &SqlitePool,
        key: &IdentityKey,
        mode: SaveMode,
    ) -> Result<Resolution> {
        let existing = self.lookup(pool, key).await?;

        match (mode, existing) {
            (SaveMode::Create, None) => Ok(Resolution::Create),
            (SaveMode::Create, Some(_)) => Err(Error::DuplicateIdentity(key.to_string())),
            (SaveMode::Update, Some(profile)) => Ok(Resolution::Update(profile.id)),
            (SaveMode::Update, None) => Err(Error::NotFound(format!("profile with {}", key))),
        }
    }
}
