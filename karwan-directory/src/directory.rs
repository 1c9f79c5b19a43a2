//! Directory service
//!
//! Caller-facing operations: validate and normalize a submission, resolve
//! its identity, persist it, and read, search, export or render profiles.

use crate::export::ProfileTable;
use crate::identity::{IdentityResolver, Resolution, SaveMode};
use crate::render::{ArtifactRenderer, RenderError, RenderedArtifacts};
use karwan_common::db::models::{IdentityKey, IdentityPolicy, Profile, ProfileDraft, ProfileSubmission};
use karwan_common::db::profiles;
use karwan_common::phone::{self, NormalizedPhone};
use karwan_common::validation::validate_submission;
use karwan_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

/// Whether a save created a new profile or updated an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// How each submitted phone field was stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhoneReport {
    pub primary: Option<NormalizedPhone>,
    pub secondary: Option<NormalizedPhone>,
}

impl PhoneReport {
    /// True when a submitted phone was kept as typed
    pub fn has_fallback(&self) -> bool {
        [&self.primary, &self.secondary]
            .into_iter()
            .flatten()
            .any(|p| !p.was_normalized)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedProfile {
    pub profile: Profile,
    pub outcome: SaveOutcome,
    pub phone_report: PhoneReport,
}

#[derive(Debug, Clone)]
pub struct Directory {
    pool: SqlitePool,
    resolver: IdentityResolver,
    renderer: ArtifactRenderer,
}

impl Directory {
    pub fn new(pool: SqlitePool, policy: IdentityPolicy, document_title: impl Into<String>) -> Self {
        Self {
            pool,
            resolver: IdentityResolver::new(policy),
            renderer: ArtifactRenderer::new(document_title),
        }
    }

    pub fn renderer(&self) -> &ArtifactRenderer {
        &self.renderer
    }

    /// Validate, normalize, resolve and persist one submission
    ///
    /// Nothing is written when validation or resolution fails.
    pub async fn create_or_update_profile(
        &self,
        mode: SaveMode,
        submission: ProfileSubmission,
    ) -> Result<SavedProfile> {
        validate_submission(&submission)?;

        let country = submission.country.as_deref().unwrap_or("").trim().to_string();
        let phone_report = PhoneReport {
            primary: normalize_field("primary_phone", submission.primary_phone.as_deref(), &country),
            secondary: normalize_field(
                "secondary_phone",
                submission.secondary_phone.as_deref(),
                &country,
            ),
        };

        let key = self.resolver.key_for(
            &submission.email,
            phone_report.primary.as_ref().map(|p| p.value.as_str()),
        );
        let resolution = self.resolver.resolve(&self.pool, &key, mode).await?;

        let (id, outcome) = match resolution {
            Resolution::Create => (Uuid::new_v4(), SaveOutcome::Created),
            Resolution::Update(id) => (id, SaveOutcome::Updated),
        };

        let mut draft = ProfileDraft::from_submission(id, submission);
        draft.primary_phone = phone_report.primary.as_ref().map(|p| p.value.clone());
        draft.secondary_phone = phone_report.secondary.as_ref().map(|p| p.value.clone());

        let profile = profiles::upsert(&self.pool, &draft).await?;

        match outcome {
            SaveOutcome::Created => info!("Created profile {} for {}", profile.id, key),
            SaveOutcome::Updated => info!("Updated profile {} for {}", profile.id, key),
        }

        Ok(SavedProfile {
            profile,
            outcome,
            phone_report,
        })
    }

    pub async fn get_profile(&self, id: Uuid) -> Result<Profile> {
        profiles::get_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile {}", id)))
    }

    pub async fn get_profile_by_identity(&self, key: &IdentityKey) -> Result<Profile> {
        self.resolver
            .lookup(&self.pool, key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile with {}", key)))
    }

    /// Build the identity key for a lookup from raw caller input
    ///
    /// The phone is normalized the same way a submission's primary phone is.
    pub fn identity_key(&self, email: &str, phone: Option<&str>, country: Option<&str>) -> IdentityKey {
        let normalized = phone.and_then(|p| phone::normalize(p, country.unwrap_or("")));
        self.resolver
            .key_for(email, normalized.as_ref().map(|p| p.value.as_str()))
    }

    pub async fn search_profiles(&self, term: &str) -> Result<Vec<Profile>> {
        profiles::search(&self.pool, term).await
    }

    /// Snapshot of every profile, oldest first
    pub async fn export_all(&self) -> Result<ProfileTable> {
        let all = profiles::list_all(&self.pool).await?;
        info!("Exporting {} profiles", all.len());
        Ok(ProfileTable::from_profiles(&all))
    }

    pub fn render_artifacts(
        &self,
        profile: &Profile,
        base_url: &str,
    ) -> std::result::Result<RenderedArtifacts, RenderError> {
        self.renderer.render(profile, base_url)
    }
}

fn normalize_field(field: &str, raw: Option<&str>, country: &str) -> Option<NormalizedPhone> {
    let normalized = phone::normalize(raw?, country)?;
    if !normalized.was_normalized {
        warn!(
            "{} '{}' could not be normalized for country '{}'; stored as entered",
            field, normalized.value, country
        );
    }
    Some(normalized)
}
