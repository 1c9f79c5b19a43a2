//! Directory data model

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Persisted member profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub primary_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub profession: String,
    pub expertise: String,
    pub how_to_help: String,
    pub help_needed: Option<String>,
    pub business_url: Option<String>,
    pub social_media_reference: Option<String>,
    /// Raw image bytes; never serialized into JSON views
    #[serde(skip)]
    pub photo: Option<Vec<u8>>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Profile {
    pub fn has_photo(&self) -> bool {
        self.photo.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// "City, Country" with missing parts omitted
    pub fn location(&self) -> Option<String> {
        let parts: Vec<&str> = [self.city.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Field map submitted by a caller, before validation and normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSubmission {
    pub full_name: String,
    pub email: String,
    pub primary_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub profession: String,
    pub expertise: String,
    pub how_to_help: String,
    pub help_needed: Option<String>,
    pub business_url: Option<String>,
    pub social_media_reference: Option<String>,
    #[serde(skip)]
    pub photo: Option<Vec<u8>>,
}

/// Fully resolved profile ready for `upsert`: id assigned, text trimmed,
/// phones normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDraft {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub primary_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub profession: String,
    pub expertise: String,
    pub how_to_help: String,
    pub help_needed: Option<String>,
    pub business_url: Option<String>,
    pub social_media_reference: Option<String>,
    /// `None` on update keeps the stored photo
    pub photo: Option<Vec<u8>>,
}

impl ProfileDraft {
    /// Build a draft from a submission, trimming every text field and
    /// collapsing blank optional fields to `None`. Phones are copied as
    /// entered; normalization is the caller's job.
    pub fn from_submission(id: Uuid, submission: ProfileSubmission) -> Self {
        Self {
            id,
            full_name: submission.full_name.trim().to_string(),
            email: submission.email.trim().to_string(),
            primary_phone: clean_optional(submission.primary_phone),
            secondary_phone: clean_optional(submission.secondary_phone),
            city: clean_optional(submission.city),
            country: clean_optional(submission.country),
            profession: submission.profession.trim().to_string(),
            expertise: submission.expertise.trim().to_string(),
            how_to_help: submission.how_to_help.trim().to_string(),
            help_needed: clean_optional(submission.help_needed),
            business_url: clean_optional(submission.business_url),
            social_media_reference: clean_optional(submission.social_media_reference),
            photo: submission.photo.filter(|p| !p.is_empty()),
        }
    }
}

/// Trim an optional text field; blank becomes `None`
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Which fields identify a member
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// One profile per email (case-insensitive)
    #[default]
    Email,
    /// One profile per (email, normalized primary phone) pair
    EmailAndPhone,
}

impl IdentityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityPolicy::Email => "email",
            IdentityPolicy::EmailAndPhone => "email_and_phone",
        }
    }
}

impl fmt::Display for IdentityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(IdentityPolicy::Email),
            "email_and_phone" | "email+phone" => Ok(IdentityPolicy::EmailAndPhone),
            other => Err(format!(
                "unknown identity policy '{}' (expected 'email' or 'email_and_phone')",
                other
            )),
        }
    }
}

/// Lookup key derived from a submission under an [`IdentityPolicy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKey {
    Email(String),
    EmailAndPhone { email: String, phone: Option<String> },
}

impl IdentityKey {
    pub fn email(&self) -> &str {
        match self {
            IdentityKey::Email(email) => email,
            IdentityKey::EmailAndPhone { email, .. } => email,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Email(email) => write!(f, "email '{}'", email),
            IdentityKey::EmailAndPhone { email, phone } => write!(
                f,
                "email '{}' with phone '{}'",
                email,
                phone.as_deref().unwrap_or("")
            ),
        }
    }
}
