//! Field validation for profile submissions
//!
//! Runs before any persistence attempt. All problems are collected so the
//! caller can re-prompt once with every field that needs fixing.

use crate::db::models::{ProfileDraft, ProfileSubmission};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// One rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All rejected fields of one submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Check `local@domain.tld` shape
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

fn check_required(errors: &mut ValidationErrors, fields: [(&'static str, &str); 5]) {
    for (name, value) in fields {
        if value.trim().is_empty() {
            errors.push(name, "is required");
        }
    }
}

/// Validate a caller submission
pub fn validate_submission(submission: &ProfileSubmission) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    check_required(
        &mut errors,
        [
            ("full_name", submission.full_name.as_str()),
            ("email", submission.email.as_str()),
            ("profession", submission.profession.as_str()),
            ("expertise", submission.expertise.as_str()),
            ("how_to_help", submission.how_to_help.as_str()),
        ],
    );

    if !submission.email.trim().is_empty() && !is_valid_email(&submission.email) {
        errors.push("email", "is not a valid email address");
    }

    errors.into_result()
}

/// Re-check the persisted-record invariant on a resolved draft
pub fn validate_draft(draft: &ProfileDraft) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    check_required(
        &mut errors,
        [
            ("full_name", draft.full_name.as_str()),
            ("email", draft.email.as_str()),
            ("profession", draft.profession.as_str()),
            ("expertise", draft.expertise.as_str()),
            ("how_to_help", draft.how_to_help.as_str()),
        ],
    );

    errors.into_result()
}
