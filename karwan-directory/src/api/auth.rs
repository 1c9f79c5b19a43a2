//! Admin gate for export routes
//!
//! The configured credential is kept only as a SHA-256 digest. Callers
//! present it as `Authorization: Bearer <credential>`; the digests of the
//! two values are compared. Without a configured credential the export
//! routes answer 403.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

#[derive(Clone, Default)]
pub struct AdminGate {
    digest: Option<[u8; 32]>,
}

impl AdminGate {
    /// `None` or an empty credential disables the gated routes
    pub fn new(credential: Option<&str>) -> Self {
        Self {
            digest: credential.filter(|c| !c.is_empty()).map(digest),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.digest.is_some()
    }

    /// True when `presented` matches the configured credential
    pub fn verify(&self, presented: &str) -> bool {
        match &self.digest {
            Some(expected) => {
                let actual = digest(presented);
                expected
                    .iter()
                    .zip(actual.iter())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}

/// Admin middleware
///
/// Applied to the export routes only.
pub async fn admin_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.admin_gate.is_enabled() {
        return Err(ApiError::Forbidden(
            "admin export is disabled (no admin credential configured)".to_string(),
        ));
    }

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(credential) if state.admin_gate.verify(credential) => Ok(next.run(request).await),
        Some(_) => {
            warn!("Rejected admin request with wrong credential");
            Err(ApiError::Unauthorized("invalid admin credential".to_string()))
        }
        None => Err(ApiError::Unauthorized(
            "admin credential required (Authorization: Bearer)".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_disabled_without_credential() {
        assert!(!AdminGate::new(None).is_enabled());
        assert!(!AdminGate::new(Some("")).is_enabled());
        assert!(!AdminGate::new(None).verify(""));
    }

    #[test]
    fn test_gate_verifies_exact_credential() {
        let gate = AdminGate::new(Some("s3cret"));
        assert!(gate.verify("s3cret"));
        assert!(!gate.verify("S3cret"));
        assert!(!gate.verify("s3cret "));
    }

    #[test]
    fn test_debug_does_not_leak_digest() {
        let gate = AdminGate::new(Some("s3cret"));
        assert_eq!(format!("{:?}", gate), "AdminGate { enabled: true }");
    }
}
