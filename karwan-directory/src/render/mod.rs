//! Artifact rendering
//!
//! Turns a stored profile into portable artifacts: a share reference, a QR
//! code of that reference (PNG) and a one-profile PDF document. Rendering is
//! pure: it never touches storage, works on in-memory buffers only and
//! produces identical bytes for identical input.

pub mod code;
pub mod document;

use karwan_common::db::models::Profile;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Rendering failures; a failed render never affects the stored profile
#[derive(Error, Debug)]
pub enum RenderError {
    /// Share reference does not fit in a QR code at level H
    #[error("Share reference too long for a QR code ({0} bytes)")]
    PayloadTooLong(usize),

    #[error("QR encoding failed: {0}")]
    Code(String),

    /// Stored photo bytes are not a decodable image
    #[error("Photo could not be decoded: {0}")]
    Photo(#[source] image::ImageError),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Document assembly failed: {0}")]
    Document(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Share reference, QR code and document for one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedArtifacts {
    pub share_reference: String,
    /// PNG bytes
    #[serde(skip)]
    pub visual_code: Vec<u8>,
    /// PDF bytes
    #[serde(skip)]
    pub document: Vec<u8>,
}

/// `<base>?profile_id=<id>`
pub fn share_reference(base_url: &str, id: Uuid) -> String {
    format!("{}?profile_id={}", base_url, id)
}

#[derive(Debug, Clone)]
pub struct ArtifactRenderer {
    title: String,
}

impl ArtifactRenderer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Render every artifact for `profile`
    pub fn render(&self, profile: &Profile, base_url: &str) -> Result<RenderedArtifacts, RenderError> {
        let share_reference = share_reference(base_url, profile.id);
        let qr = code::encode(&share_reference)?;
        let visual_code = code::to_png(&qr)?;
        let document = document::render(&self.title, profile, &qr)?;

        Ok(RenderedArtifacts {
            share_reference,
            visual_code,
            document,
        })
    }

    /// QR code PNG only
    pub fn render_code(&self, profile: &Profile, base_url: &str) -> Result<Vec<u8>, RenderError> {
        let qr = code::encode(&share_reference(base_url, profile.id))?;
        code::to_png(&qr)
    }

    /// PDF document only
    pub fn render_document(&self, profile: &Profile, base_url: &str) -> Result<Vec<u8>, RenderError> {
        let qr = code::encode(&share_reference(base_url, profile.id))?;
        document::render(&self.title, profile, &qr)
    }
}
