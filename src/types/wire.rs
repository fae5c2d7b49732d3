//! Backend wire formats
//!
//! Deserialization targets for the undocumented backend's JSON payloads.
//! Field names reproduce the backend contract verbatim.

use serde::Deserialize;

/// Status envelope every backend response carries.
///
/// The `status` string doubles as control flow: `success` is terminal,
/// `invalid_key` / `invalid_data` are fatal, anything else means
/// "not done yet, poll again".
#[derive(Debug, Clone, Deserialize)]
pub struct BackendStatus {
    /// Backend-reported status string
    pub status: Option<String>,
}

impl BackendStatus {
    /// The status string, or "unknown" when the field is absent
    pub fn as_str(&self) -> &str {
        self.status.as_deref().unwrap_or("unknown")
    }
}

/// Terminal payload of a successful image generation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    /// Identifier for the generated image on the temporary-image endpoint
    pub image_id: String,

    /// File extension of the generated image
    pub file_extension: String,

    /// Seed the backend actually used
    pub seed: i64,

    /// Resolved image width in pixels
    pub width: u32,

    /// Resolved image height in pixels
    pub height: u32,

    /// Whether the backend flagged the image as possibly NSFW
    pub maybe_nsfw: bool,
}

/// One decoded event block of the text-generation stream
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEvent {
    /// Decoded token text
    pub text: String,
}
