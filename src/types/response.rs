//! Response type definitions
//!
//! Defines the structures returned by the inbound HTTP service.

use serde::{Deserialize, Serialize};

/// Response for image generation over the HTTP API.
///
/// Carries the finished image as base64 plus the same metadata fields the
/// library's image result exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponseData {
    /// Base64-encoded image bytes
    pub image_base64: String,

    /// Image file type (extension reported by the backend)
    pub image_type: String,

    /// Backend identifier of the generated image
    pub image_id: String,

    /// Seed the backend actually used
    pub seed: i64,

    /// Prompt the image was generated from
    pub prompt: String,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Guidance scale used for generation
    pub guidance_scale: f64,

    /// Negative prompt, if one was submitted
    pub negative_prompt: Option<String>,

    /// Whether the backend flagged the image as possibly NSFW
    pub maybe_nsfw: bool,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Whether the generator instance has been initialized
    pub generator_ready: bool,

    /// Server uptime in seconds
    pub server_uptime: u64,

    /// Server version
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn new(generator_ready: bool, server_uptime: u64, version: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            generator_ready,
            server_uptime,
            version: version.into(),
        }
    }
}

/// Error response for API errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response() {
        let response = HealthResponse::new(true, 3600, "0.1.0");
        assert_eq!(response.status, "healthy");
        assert!(response.generator_ready);
        assert_eq!(response.server_uptime, 3600);
        assert_eq!(response.version, "0.1.0");
    }

    #[test]
    fn test_error_response() {
        let response = ErrorResponse::new("Test error");
        assert_eq!(response.error, "Test error");
    }

    #[test]
    fn test_image_response_serialization() {
        let response = ImageResponseData {
            image_base64: "aGVsbG8=".to_string(),
            image_type: "jpeg".to_string(),
            image_id: "abc123".to_string(),
            seed: 42,
            prompt: "a cat".to_string(),
            width: 512,
            height: 512,
            guidance_scale: 7.0,
            negative_prompt: None,
            maybe_nsfw: false,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("image_base64"));
        assert!(json.contains("abc123"));

        let deserialized: ImageResponseData = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.image_id, "abc123");
        assert_eq!(deserialized.seed, 42);
    }
}
