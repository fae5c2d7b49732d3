//! Request type definitions
//!
//! Defines the generation request structures for the image and text
//! backends. These types double as the inbound service schema, so the
//! serde shapes match the JSON accepted by the HTTP API.

use serde::{Deserialize, Serialize};

/// Image shape selector, mapped to a fixed backend resolution.
///
/// An unrecognized shape value fails deserialization before any network
/// call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageShape {
    /// 512x768
    Portrait,
    /// 512x512
    Square,
    /// 768x512
    Landscape,
}

impl ImageShape {
    /// Pixel dimensions (width, height) for this shape
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            Self::Portrait => (512, 768),
            Self::Square => (512, 512),
            Self::Landscape => (768, 512),
        }
    }

    /// Resolution string in the backend's query-parameter format
    pub fn resolution_param(&self) -> &'static str {
        match self {
            Self::Portrait => "512x768",
            Self::Square => "512x512",
            Self::Landscape => "768x512",
        }
    }
}

impl Default for ImageShape {
    fn default() -> Self {
        Self::Square
    }
}

/// Request for image generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Image description
    pub prompt: String,

    /// Things that must NOT appear in the image
    pub negative_prompt: Option<String>,

    /// Generation seed; -1 lets the backend choose one
    #[serde(default = "default_seed")]
    pub seed: i64,

    /// Image shape
    #[serde(default)]
    pub shape: ImageShape,

    /// Prompt adherence in the nominal range 1-30
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
}

fn default_seed() -> i64 {
    -1
}

fn default_guidance_scale() -> f64 {
    7.0
}

impl ImageRequest {
    /// Create a new request with default seed, shape and guidance scale
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            seed: default_seed(),
            shape: ImageShape::default(),
            guidance_scale: default_guidance_scale(),
        }
    }

    /// Set the negative prompt
    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative_prompt.into());
        self
    }

    /// Set the generation seed
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the image shape
    pub fn with_shape(mut self, shape: ImageShape) -> Self {
        self.shape = shape;
        self
    }

    /// Set the guidance scale
    pub fn with_guidance_scale(mut self, guidance_scale: f64) -> Self {
        self.guidance_scale = guidance_scale;
        self
    }
}

/// Request for streamed text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRequest {
    /// Text instruction
    pub prompt: String,

    /// Text the completion should start with
    pub start_with: Option<String>,
}

impl TextRequest {
    /// Create a new text request
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            start_with: None,
        }
    }

    /// Set the starting text
    pub fn with_start_with(mut self, start_with: impl Into<String>) -> Self {
        self.start_with = Some(start_with.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ImageShape::Portrait, (512, 768), "512x768")]
    #[case(ImageShape::Square, (512, 512), "512x512")]
    #[case(ImageShape::Landscape, (768, 512), "768x512")]
    fn test_shape_resolution(
        #[case] shape: ImageShape,
        #[case] expected: (u32, u32),
        #[case] param: &str,
    ) {
        assert_eq!(shape.resolution(), expected);
        assert_eq!(shape.resolution_param(), param);
    }

    #[test]
    fn test_shape_deserialization() {
        let shape: ImageShape = serde_json::from_str("\"portrait\"").unwrap();
        assert_eq!(shape, ImageShape::Portrait);
    }

    #[test]
    fn test_unrecognized_shape_rejected() {
        let result = serde_json::from_str::<ImageShape>("\"panorama\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_image_request_defaults() {
        let request = ImageRequest::new("a cat sitting on stairs");
        assert_eq!(request.prompt, "a cat sitting on stairs");
        assert_eq!(request.negative_prompt, None);
        assert_eq!(request.seed, -1);
        assert_eq!(request.shape, ImageShape::Square);
        assert_eq!(request.guidance_scale, 7.0);
    }

    #[test]
    fn test_image_request_builder() {
        let request = ImageRequest::new("a cat")
            .with_negative_prompt("dogs")
            .with_seed(42)
            .with_shape(ImageShape::Landscape)
            .with_guidance_scale(12.5);

        assert_eq!(request.negative_prompt, Some("dogs".to_string()));
        assert_eq!(request.seed, 42);
        assert_eq!(request.shape, ImageShape::Landscape);
        assert_eq!(request.guidance_scale, 12.5);
    }

    #[test]
    fn test_image_request_deserialization_defaults() {
        let request: ImageRequest = serde_json::from_str(r#"{"prompt": "a cat"}"#).unwrap();
        assert_eq!(request.seed, -1);
        assert_eq!(request.shape, ImageShape::Square);
        assert_eq!(request.guidance_scale, 7.0);
    }

    #[test]
    fn test_image_request_rejects_unknown_shape() {
        let result =
            serde_json::from_str::<ImageRequest>(r#"{"prompt": "a cat", "shape": "circle"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_text_request_builder() {
        let request = TextRequest::new("write a story").with_start_with("Once upon a time");
        assert_eq!(request.prompt, "write a story");
        assert_eq!(request.start_with, Some("Once upon a time".to_string()));
    }
}
