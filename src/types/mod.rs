//! Type definitions for the generation provider
//!
//! This module contains the main data structures used for requests,
//! responses and the backend wire formats.

pub mod request;
pub mod response;
pub mod wire;

pub use request::{ImageRequest, ImageShape, TextRequest};
pub use response::{ErrorResponse, HealthResponse, ImageResponseData};
pub use wire::{BackendStatus, ImagePayload, TokenEvent};
