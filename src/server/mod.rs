//! HTTP server for the generation provider
//!
//! Exposes the image generation endpoint, a health check and a service
//! banner over an Axum application.

pub mod app;
pub mod handlers;

pub use app::{AppState, create_app};
