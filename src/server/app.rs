//! Axum application setup
//!
//! Creates and configures the Axum application with routes and middleware.

use crate::{Result, config::Settings, generator::ImageGenerator};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers.
///
/// Created once at startup and read-only thereafter; the generator is
/// never reconstructed per-request.
#[derive(Clone)]
pub struct AppState {
    /// Image generation session
    pub generator: Arc<ImageGenerator>,
    /// Application settings
    pub settings: Arc<Settings>,
    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Initialize the shared state, constructing the generator session
    pub fn new(settings: Settings) -> Result<Self> {
        let generator = Arc::new(ImageGenerator::new(settings.clone())?);

        Ok(Self {
            generator,
            settings: Arc::new(settings),
            start_time: std::time::Instant::now(),
        })
    }
}

/// Create the main Axum application with routes and middleware
pub fn create_app(settings: Settings) -> Result<Router> {
    let state = AppState::new(settings)?;

    Ok(Router::new()
        .route("/", get(super::handlers::root))
        .route("/api/txttoimage", post(super::handlers::text_to_image))
        .route("/health", get(super::handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state))
}
