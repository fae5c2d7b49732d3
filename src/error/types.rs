//! Error type definitions
//!
//! Defines the main error types used throughout the generation provider.

use thiserror::Error;

/// Main error type for the generation provider
#[derive(Error, Debug)]
pub enum Error {
    /// Network, browser automation or stream failure, or a deadline that
    /// expired while waiting for a session key or a terminal status
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend rejected the cached session key
    #[error("Authentication error: backend rejected the session key")]
    Auth,

    /// The backend rejected the submitted generation parameters
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// Browser automation (CDP) errors
    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    /// Network/HTTP client errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a new bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new server error
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }

    /// Whether this error is one of the three terminal generation
    /// outcomes (connection, auth, bad request)
    pub fn is_terminal_generation_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Auth | Self::BadRequest(_))
    }
}
