//! Configuration management for the generation provider
//!
//! This module handles loading and managing configuration settings
//! for the HTTP server and the generation clients.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::{
    BrowserSettings, GenerationSettings, LoggingSettings, ServerSettings, Settings,
};
