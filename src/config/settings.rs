//! Configuration settings structure
//!
//! Defines the main settings structure and loading logic for the
//! generation provider.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration settings for the generation provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP server configuration
    pub server: ServerSettings,
    /// Generation backend configuration
    pub generation: GenerationSettings,
    /// Headless browser configuration
    pub browser: BrowserSettings,
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Base URL of the image generation API
    pub image_api_base: String,
    /// Base URL of the text generation API
    pub text_api_base: String,
    /// Maximum seconds to wait for a session key during browser bootstrap
    pub key_deadline_secs: u64,
    /// Maximum seconds to poll for a terminal generation status
    pub poll_deadline_secs: u64,
    /// Backoff seconds after an HTTP 403 response
    pub forbidden_backoff_secs: u64,
    /// Backoff seconds after an HTTP 429 response
    pub rate_limit_backoff_secs: u64,
    /// Backoff seconds after other transient responses
    pub transient_backoff_secs: u64,
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
}

/// Headless browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Explicit Chrome/Chromium executable path; auto-detected when unset
    pub chrome_executable: Option<PathBuf>,
    /// Run the browser headless
    pub headless: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,
    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8888,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            image_api_base: "https://image-generation.perchance.org/api".to_string(),
            text_api_base: "https://text-generation.perchance.org/api".to_string(),
            key_deadline_secs: 20,
            poll_deadline_secs: 20,
            forbidden_backoff_secs: 5,
            rate_limit_backoff_secs: 10,
            transient_backoff_secs: 4,
            request_timeout_secs: 30,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            verbose: false,
        }
    }
}

impl GenerationSettings {
    /// Session key acquisition deadline
    pub fn key_deadline(&self) -> Duration {
        Duration::from_secs(self.key_deadline_secs)
    }

    /// Terminal status polling deadline
    pub fn poll_deadline(&self) -> Duration {
        Duration::from_secs(self.poll_deadline_secs)
    }

    /// Backoff after an HTTP 403 response
    pub fn forbidden_backoff(&self) -> Duration {
        Duration::from_secs(self.forbidden_backoff_secs)
    }

    /// Backoff after an HTTP 429 response
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }

    /// Backoff after other transient responses
    pub fn transient_backoff(&self) -> Duration {
        Duration::from_secs(self.transient_backoff_secs)
    }

    /// Per-request HTTP timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Settings {
    /// Create new settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from environment variables
    pub fn from_env() -> crate::Result<Self> {
        Self::default().merge_with_env()
    }

    /// Load settings from a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Invalid config file: {}", e)))?;
        Ok(settings)
    }

    /// Apply environment variable overrides on top of these settings
    pub fn merge_with_env(mut self) -> crate::Result<Self> {
        if let Ok(host) = std::env::var("PERCHANCE_SERVER_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("PERCHANCE_SERVER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid port: {}", e)))?;
        }

        if let Ok(deadline) = std::env::var("PERCHANCE_POLL_DEADLINE") {
            self.generation.poll_deadline_secs = deadline
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid poll deadline: {}", e)))?;
        }

        if let Ok(chrome) = std::env::var("PERCHANCE_CHROME") {
            self.browser.chrome_executable = Some(PathBuf::from(chrome));
        }

        if let Ok(level) = std::env::var("PERCHANCE_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(self)
    }

    /// Validate the final configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.port == 0 {
            return Err(crate::Error::config("Server port must be non-zero"));
        }

        if self.generation.key_deadline_secs == 0 || self.generation.poll_deadline_secs == 0 {
            return Err(crate::Error::config("Deadlines must be non-zero"));
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.as_str()) {
            return Err(crate::Error::Config(format!(
                "Unknown log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Default location of the configuration file
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("perchance-gen-provider").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8888);
        assert_eq!(settings.generation.poll_deadline_secs, 20);
        assert_eq!(settings.generation.key_deadline_secs, 20);
        assert!(settings.browser.headless);
        assert!(
            settings
                .generation
                .image_api_base
                .starts_with("https://image-generation")
        );
    }

    #[test]
    fn test_backoff_durations() {
        let generation = GenerationSettings::default();
        assert_eq!(generation.forbidden_backoff(), Duration::from_secs(5));
        assert_eq!(generation.rate_limit_backoff(), Duration::from_secs(10));
        assert_eq!(generation.transient_backoff(), Duration::from_secs(4));
        assert_eq!(generation.poll_deadline(), Duration::from_secs(20));
    }

    #[test]
    fn test_settings_validation() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());

        let mut bad = Settings::default();
        bad.server.port = 0;
        assert!(bad.validate().is_err());

        let mut bad = Settings::default();
        bad.logging.level = "loud".to_string();
        assert!(bad.validate().is_err());
    }
}
