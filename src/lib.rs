//! Perchance Generation Provider - Rust Implementation
//!
//! A client for the undocumented Perchance generation backends. The
//! backends require an ephemeral session key that is only handed out to
//! their own demo pages, so this crate acquires one by driving a headless
//! browser through the page's bootstrap flow and intercepting the
//! verification call, then uses it to run generation requests directly.
//!
//! # Architecture
//!
//! - **Credential acquisition**: browser bootstrap + network interception
//! - **Image generation**: a poll-until-terminal loop with
//!   status-dependent backoff over a rate-limited endpoint
//! - **Text generation**: a single streaming request decoded into a lazy
//!   sequence of token texts
//! - **HTTP server mode**: a REST endpoint exposing image generation
//!
//! # Usage
//!
//! ## HTTP server mode
//!
//! ```bash
//! perchance-gen-server --port 8888 --host 0.0.0.0
//! ```
//!
//! ## One-shot CLI
//!
//! ```bash
//! perchance-gen --prompt "a cat sitting on stairs"
//! ```
//!
//! # Examples
//!
//! ```rust
//! use perchance_gen_provider::{ImageGenerator, Settings};
//!
//! # fn example() -> perchance_gen_provider::Result<()> {
//! let settings = Settings::default();
//! let generator = ImageGenerator::new(settings)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod server;
pub mod types;
pub mod utils;

pub use config::Settings;
pub use error::{Error, Result};
pub use generator::{ImageGenerator, ImageResult, TextGenerator, TokenStream};
pub use types::{ImageRequest, ImageShape, TextRequest};
