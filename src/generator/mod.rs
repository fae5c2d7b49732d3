//! Generation engine
//!
//! This module holds the core of the provider: session key acquisition
//! through browser bootstrap, the credential store, the request executor
//! with its response classification, and the per-backend orchestrators
//! (poll-until-terminal for images, streamed decode for text).

pub mod acquire;
pub mod decode;
pub mod executor;
pub mod image;
pub mod key;
pub mod text;

pub use acquire::{BackendProfile, BrowserKeySource, KeySource};
pub use decode::EventBlockDecoder;
pub use executor::{HttpImageBackend, ImageBackend, PollOutcome, RetryReason};
pub use image::{ImageGenerator, ImageGeneratorGeneric, ImageResult};
pub use key::{KeyStore, SessionKey};
pub use text::{TextGenerator, TextGeneratorGeneric, TokenStream};
