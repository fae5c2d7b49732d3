//! Common test utilities and helpers
//!
//! This module provides shared scripted backends for integration tests.
//! Counters are handed out as shared handles because the generator takes
//! ownership of its backend and key source.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use perchance_gen_provider::generator::{
    ImageBackend, KeySource, PollOutcome, RetryReason, SessionKey,
};
use perchance_gen_provider::types::{ImagePayload, ImageRequest};
use perchance_gen_provider::{Error, Result, Settings};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Settings with zeroed backoffs so polling tests run instantly
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.generation.forbidden_backoff_secs = 0;
    settings.generation.rate_limit_backoff_secs = 0;
    settings.generation.transient_backoff_secs = 0;
    settings
}

/// A terminal payload for scripted backends
pub fn payload(image_id: &str) -> ImagePayload {
    ImagePayload {
        image_id: image_id.to_string(),
        file_extension: "jpeg".to_string(),
        seed: 1234,
        width: 512,
        height: 512,
        maybe_nsfw: false,
    }
}

/// Key source handing out sequentially numbered scripted keys
#[derive(Debug, Default)]
pub struct ScriptedKeySource {
    pub acquisitions: Arc<AtomicUsize>,
}

impl ScriptedKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the acquisition counter
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.acquisitions.clone()
    }
}

#[async_trait]
impl KeySource for ScriptedKeySource {
    async fn acquire(&self) -> Result<SessionKey> {
        let n = self.acquisitions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionKey::new(format!("key-{}", n)))
    }
}

/// Key source that always fails with a connection error
#[derive(Debug, Default)]
pub struct FailingKeySource;

#[async_trait]
impl KeySource for FailingKeySource {
    async fn acquire(&self) -> Result<SessionKey> {
        Err(Error::connection("scripted bootstrap failure"))
    }
}

/// Backend driven by a fixed script of poll outcomes. Once the script is
/// exhausted it keeps returning transient outcomes. Poll and fetch counts
/// are observable through shared handles.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<Vec<PollOutcome>>,
    polls: Arc<AtomicUsize>,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(outcomes: Vec<PollOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes),
            polls: Arc::new(AtomicUsize::new(0)),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared handle to the poll counter
    pub fn poll_counter(&self) -> Arc<AtomicUsize> {
        self.polls.clone()
    }

    /// Shared handle to the image fetch counter
    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }
}

#[async_trait]
impl ImageBackend for ScriptedBackend {
    async fn poll_generate(&self, _request: &ImageRequest, _key: &SessionKey) -> PollOutcome {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            PollOutcome::Retry(RetryReason::Backend)
        } else {
            script.remove(0)
        }
    }

    async fn fetch_image(&self, image_id: &str) -> Result<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(format!("bytes-of-{}", image_id)))
    }
}
