//! Image generation orchestration
//!
//! Wraps the executor in a poll-until-terminal state machine: refresh the
//! session key, poll the backend under a deadline with status-dependent
//! backoff, and map the terminal outcome onto the error taxonomy. The
//! finished image is represented by [`ImageResult`], which defers the
//! actual byte download until asked.

use crate::{
    Error, Result,
    config::Settings,
    generator::{
        acquire::{BackendProfile, BrowserKeySource, KeySource},
        executor::{HttpImageBackend, ImageBackend, PollOutcome},
        key::KeyStore,
    },
    types::{ImagePayload, ImageRequest},
    utils::Deadline,
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Convenience alias for the production generator (HTTP backend, browser
/// key source)
pub type ImageGenerator = ImageGeneratorGeneric<HttpImageBackend, BrowserKeySource>;

/// One long-lived image generation session.
///
/// Owns its credential store exclusively; a key acquired here is never
/// shared with another generator instance. Concurrent generations on the
/// same session are allowed and independent except for racing to refresh
/// the shared store, which is safe because the store only installs newer
/// keys.
#[derive(Debug)]
pub struct ImageGeneratorGeneric<B: ImageBackend, K: KeySource> {
    settings: Arc<Settings>,
    backend: Arc<B>,
    key_source: K,
    keys: KeyStore,
}

impl ImageGenerator {
    /// Create a generator for the configured image backend
    pub fn new(settings: Settings) -> Result<Self> {
        let backend = HttpImageBackend::new(&settings)?;
        let key_source = BrowserKeySource::new(
            BackendProfile::image(&settings.generation.image_api_base),
            &settings,
        );
        Ok(Self::with_parts(settings, backend, key_source))
    }
}

impl<B: ImageBackend, K: KeySource> ImageGeneratorGeneric<B, K> {
    /// Create a generator from explicit parts. Production code goes
    /// through [`ImageGenerator::new`]; tests inject scripted backends
    /// and key sources here.
    pub fn with_parts(settings: Settings, backend: B, key_source: K) -> Self {
        Self {
            settings: Arc::new(settings),
            backend: Arc::new(backend),
            key_source,
            keys: KeyStore::new(),
        }
    }

    /// Ensure a session key is cached, acquiring one when the store is
    /// empty. Keys are not re-validated proactively; staleness surfaces
    /// as an invalid-key poll outcome.
    pub async fn refresh(&self) -> Result<()> {
        if self.keys.current().await.is_some() {
            return Ok(());
        }

        let key = self.key_source.acquire().await?;
        self.keys.set(key).await;
        Ok(())
    }

    /// Whether a session key is currently cached
    pub async fn has_cached_key(&self) -> bool {
        self.keys.current().await.is_some()
    }

    /// Generate an image, polling until the backend reports a terminal
    /// status or the deadline expires.
    ///
    /// # Errors
    ///
    /// - [`Error::Auth`] when the backend rejects the session key; the
    ///   store is invalidated so the next call re-acquires
    /// - [`Error::BadRequest`] when the backend rejects the parameters
    /// - [`Error::Connection`] when no terminal status arrives in time
    pub async fn generate(&self, request: &ImageRequest) -> Result<ImageResult<B>> {
        self.refresh().await?;

        tracing::debug!(
            "Polling image generation, shape {:?}, seed {}",
            request.shape,
            request.seed
        );

        let deadline = Deadline::new(
            self.settings.generation.poll_deadline(),
            "a terminal generation status",
        );

        loop {
            deadline.tick()?;

            let key = self
                .keys
                .current()
                .await
                .ok_or_else(|| Error::connection("no session key cached"))?;

            match self.backend.poll_generate(request, &key).await {
                PollOutcome::Complete(payload) => {
                    tracing::info!(
                        "Image {} generated at {}x{}",
                        payload.image_id,
                        payload.width,
                        payload.height
                    );
                    return Ok(ImageResult::from_payload(
                        payload,
                        request,
                        self.backend.clone(),
                    ));
                }
                PollOutcome::Retry(reason) => {
                    let backoff = reason.backoff(&self.settings.generation);
                    tracing::debug!(
                        "Transient poll outcome {:?}, backing off {:?}",
                        reason,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                PollOutcome::InvalidKey => {
                    // The original request already failed against the old
                    // key; surface the failure instead of silently
                    // retrying. The next call's refresh re-acquires.
                    tracing::warn!("Backend rejected the session key, invalidating");
                    self.keys.invalidate().await;
                    return Err(Error::Auth);
                }
                PollOutcome::InvalidData => {
                    return Err(Error::bad_request(
                        "backend rejected the generation parameters",
                    ));
                }
            }
        }
    }
}

/// A finished image generation.
///
/// Metadata is available immediately; the image bytes are fetched from
/// the temporary-image endpoint only on the first [`ImageResult::download`]
/// call and cached for the lifetime of this object.
pub struct ImageResult<B: ImageBackend = HttpImageBackend> {
    backend: Arc<B>,
    cached: OnceCell<Bytes>,

    /// Backend identifier of the generated image
    pub image_id: String,
    /// File extension reported by the backend
    pub file_ext: String,
    /// Seed the backend actually used
    pub seed: i64,
    /// Resolved width in pixels
    pub width: u32,
    /// Resolved height in pixels
    pub height: u32,
    /// Whether the backend flagged the image as possibly NSFW
    pub maybe_nsfw: bool,
    /// Prompt the image was generated from
    pub prompt: String,
    /// Negative prompt, if one was submitted
    pub negative_prompt: Option<String>,
    /// Guidance scale used for generation
    pub guidance_scale: f64,
}

impl<B: ImageBackend> ImageResult<B> {
    fn from_payload(payload: ImagePayload, request: &ImageRequest, backend: Arc<B>) -> Self {
        Self {
            backend,
            cached: OnceCell::new(),
            image_id: payload.image_id,
            file_ext: payload.file_extension,
            seed: payload.seed,
            width: payload.width,
            height: payload.height,
            maybe_nsfw: payload.maybe_nsfw,
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            guidance_scale: request.guidance_scale,
        }
    }

    /// Size of the image as (width, height)
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// File name in the backend's `{image_id}.{file_ext}` convention
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.image_id, self.file_ext)
    }

    /// Download the image bytes. The first call fetches from the
    /// temporary-image endpoint; later calls return the cached bytes.
    pub async fn download(&self) -> Result<&Bytes> {
        self.cached
            .get_or_try_init(|| async {
                tracing::debug!("Downloading image {}", self.image_id);
                self.backend.fetch_image(&self.image_id).await
            })
            .await
    }

    /// Download and write the image to disk. Defaults to
    /// [`ImageResult::file_name`] in the working directory.
    pub async fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(self.file_name()));

        let bytes = self.download().await?;
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

impl<B: ImageBackend> std::fmt::Display for ImageResult<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

impl<B: ImageBackend> std::fmt::Debug for ImageResult<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageResult")
            .field("image_id", &self.image_id)
            .field("file_ext", &self.file_ext)
            .field("seed", &self.seed)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("maybe_nsfw", &self.maybe_nsfw)
            .finish()
    }
}
