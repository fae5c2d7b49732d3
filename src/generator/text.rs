//! Streamed text generation orchestration
//!
//! The text backend accepts or rejects a job synchronously, then streams
//! event blocks until it closes the connection. There is no polling loop:
//! a non-OK handshake is fatal, and a decode failure mid-stream means the
//! session is broken, not that the backend is flaky.

use crate::{
    Error, Result,
    config::Settings,
    generator::{
        acquire::{BackendProfile, BrowserKeySource, KeySource},
        decode::EventBlockDecoder,
        executor::browser_headers,
        key::KeyStore,
    },
    types::{BackendStatus, TextRequest},
};
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// Convenience alias for the production generator (browser key source)
pub type TextGenerator = TextGeneratorGeneric<BrowserKeySource>;

/// One long-lived text generation session.
///
/// At most one generation may be in flight per session: a second `text`
/// call waits on the session lock until the first call's stream has fully
/// closed, so two generations never interleave requests against the same
/// key. Queued callers are served in arrival order.
#[derive(Debug)]
pub struct TextGeneratorGeneric<K: KeySource> {
    settings: Arc<Settings>,
    client: Client,
    key_source: K,
    keys: KeyStore,
    lock: Arc<Mutex<()>>,
}

impl TextGenerator {
    /// Create a generator for the configured text backend
    pub fn new(settings: Settings) -> Result<Self> {
        let key_source = BrowserKeySource::new(
            BackendProfile::text(&settings.generation.text_api_base),
            &settings,
        );
        Self::with_key_source(settings, key_source)
    }
}

impl<K: KeySource> TextGeneratorGeneric<K> {
    /// Create a generator with an explicit key source. Tests inject
    /// scripted sources here.
    pub fn with_key_source(settings: Settings, key_source: K) -> Result<Self> {
        // No whole-request timeout: it would cut long-lived token streams
        // short. Only the connect phase is bounded.
        let client = Client::builder()
            .connect_timeout(settings.generation.request_timeout())
            .build()?;

        Ok(Self {
            settings: Arc::new(settings),
            client,
            key_source,
            keys: KeyStore::new(),
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Ensure a session key is cached, acquiring one when the store is
    /// empty
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

    /// Start a streamed text generation.
    ///
    /// Returns a forward-only [`TokenStream`] of decoded token texts. The
    /// stream terminates when the backend closes its connection; dropping
    /// it early cancels the generation and releases the session lock.
    ///
    /// # Errors
    ///
    /// - [`Error::Auth`] when the handshake reports an invalid key; the
    ///   store is invalidated so the next call re-acquires
    /// - [`Error::BadRequest`] when the handshake rejects the parameters
    /// - [`Error::Connection`] for any other handshake failure
    pub async fn text(&self, request: &TextRequest) -> Result<TokenStream> {
        let permit = self.lock.clone().lock_owned().await;
        self.refresh().await?;

        let key = self
            .keys
            .current()
            .await
            .ok_or_else(|| Error::connection("no session key cached"))?;

        let params = [
            ("userKey", key.secret().to_string()),
            ("__cacheBust", Uuid::new_v4().simple().to_string()),
            (
                "requestId",
                format!("aiTextCompletion{}", Uuid::new_v4().simple()),
            ),
        ];
        let body = serde_json::json!({
            "generatorName": "ai-text-generator",
            "instruction": request.prompt,
            "instructionTokenCount": 1,
            "startWith": request.start_with.clone().unwrap_or_default(),
            "startWithTokenCount": 1,
            "stopSequences": [],
        });

        let response = self
            .client
            .post(format!(
                "{}/generate",
                self.settings.generation.text_api_base
            ))
            .headers(browser_headers(false))
            .query(&params)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::connection(format!("text generation handshake failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let err = classify_handshake_failure(status, &body);
            if matches!(err, Error::Auth) {
                tracing::warn!("Backend rejected the session key, invalidating");
                self.keys.invalidate().await;
            }
            return Err(err);
        }

        tracing::debug!("Text generation accepted, streaming tokens");
        Ok(TokenStream::spawn(response, permit))
    }
}

/// Map a non-OK handshake body onto the error taxonomy. Unlike poll
/// responses, an unparsable handshake body is fatal: it signals a broken
/// session rather than ordinary backend flakiness.
fn classify_handshake_failure(status: StatusCode, body: &str) -> Error {
    let Ok(envelope) = serde_json::from_str::<BackendStatus>(body) else {
        return Error::connection(format!("text generation rejected with HTTP {}", status));
    };

    match envelope.as_str() {
        "invalid_key" => Error::Auth,
        "invalid_data" => Error::bad_request("backend rejected the generation parameters"),
        other => Error::connection(format!(
            "text generation rejected with status '{}' (HTTP {})",
            other, status
        )),
    }
}

/// A finite, forward-only stream of decoded token texts.
///
/// Produced once per `text` call and consumable once; the underlying
/// producer task owns the session lock and releases it when the stream
/// ends for any reason (backend close, decode error, consumer drop).
#[derive(Debug)]
pub struct TokenStream {
    inner: ReceiverStream<Result<String>>,
}

impl TokenStream {
    fn spawn(response: reqwest::Response, permit: OwnedMutexGuard<()>) -> Self {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            // Held until this task returns on any path.
            let _permit = permit;

            let mut decoder = EventBlockDecoder::new();
            let mut chunks = response.bytes_stream();

            while let Some(chunk) = chunks.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(Error::connection(format!("stream read failed: {}", e))))
                            .await;
                        return;
                    }
                };

                match decoder.push(&chunk) {
                    Ok(texts) => {
                        for text in texts {
                            // A closed receiver means the consumer is gone.
                            if tx.send(Ok(text)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }

            match decoder.finish() {
                Ok(Some(text)) => {
                    let _ = tx.send(Ok(text)).await;
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        Self {
            inner: ReceiverStream::new(rx),
        }
    }
}

impl Stream for TokenStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
