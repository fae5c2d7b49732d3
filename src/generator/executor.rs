//! Generation request execution and response classification
//!
//! The backend is rate limited, fronted by an anti-bot layer, and speaks
//! no formal contract: it answers with a mix of HTTP status codes, empty
//! or non-JSON bodies, and a free-form `status` string. This module turns
//! each raw response into a closed [`PollOutcome`] so every call site
//! pattern-matches exhaustively instead of comparing strings.

use crate::{
    Error, Result,
    config::{GenerationSettings, Settings},
    generator::key::SessionKey,
    types::{BackendStatus, ImagePayload, ImageRequest},
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue, ORIGIN, PRAGMA,
    REFERER, USER_AGENT,
};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use uuid::Uuid;

/// Classification of one generation poll response
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Terminal success with the decoded image payload
    Complete(ImagePayload),
    /// Transient condition; back off and poll again
    Retry(RetryReason),
    /// The backend rejected the session key itself
    InvalidKey,
    /// The backend rejected the submitted generation parameters
    InvalidData,
}

/// Why a poll response was classified as transient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// HTTP 403 from the anti-bot layer
    Forbidden,
    /// HTTP 429 rate limiting
    RateLimited,
    /// Any other non-200 status, unparsable body, or non-terminal status
    Backend,
}

impl RetryReason {
    /// Status-dependent backoff before the next poll
    pub fn backoff(&self, settings: &GenerationSettings) -> Duration {
        match self {
            Self::Forbidden => settings.forbidden_backoff(),
            Self::RateLimited => settings.rate_limit_backoff(),
            Self::Backend => settings.transient_backoff(),
        }
    }
}

/// Classify one raw poll response.
///
/// Unparsable and empty bodies are transient, never hard failures: the
/// anti-bot layer serves HTML error pages in place of JSON when it
/// throttles, and those clear on retry. A `success` envelope with a
/// malformed terminal payload is treated the same way.
pub fn classify_poll_response(status: StatusCode, body: &str) -> PollOutcome {
    if status == StatusCode::FORBIDDEN {
        return PollOutcome::Retry(RetryReason::Forbidden);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return PollOutcome::Retry(RetryReason::RateLimited);
    }
    if !status.is_success() {
        tracing::debug!("Generation poll returned HTTP {}", status);
        return PollOutcome::Retry(RetryReason::Backend);
    }

    if body.trim().is_empty() {
        return PollOutcome::Retry(RetryReason::Backend);
    }

    let Ok(envelope) = serde_json::from_str::<BackendStatus>(body) else {
        tracing::debug!("Generation poll body is not JSON");
        return PollOutcome::Retry(RetryReason::Backend);
    };

    match envelope.as_str() {
        "invalid_key" => PollOutcome::InvalidKey,
        "invalid_data" => PollOutcome::InvalidData,
        "success" => match serde_json::from_str::<ImagePayload>(body) {
            Ok(payload) => PollOutcome::Complete(payload),
            Err(e) => {
                tracing::debug!("Terminal payload malformed: {}", e);
                PollOutcome::Retry(RetryReason::Backend)
            }
        },
        other => {
            tracing::trace!("Non-terminal backend status: {}", other);
            PollOutcome::Retry(RetryReason::Backend)
        }
    }
}

/// Executes image generation requests against a backend.
///
/// `poll_generate` issues exactly one HTTP call and classifies the
/// response; it never mutates the credential store. `fetch_image`
/// downloads a finished image from the temporary-image endpoint.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Issue one generation poll carrying the cached key
    async fn poll_generate(&self, request: &ImageRequest, key: &SessionKey) -> PollOutcome;

    /// Download the bytes of a finished image
    async fn fetch_image(&self, image_id: &str) -> Result<Bytes>;
}

/// HTTP implementation of [`ImageBackend`] reproducing the backend's
/// exact header and parameter contract.
#[derive(Debug, Clone)]
pub struct HttpImageBackend {
    client: Client,
    api_base: String,
}

impl HttpImageBackend {
    /// Create a backend client from settings
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.generation.request_timeout())
            .build()?;

        Ok(Self {
            client,
            api_base: settings.generation.image_api_base.clone(),
        })
    }
}

#[async_trait]
impl ImageBackend for HttpImageBackend {
    async fn poll_generate(&self, request: &ImageRequest, key: &SessionKey) -> PollOutcome {
        let params = [
            ("prompt", request.prompt.clone()),
            (
                "negativePrompt",
                request.negative_prompt.clone().unwrap_or_default(),
            ),
            ("userKey", key.secret().to_string()),
            ("__cache_bust", Uuid::new_v4().simple().to_string()),
            ("seed", request.seed.to_string()),
            ("resolution", request.shape.resolution_param().to_string()),
            ("guidanceScale", request.guidance_scale.to_string()),
            ("channel", "ai-text-to-image-generator".to_string()),
            ("subChannel", "public".to_string()),
            ("requestId", Uuid::new_v4().simple().to_string()),
        ];

        let response = match self
            .client
            .post(format!("{}/generate", self.api_base))
            .headers(browser_headers(true))
            .query(&params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Generation poll failed to send: {}", e);
                return PollOutcome::Retry(RetryReason::Backend);
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        classify_poll_response(status, &body)
    }

    async fn fetch_image(&self, image_id: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(format!("{}/downloadTemporaryImage", self.api_base))
            .headers(browser_headers(false))
            .query(&[("imageId", image_id)])
            .send()
            .await
            .map_err(|e| Error::connection(format!("image download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::connection(format!(
                "image download returned HTTP {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::connection(format!("image download failed: {}", e)))
    }
}

/// Static browser-mimicking header set the backend expects verbatim.
/// Accept-Encoding is negotiated by the client so responses decompress
/// transparently.
pub(crate) fn browser_headers(no_cache: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9,zh-TW;q=0.8,zh;q=0.7"),
    );
    headers.insert(
        REFERER,
        HeaderValue::from_static("https://perchance.org/ai-text-to-image-generator"),
    );
    headers.insert(ORIGIN, HeaderValue::from_static("https://perchance.org"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("empty"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-site"),
    );
    if no_cache {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SUCCESS_BODY: &str = r#"{
        "status": "success",
        "imageId": "img42",
        "fileExtension": "jpeg",
        "seed": 7,
        "width": 512,
        "height": 512,
        "maybeNsfw": false
    }"#;

    #[test]
    fn test_classify_success() {
        let outcome = classify_poll_response(StatusCode::OK, SUCCESS_BODY);
        match outcome {
            PollOutcome::Complete(payload) => {
                assert_eq!(payload.image_id, "img42");
                assert_eq!(payload.file_extension, "jpeg");
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[rstest]
    #[case(StatusCode::FORBIDDEN, RetryReason::Forbidden)]
    #[case(StatusCode::TOO_MANY_REQUESTS, RetryReason::RateLimited)]
    #[case(StatusCode::BAD_GATEWAY, RetryReason::Backend)]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, RetryReason::Backend)]
    fn test_classify_http_errors(#[case] status: StatusCode, #[case] expected: RetryReason) {
        let outcome = classify_poll_response(status, "");
        assert!(matches!(outcome, PollOutcome::Retry(reason) if reason == expected));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("<html>blocked</html>")]
    #[case(r#"{"status": "waiting_in_queue"}"#)]
    #[case(r#"{"noStatus": true}"#)]
    fn test_classify_transient_bodies(#[case] body: &str) {
        let outcome = classify_poll_response(StatusCode::OK, body);
        assert!(matches!(
            outcome,
            PollOutcome::Retry(RetryReason::Backend)
        ));
    }

    #[test]
    fn test_classify_invalid_key() {
        let outcome = classify_poll_response(StatusCode::OK, r#"{"status": "invalid_key"}"#);
        assert!(matches!(outcome, PollOutcome::InvalidKey));
    }

    #[test]
    fn test_classify_invalid_data() {
        let outcome = classify_poll_response(StatusCode::OK, r#"{"status": "invalid_data"}"#);
        assert!(matches!(outcome, PollOutcome::InvalidData));
    }

    #[test]
    fn test_classify_malformed_terminal_payload_is_transient() {
        let body = r#"{"status": "success", "imageId": "img42"}"#;
        let outcome = classify_poll_response(StatusCode::OK, body);
        assert!(matches!(
            outcome,
            PollOutcome::Retry(RetryReason::Backend)
        ));
    }

    #[test]
    fn test_backoff_mapping() {
        let settings = GenerationSettings::default();
        assert_eq!(
            RetryReason::Forbidden.backoff(&settings),
            Duration::from_secs(5)
        );
        assert_eq!(
            RetryReason::RateLimited.backoff(&settings),
            Duration::from_secs(10)
        );
        assert_eq!(
            RetryReason::Backend.backoff(&settings),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_browser_headers() {
        let headers = browser_headers(true);
        assert!(headers.get(USER_AGENT).unwrap().to_str().unwrap().contains("Chrome/120"));
        assert_eq!(headers.get(ORIGIN).unwrap(), "https://perchance.org");
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-cache");

        let headers = browser_headers(false);
        assert!(headers.get(CACHE_CONTROL).is_none());
        assert!(headers.get(PRAGMA).is_none());
    }
}
