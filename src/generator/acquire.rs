//! Session key acquisition via headless browser bootstrap
//!
//! The backend's verification handshake is undocumented and only
//! observable as a side effect of its demo page's own JavaScript, so the
//! only robust extraction point is network-level interception: drive a
//! real browser through the page's bootstrap flow, watch every outgoing
//! request, and lift the key field out of the verification response body.
//! Page-content parsing is deliberately avoided.

use crate::{
    Error, Result,
    config::{BrowserSettings, Settings},
    generator::key::SessionKey,
    utils::Deadline,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFinished, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Response body field carrying the session key
const USER_KEY_FIELD: &str = "userKey";

/// Sleep between poll iterations while waiting on the page
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A source of fresh session keys.
///
/// The production implementation drives a headless browser; tests inject
/// scripted sources.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Acquire a fresh, non-empty session key or fail with
    /// [`Error::Connection`].
    async fn acquire(&self) -> Result<SessionKey>;
}

/// One backend's bootstrap-and-intercept sequence.
///
/// The image and text backends share the same flow and differ only in the
/// demo page, the clicked controls and the verification endpoint.
#[derive(Debug, Clone)]
pub struct BackendProfile {
    /// Public demo page that triggers the verification handshake
    pub bootstrap_url: String,
    /// URL prefix identifying the verification request to intercept
    pub verify_prefix: String,
    /// Element id of the control that provokes a generation
    pub generate_button: &'static str,
    /// Element id of the control that cancels the provoked generation
    pub stop_button: Option<&'static str>,
}

impl BackendProfile {
    /// Bootstrap sequence for the image backend
    pub fn image(api_base: &str) -> Self {
        Self {
            bootstrap_url: "https://perchance.org/ai-text-to-image-generator".to_string(),
            verify_prefix: format!("{}/verifyUser", api_base),
            generate_button: "generateButtonEl",
            stop_button: None,
        }
    }

    /// Bootstrap sequence for the text backend.
    ///
    /// The stop control is clicked once the key is in hand: the goal is
    /// only to provoke the verification call, not to run a generation.
    pub fn text(api_base: &str) -> Self {
        Self {
            bootstrap_url: "https://perchance.org/ai-text-generator".to_string(),
            verify_prefix: format!("{}/verifyUser", api_base),
            generate_button: "generateBtn",
            stop_button: Some("stopBtn"),
        }
    }
}

/// Acquires session keys by replaying the demo page's bootstrap flow in a
/// headless browser and intercepting the verification response.
#[derive(Debug)]
pub struct BrowserKeySource {
    profile: BackendProfile,
    browser: BrowserSettings,
    key_deadline: Duration,
}

impl BrowserKeySource {
    /// Create a key source for one backend profile
    pub fn new(profile: BackendProfile, settings: &Settings) -> Self {
        Self {
            profile,
            browser: settings.browser.clone(),
            key_deadline: settings.generation.key_deadline(),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = &self.browser.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if !self.browser.headless {
            builder = builder.with_head();
        }
        builder.build().map_err(Error::connection)
    }

    /// Launch an isolated browser, run the interception flow, and tear the
    /// browser down on every exit path. A failed close handshake still
    /// ends with the child process killed when the handle drops.
    async fn run_bootstrap(&self) -> Result<String> {
        let (mut browser, mut handler) = Browser::launch(self.browser_config()?).await?;
        let driver = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let outcome = self.intercept_key(&browser).await;

        if let Err(e) = browser.close().await {
            tracing::debug!("Browser close failed: {}", e);
        }
        let _ = browser.wait().await;
        driver.abort();

        outcome
    }

    async fn intercept_key(&self, browser: &Browser) -> Result<String> {
        let page = browser.new_page("about:blank").await?;
        page.execute(EnableParams::default()).await?;

        let captured: Arc<Mutex<Option<String>>> = Arc::default();
        let watcher = spawn_verify_watcher(
            &page,
            self.profile.verify_prefix.clone(),
            captured.clone(),
        )
        .await?;

        page.goto(self.profile.bootstrap_url.clone()).await?;

        let deadline = Deadline::new(self.key_deadline, "session key interception");
        click_in_embedded_frame(&page, &deadline, self.profile.generate_button).await?;

        let key = loop {
            deadline.tick()?;
            if let Some(key) = captured.lock().await.clone() {
                break key;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };

        // Cancel the provoked generation; the key is already in hand.
        if let Some(stop) = self.profile.stop_button
            && let Err(e) = click_in_embedded_frame(&page, &deadline, stop).await
        {
            tracing::debug!("Stop control click failed: {}", e);
        }

        watcher.abort();
        Ok(key)
    }
}

#[async_trait]
impl KeySource for BrowserKeySource {
    async fn acquire(&self) -> Result<SessionKey> {
        tracing::info!(
            "Acquiring session key via browser bootstrap of {}",
            self.profile.bootstrap_url
        );

        // The backend gives no structured failure signal, so every
        // automation failure folds into the connection kind.
        match self.run_bootstrap().await {
            Ok(key) => {
                tracing::info!("Session key intercepted");
                Ok(SessionKey::new(key))
            }
            Err(e) => {
                tracing::warn!("Browser bootstrap failed: {}", e);
                Err(Error::connection(format!(
                    "session key acquisition failed: {}",
                    e
                )))
            }
        }
    }
}

/// Watch network traffic for the verification call and capture the key
/// field from its response body. The first non-empty key wins; malformed
/// or unfetchable bodies are skipped so one bad match never aborts the
/// whole flow.
async fn spawn_verify_watcher(
    page: &Page,
    verify_prefix: String,
    captured: Arc<Mutex<Option<String>>>,
) -> Result<tokio::task::JoinHandle<()>> {
    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let mut finished = page.event_listener::<EventLoadingFinished>().await?;
    let page = page.clone();

    Ok(tokio::spawn(async move {
        let mut matched: HashSet<RequestId> = HashSet::new();
        loop {
            tokio::select! {
                event = responses.next() => {
                    let Some(event) = event else { break };
                    if event.response.url.starts_with(&verify_prefix) {
                        matched.insert(event.request_id.clone());
                    }
                }
                event = finished.next() => {
                    let Some(event) = event else { break };
                    if !matched.remove(&event.request_id) {
                        continue;
                    }
                    let Some(key) = fetch_user_key(&page, event.request_id.clone()).await else {
                        continue;
                    };
                    let mut slot = captured.lock().await;
                    if slot.is_none() {
                        *slot = Some(key);
                    }
                }
            }
        }
    }))
}

/// Fetch an intercepted response body and extract a non-empty key field.
/// Returns `None` on any failure; interception retries on later matches.
async fn fetch_user_key(page: &Page, request_id: RequestId) -> Option<String> {
    let body = page
        .execute(GetResponseBodyParams::new(request_id))
        .await
        .ok()?;

    let raw = if body.base64_encoded {
        let bytes = BASE64.decode(body.body.as_bytes()).ok()?;
        String::from_utf8(bytes).ok()?
    } else {
        body.body.clone()
    };

    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let key = value.get(USER_KEY_FIELD)?.as_str()?;
    (!key.is_empty()).then(|| key.to_string())
}

/// Click a control inside the page's embedded sub-document, retrying until
/// the frame content exists or the deadline raises. The generator UI lives
/// in an iframe that loads after the outer page.
async fn click_in_embedded_frame(page: &Page, deadline: &Deadline, button_id: &str) -> Result<()> {
    let expr = format!(
        r#"(() => {{
            try {{
                const frame = document.querySelector('iframe[src]');
                if (!frame || !frame.contentWindow) return 'no-frame';
                const button = frame.contentWindow.document.getElementById('{}');
                if (!button) return 'no-button';
                button.click();
                return 'clicked';
            }} catch (err) {{
                return 'error: ' + err.message;
            }}
        }})()"#,
        button_id
    );

    loop {
        deadline.tick()?;

        let state = match page.evaluate(expr.clone()).await {
            Ok(result) => result.into_value::<String>().unwrap_or_default(),
            Err(e) => {
                tracing::trace!("Frame evaluation failed: {}", e);
                String::new()
            }
        };

        if state == "clicked" {
            return Ok(());
        }

        tracing::trace!("Embedded frame not ready ({}), retrying", state);
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_profile() {
        let profile = BackendProfile::image("https://image-generation.perchance.org/api");
        assert_eq!(
            profile.verify_prefix,
            "https://image-generation.perchance.org/api/verifyUser"
        );
        assert!(profile.bootstrap_url.ends_with("ai-text-to-image-generator"));
        assert_eq!(profile.generate_button, "generateButtonEl");
        assert!(profile.stop_button.is_none());
    }

    #[test]
    fn test_text_profile() {
        let profile = BackendProfile::text("https://text-generation.perchance.org/api");
        assert_eq!(
            profile.verify_prefix,
            "https://text-generation.perchance.org/api/verifyUser"
        );
        assert!(profile.bootstrap_url.ends_with("ai-text-generator"));
        assert_eq!(profile.generate_button, "generateBtn");
        assert_eq!(profile.stop_button, Some("stopBtn"));
    }

    #[test]
    fn test_browser_source_uses_settings_deadline() {
        let mut settings = Settings::default();
        settings.generation.key_deadline_secs = 7;

        let source = BrowserKeySource::new(
            BackendProfile::image(&settings.generation.image_api_base),
            &settings,
        );
        assert_eq!(source.key_deadline, Duration::from_secs(7));
    }
}
