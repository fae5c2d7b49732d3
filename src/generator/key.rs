//! Session key storage
//!
//! The backend authorizes generation requests with an ephemeral "user key"
//! intercepted during browser bootstrap. Each generator owns one
//! [`KeyStore`] holding at most one cached key. There is no proactive
//! expiry: staleness is only discovered when the backend rejects a request
//! with an invalid-key status, at which point the orchestrator invalidates
//! the store.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// An ephemeral backend credential with its acquisition time.
///
/// Keys are replaced, never mutated: a refresh installs a whole new
/// `SessionKey`.
#[derive(Clone)]
pub struct SessionKey {
    secret: String,
    acquired_at: DateTime<Utc>,
}

impl SessionKey {
    /// Wrap a freshly intercepted key string
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            acquired_at: Utc::now(),
        }
    }

    /// The opaque credential string
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// When the key was acquired
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

// Keys are credentials; keep the secret out of debug output.
impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("secret", &"<redacted>")
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}

/// Holds the single cached session key for one generator.
///
/// Concurrent image generations on the same generator may race to refresh;
/// [`KeyStore::set`] only installs a key that is at least as new as the
/// cached one, so a late-arriving older acquisition cannot clobber a
/// fresher key. Staleness is always caught reactively, so no stricter
/// synchronization is needed.
#[derive(Debug, Default)]
pub struct KeyStore {
    slot: RwLock<Option<SessionKey>>,
}

impl KeyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached key, if any
    pub async fn current(&self) -> Option<SessionKey> {
        self.slot.read().await.clone()
    }

    /// Install a newly acquired key. Keeps the cached key when it is newer
    /// than the candidate.
    pub async fn set(&self, key: SessionKey) {
        let mut slot = self.slot.write().await;
        match slot.as_ref() {
            Some(current) if current.acquired_at() > key.acquired_at() => {
                tracing::debug!("Keeping cached session key newer than the candidate");
            }
            _ => *slot = Some(key),
        }
    }

    /// Drop the cached key so the next refresh re-acquires
    pub async fn invalidate(&self) {
        self.slot.write().await.take();
    }
}
