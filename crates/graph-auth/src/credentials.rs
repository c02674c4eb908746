//! Cached bearer credential and the refresh orchestrator
//!
//! Each connection owns exactly one `CredentialStore`. Readers take a brief
//! read lock to check freshness; only a caller that sees a stale credential
//! goes on to the refresh guard, a tokio Mutex held across the
//! check-then-acquire critical section and nothing else. Freshness is checked
//! again once the guard is held, so callers queued behind an in-flight refresh
//! observe its result instead of issuing a second network call.
//!
//! Freshness is exact: a token is usable iff it is non-empty and
//! `now < expires_at`. There is no early-refresh margin.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use common::Secret;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::Result;

/// One bearer token lease.
///
/// An empty `access_token` means the credential was never acquired. A token
/// without `expires_at` is never fresh.
#[derive(Clone, Default)]
pub struct Credential {
    access_token: String,
    expires_at: Option<Instant>,
    refresh_token: Option<Secret<String>>,
}

impl Credential {
    /// A credential expiring `expires_in` after `received_at`.
    ///
    /// A lifetime past the clock's range leaves `expires_at` unset, so the
    /// credential is never fresh.
    pub fn new(access_token: impl Into<String>, received_at: Instant, expires_in: Duration) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: received_at.checked_add(expires_in),
            refresh_token: None,
        }
    }

    /// Attach the refresh token issued alongside the access token.
    pub fn with_refresh_token(mut self, refresh_token: Option<Secret<String>>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn refresh_token(&self) -> Option<&Secret<String>> {
        self.refresh_token.as_ref()
    }

    /// Usable at `now`: non-empty and strictly before expiry.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        !self.access_token.is_empty() && self.expires_at.is_some_and(|expires_at| now < expires_at)
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Instant::now())
    }

    /// Time left before expiry, zero when stale or never acquired.
    pub fn remaining(&self) -> Duration {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access_token = if self.access_token.is_empty() {
            "<empty>"
        } else {
            "[REDACTED]"
        };
        f.debug_struct("Credential")
            .field("access_token", &access_token)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token)
            .finish()
    }
}

/// Per-connection credential cache with a single refresh guard.
pub struct CredentialStore {
    current: RwLock<Credential>,
    refresh_guard: Mutex<()>,
}

impl CredentialStore {
    /// Start with an empty (never acquired) credential.
    pub fn new() -> Self {
        Self::with_credential(Credential::default())
    }

    /// Start from a credential obtained elsewhere (e.g. restored refresh token).
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            current: RwLock::new(credential),
            refresh_guard: Mutex::new(()),
        }
    }

    /// Clone of the credential as it stands now. May be stale.
    pub async fn snapshot(&self) -> Credential {
        self.current.read().await.clone()
    }

    /// Return a fresh credential, calling `acquire` only when needed.
    ///
    /// `acquire` receives the stale credential (so a refresh-token grant can
    /// read the held refresh token) and runs with the refresh guard held. At
    /// most one `acquire` runs per store at a time. On error the stored
    /// credential is left untouched and the error is returned; the next call
    /// retries.
    pub async fn ensure_fresh<F, Fut>(&self, acquire: F) -> Result<Credential>
    where
        F: FnOnce(Credential) -> Fut,
        Fut: Future<Output = Result<Credential>>,
    {
        {
            let current = self.current.read().await;
            if current.is_fresh() {
                return Ok(current.clone());
            }
        }

        let _guard = self.refresh_guard.lock().await;

        let current = self.snapshot().await;
        if current.is_fresh() {
            debug!("credential refreshed by a concurrent caller, skipping acquisition");
            return Ok(current);
        }

        debug!(
            never_acquired = current.access_token.is_empty(),
            "credential stale, acquiring"
        );
        self.acquire_locked(current, acquire).await
    }

    /// Acquire unconditionally, even if the held credential is still fresh.
    ///
    /// Serialized with `ensure_fresh` through the same guard.
    pub async fn force_refresh<F, Fut>(&self, acquire: F) -> Result<Credential>
    where
        F: FnOnce(Credential) -> Fut,
        Fut: Future<Output = Result<Credential>>,
    {
        let _guard = self.refresh_guard.lock().await;
        let current = self.snapshot().await;
        self.acquire_locked(current, acquire).await
    }

    /// Replace the held credential outright.
    pub async fn replace(&self, credential: Credential) {
        let _guard = self.refresh_guard.lock().await;
        *self.current.write().await = credential;
    }

    /// Drop the held credential so the next `ensure_fresh` acquires.
    pub async fn clear(&self) {
        self.replace(Credential::default()).await;
    }

    /// Caller must hold `refresh_guard`.
    async fn acquire_locked<F, Fut>(&self, current: Credential, acquire: F) -> Result<Credential>
    where
        F: FnOnce(Credential) -> Fut,
        Fut: Future<Output = Result<Credential>>,
    {
        match acquire(current).await {
            Ok(credential) => {
                info!(
                    expires_in_secs = credential.remaining().as_secs(),
                    has_refresh_token = credential.refresh_token.is_some(),
                    "credential refreshed"
                );
                *self.current.write().await = credential.clone();
                Ok(credential)
            }
            Err(e) => {
                warn!(error = %e, "credential refresh failed, keeping previous credential");
                Err(e)
            }
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
