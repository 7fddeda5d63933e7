//! Access/refresh token store.
//!
//! Owns the session's token pair and the claims cached from the access
//! token. Reads purge expired access tokens as a side effect, so callers
//! never see a token past its expiry. All mutations complete synchronously;
//! there are no await points in this module apart from the proactive
//! refresh timer task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::auth::storage::{MemoryStorage, TokenStorage};
use crate::auth::token::{self, Claims};
use crate::config::AuthConfig;
use crate::error::ApiError;

/// Token store backed by a pluggable storage medium.
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
    config: AuthConfig,
    claims: Mutex<Option<Claims>>,
}

impl TokenStore {
    pub fn new(config: AuthConfig, storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            storage,
            config,
            claims: Mutex::new(None),
        }
    }

    /// Store with the in-memory fallback backend.
    pub fn in_memory(config: AuthConfig) -> Self {
        Self::new(config, Arc::new(MemoryStorage::new()))
    }

    /// Access token, only if present and unexpired. An expired token is
    /// purged before returning `None`.
    pub fn get_access_token(&self) -> Option<String> {
        let stored = self.storage.get(&self.config.access_token_key)?;
        if token::is_expired(&stored) {
            tracing::debug!("access token expired, purging");
            self.storage.remove(&self.config.access_token_key);
            *self.claims.lock().expect("claims mutex poisoned") = None;
            return None;
        }
        Some(stored)
    }

    /// Refresh token as stored; expiry is the caller's concern since an
    /// expired refresh token forces session termination, not a silent purge.
    pub fn get_refresh_token(&self) -> Option<String> {
        self.storage.get(&self.config.refresh_token_key)
    }

    pub fn is_refresh_token_expired(&self) -> bool {
        match self.get_refresh_token() {
            Some(t) => token::is_expired(&t),
            None => true,
        }
    }

    /// Claims decoded from the current access token, if any.
    pub fn claims(&self) -> Option<Claims> {
        // Ensure expiry purge has run before consulting the cache.
        self.get_access_token()?;
        let mut cached = self.claims.lock().expect("claims mutex poisoned");
        if cached.is_none() {
            *cached = self
                .storage
                .get(&self.config.access_token_key)
                .and_then(|t| token::decode_claims(&t));
        }
        cached.clone()
    }

    /// True when the access token's remaining lifetime is at or below the
    /// configured refresh threshold (or there is no usable token at all).
    pub fn is_access_token_expiring_soon(&self) -> bool {
        match self.get_access_token() {
            Some(t) => token::is_expiring_soon(
                &t,
                Duration::from_millis(self.config.refresh_threshold_ms),
            ),
            None => true,
        }
    }

    /// Validate and persist a token pair. Malformed tokens are rejected
    /// with `TokenFormat` and nothing is stored.
    pub fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), ApiError> {
        token::validate_format(access)?;
        token::validate_format(refresh)?;

        self.storage.set(&self.config.access_token_key, access);
        self.storage.set(&self.config.refresh_token_key, refresh);
        *self.claims.lock().expect("claims mutex poisoned") = token::decode_claims(access);

        tracing::debug!("token pair updated");
        Ok(())
    }

    /// Remove both tokens and cached claims. Idempotent.
    pub fn clear_tokens(&self) {
        self.storage.remove(&self.config.access_token_key);
        self.storage.remove(&self.config.refresh_token_key);
        *self.claims.lock().expect("claims mutex poisoned") = None;
        tracing::debug!("tokens cleared");
    }

    /// Arrange a one-shot callback at `remaining - refresh_threshold`.
    /// Returns `None` when there is no usable access token. The returned
    /// handle cancels the timer on `cancel()` or drop, so a logged-out
    /// session is never called back.
    pub fn schedule_proactive_refresh<F>(&self, on_due: F) -> Option<ProactiveRefreshHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let access = self.get_access_token()?;
        let remaining = token::remaining_lifetime(&access);
        let threshold = Duration::from_millis(self.config.refresh_threshold_ms);
        let delay = remaining.saturating_sub(threshold);

        tracing::debug!(delay_ms = delay.as_millis() as u64, "proactive refresh scheduled");

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_due();
        });
        Some(ProactiveRefreshHandle { task })
    }
}

/// Handle to a scheduled proactive refresh. Dropping it cancels the timer.
pub struct ProactiveRefreshHandle {
    task: JoinHandle<()>,
}

impl ProactiveRefreshHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for ProactiveRefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
