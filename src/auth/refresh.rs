//! Single-flight token refresh coordinator.
//!
//! # States
//! - Idle: no refresh outstanding
//! - Refreshing: one refresh call in flight, waiters attached
//!
//! # Guarantee
//! At most one refresh network call is in flight regardless of how many
//! concurrent 401s arrive. The in-progress refresh is held as a `Shared`
//! future; a 401 arriving while it is outstanding clones the handle and
//! awaits the same settlement. The slot is claimed and cleared inside
//! synchronous lock scopes, so the guarantee holds without async locks.
//!
//! Refresh failure clears both tokens and emits exactly one session
//! termination event (from inside the shared future), no matter how many
//! waiters are queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use serde_json::json;

use crate::auth::session::SessionEvents;
use crate::auth::store::TokenStore;
use crate::auth::token;
use crate::error::ApiError;
use crate::observability::metrics;
use crate::transport::{RequestDescriptor, Transport};

type SharedRefresh = Shared<BoxFuture<'static, Result<String, Arc<ApiError>>>>;

pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    session: SessionEvents,
    refresh_path: String,
    refresh_timeout: Duration,
    inflight: Mutex<Option<(u64, SharedRefresh)>>,
    next_id: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        session: SessionEvents,
        refresh_path: String,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            tokens,
            session,
            refresh_path,
            refresh_timeout,
            inflight: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Obtain a fresh access token, joining the in-flight refresh if one
    /// exists. Errors are shared between all waiters, hence the `Arc`.
    pub async fn refresh_access_token(&self) -> Result<String, Arc<ApiError>> {
        let (id, future) = {
            let mut slot = self.inflight.lock().expect("refresh mutex poisoned");
            if let Some((id, fut)) = slot.as_ref() {
                tracing::debug!("joining in-flight token refresh");
                (*id, fut.clone())
            } else {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let fut = perform_refresh(
                    self.transport.clone(),
                    self.tokens.clone(),
                    self.session.clone(),
                    self.refresh_path.clone(),
                    self.refresh_timeout,
                )
                .boxed()
                .shared();
                *slot = Some((id, fut.clone()));
                (id, fut)
            }
        };

        let result = future.await;

        // Clear the slot only if it still belongs to this refresh; a newer
        // refresh may already occupy it.
        let mut slot = self.inflight.lock().expect("refresh mutex poisoned");
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }

        result
    }
}

/// The actual refresh network call. Runs once per shared future, so the
/// clear-tokens/terminate side effects fire exactly once per failure.
async fn perform_refresh(
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    session: SessionEvents,
    refresh_path: String,
    refresh_timeout: Duration,
) -> Result<String, Arc<ApiError>> {
    let refresh_token = match tokens.get_refresh_token() {
        Some(t) if !token::is_expired(&t) => t,
        _ => {
            tracing::warn!("no usable refresh token, terminating session");
            return Err(terminate(&tokens, &session));
        }
    };

    metrics::record_token_refresh();

    let descriptor = RequestDescriptor::post(refresh_path)
        .with_body(json!({ "refreshToken": refresh_token }))
        .with_timeout(refresh_timeout);

    let response = match transport.send(&descriptor).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "token refresh transport failure");
            return Err(terminate(&tokens, &session));
        }
    };

    if !response.is_success() {
        tracing::warn!(status = response.status, "token refresh rejected");
        return Err(terminate(&tokens, &session));
    }

    let access = response.body.get("accessToken").and_then(|v| v.as_str());
    let new_refresh = response
        .body
        .get("refreshToken")
        .and_then(|v| v.as_str())
        .unwrap_or(&refresh_token);

    match access {
        Some(access) => {
            if let Err(e) = tokens.set_tokens(access, new_refresh) {
                tracing::error!(error = %e, "refresh returned malformed tokens");
                return Err(terminate(&tokens, &session));
            }
            tracing::info!("access token refreshed");
            Ok(access.to_string())
        }
        None => {
            tracing::error!("refresh response missing accessToken");
            Err(terminate(&tokens, &session))
        }
    }
}

fn terminate(tokens: &TokenStore, session: &SessionEvents) -> Arc<ApiError> {
    tokens.clear_tokens();
    session.emit_terminated();
    metrics::record_session_terminated();
    Arc::new(ApiError::SessionExpired)
}
