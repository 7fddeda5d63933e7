//! Top-level client handle.
//!
//! Bundles one pipeline and one shared response cache, and hands out
//! [`Fetcher`]s preconfigured per verb. Domain services either build
//! fetchers here or call [`ApiClient::request`] directly; they never touch
//! cache or refresh internals.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::auth::{SessionEvent, TokenStore};
use crate::cache::RequestCache;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::facade::{FetchOptions, Fetcher};
use crate::pipeline::ApiPipeline;
use crate::transport::{RequestDescriptor, Transport};

/// Explicit, constructible client: every instance owns its own token
/// store, cache, and refresh state, so tests and multi-tenant hosts can
/// run isolated sessions side by side.
#[derive(Clone)]
pub struct ApiClient {
    pipeline: Arc<ApiPipeline>,
    cache: RequestCache,
}

impl ApiClient {
    /// Client with the reqwest transport and in-memory token storage.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Ok(Self {
            pipeline: ApiPipeline::with_defaults(config)?,
            cache: RequestCache::new(),
        })
    }

    /// Client over an injected transport and token store.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            pipeline: Arc::new(ApiPipeline::new(config, transport, tokens)?),
            cache: RequestCache::new(),
        })
    }

    pub fn pipeline(&self) -> &Arc<ApiPipeline> {
        &self.pipeline
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        self.pipeline.tokens()
    }

    /// Session lifecycle events (termination on refresh failure).
    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.pipeline.subscribe_session()
    }

    /// One-shot request through the pipeline, no facade state involved.
    pub async fn request(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        self.pipeline.execute(descriptor).await
    }

    /// Bust cached responses for a resource family after a mutation.
    pub fn invalidate(&self, key_prefix: &str) {
        self.cache.invalidate_prefix(key_prefix);
    }

    /// Fetcher with explicit descriptor and options.
    pub fn fetcher(&self, base: RequestDescriptor, options: FetchOptions) -> Fetcher {
        Fetcher::new(self.pipeline.clone(), self.cache.clone(), base, options)
    }

    /// Cached, deduplicated GET fetcher.
    pub fn get(&self, path: impl Into<String>) -> Fetcher {
        self.fetcher(
            RequestDescriptor::get(path),
            FetchOptions {
                cache: true,
                ..FetchOptions::default()
            },
        )
    }

    pub fn post(&self, path: impl Into<String>) -> Fetcher {
        self.fetcher(RequestDescriptor::post(path), FetchOptions::default())
    }

    /// PUT fetcher; optimistic updates on, matching its replace-semantics.
    pub fn put(&self, path: impl Into<String>) -> Fetcher {
        self.fetcher(
            RequestDescriptor::new(Method::PUT, path),
            FetchOptions {
                optimistic_updates: true,
                ..FetchOptions::default()
            },
        )
    }

    pub fn patch(&self, path: impl Into<String>) -> Fetcher {
        self.fetcher(
            RequestDescriptor::new(Method::PATCH, path),
            FetchOptions {
                optimistic_updates: true,
                ..FetchOptions::default()
            },
        )
    }

    pub fn delete(&self, path: impl Into<String>) -> Fetcher {
        self.fetcher(
            RequestDescriptor::new(Method::DELETE, path),
            FetchOptions::default(),
        )
    }
}
