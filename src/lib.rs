//! HTTP resilience and data-fetching core for the Dhara practice
//! management client.
//!
//! # Architecture Overview
//!
//! ```text
//! Fetcher.execute()
//!     → RequestCache (TTL cache / in-flight dedup)
//!     → ApiPipeline.execute()
//!         → TokenStore (attach unexpired access token)
//!         → Transport (reqwest or injected)
//!         → on 401: RefreshCoordinator (single-flight refresh, replay once)
//!         → on transient failure: RetryPolicy + backoff
//!     → typed result or ApiError
//!     → FetchState update (generation-guarded, cancellation-aware)
//! ```
//!
//! Domain services are plain callers of [`ApiClient::request`] or of
//! fetchers; all concurrency invariants (single-flight refresh, dedup,
//! last-write-wins-by-generation) live in this crate.

// Core subsystems
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod facade;
pub mod pipeline;
pub mod transport;

// Cross-cutting concerns
pub mod auth;
pub mod observability;
pub mod resilience;

pub use auth::{SessionEvent, TokenStore};
pub use cache::RequestCache;
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use facade::{FetchOptions, FetchState, FetchStatus, Fetcher, Overrides};
pub use pipeline::ApiPipeline;
pub use transport::{RawResponse, RequestDescriptor, Transport, TransportError};
