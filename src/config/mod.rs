//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → shared via ArcSwap snapshot in the pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; runtime changes swap the whole snapshot
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, CacheConfig, ClientConfig, Environment, RateLimitConfig, RetryConfig,
    SecurityConfig, TimeoutConfig,
};
