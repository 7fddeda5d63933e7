//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! outgoing request
//!     → store.rs (attach unexpired access token)
//!     → on 401: refresh.rs (single-flight refresh, replay with new token)
//!     → on refresh failure: session.rs (broadcast termination, tokens cleared)
//!
//! token.rs decodes claims; storage.rs abstracts the persistence medium.
//! ```
//!
//! # Design Decisions
//! - Claims decoding is best-effort: failures mean "unusable", never a panic
//! - Malformed tokens are rejected at write time and never stored
//! - Exactly one refresh call in flight per session, enforced by a shared
//!   future claimed under a sync lock

pub mod refresh;
pub mod session;
pub mod storage;
pub mod store;
pub mod token;

pub use refresh::RefreshCoordinator;
pub use session::{SessionEvent, SessionEvents};
pub use storage::{MemoryStorage, TokenStorage};
pub use store::{ProactiveRefreshHandle, TokenStore};
pub use token::Claims;
