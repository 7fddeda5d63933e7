//! Persistent token storage abstraction.
//!
//! The web build persists tokens wherever the host environment allows;
//! this trait abstracts over that medium. The in-memory implementation is
//! the fallback when no persistence is available and is what tests use.

use std::collections::HashMap;
use std::sync::Mutex;

/// Key-value storage for credentials. Implementations must be cheap to
/// call and must not fail: a missing medium degrades to "nothing stored".
pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory storage, the default backend.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("storage mutex poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("storage mutex poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .expect("storage mutex poisoned")
            .remove(key);
    }
}
