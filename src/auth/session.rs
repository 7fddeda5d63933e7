//! Session lifecycle events.
//!
//! The pipeline signals session termination (refresh exhausted) through a
//! broadcast channel rather than performing navigation itself; the host
//! application subscribes and decides what "redirect to login" means.

use tokio::sync::broadcast;

/// Events published to session subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Refresh failed or was impossible; tokens have been cleared.
    Terminated,
}

/// Broadcast hub for session events. Cloning shares the channel.
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-continue; delivery to zero subscribers is not an error.
    pub fn emit_terminated(&self) {
        tracing::warn!("session terminated");
        let _ = self.tx.send(SessionEvent::Terminated);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
