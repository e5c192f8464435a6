//! Routes events to live session tasks by id

use super::state::{SessionEvent, SessionStatus};
use super::SessionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

struct SessionEntry {
    events: mpsc::UnboundedSender<SessionEvent>,
    status: watch::Receiver<SessionStatus>,
}

/// Registry of live sessions
///
/// Engine callbacks, answer tasks and watchdog timers hold only a session id
/// and post through the registry. Once a session is removed, events for it
/// are dropped silently.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session's event queue and status channel
    pub fn register(
        &self,
        id: SessionId,
        events: mpsc::UnboundedSender<SessionEvent>,
        status: watch::Receiver<SessionStatus>,
    ) {
        debug!(session_id = %id, "Registering session");
        self.sessions
            .write()
            .insert(id, SessionEntry { events, status });
    }

    /// Remove a session; returns false if it was not registered
    pub fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Removed session");
        }
        removed
    }

    /// Post `event` to session `id`; returns false if the session is gone
    pub fn dispatch(&self, id: SessionId, event: SessionEvent) -> bool {
        let sessions = self.sessions.read();
        match sessions.get(&id) {
            Some(entry) => entry.events.send(event).is_ok(),
            None => {
                trace!(session_id = %id, "Dropping event for unknown session: {:?}", event);
                false
            }
        }
    }

    /// Latest status of session `id`
    pub fn status(&self, id: SessionId) -> Option<SessionStatus> {
        self.sessions
            .read()
            .get(&id)
            .map(|entry| entry.status.borrow().clone())
    }

    /// Watch status changes of session `id`
    pub fn subscribe(&self, id: SessionId) -> Option<watch::Receiver<SessionStatus>> {
        self.sessions.read().get(&id).map(|entry| entry.status.clone())
    }

    /// Whether session `id` is registered
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().contains_key(&id)
    }

    /// Ids of all registered sessions
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().keys().copied().collect()
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session is registered
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Ask every session to shut down; returns how many were notified
    pub fn shutdown_all(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|entry| entry.events.send(SessionEvent::Shutdown).is_ok())
            .count()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}
