//! Signaling sessions
//!
//! One [`Session`] task per WebSocket client. The task owns all session state
//! and is driven by inbound frames plus [`SessionEvent`]s posted through the
//! [`SessionRegistry`].

mod registry;
#[allow(clippy::module_inception)]
mod session;
mod state;

pub use registry::SessionRegistry;
pub use session::{Session, SessionEnd};
pub use state::{SessionEvent, SessionStatus, SignalingState};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
