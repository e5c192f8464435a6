//! Session state and the events that drive it

use crate::peer::{IceConnectionState, PeerEvent};
use serde::Serialize;

/// Negotiation phase of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalingState {
    /// No peer connection
    Idle,
    /// Offer received, answer not sent yet
    Negotiating,
    /// Answer sent (or ICE reported connected)
    Active,
    /// Peer connection is being released
    Closing,
}

impl std::fmt::Display for SignalingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SignalingState::Idle => "idle",
            SignalingState::Negotiating => "negotiating",
            SignalingState::Active => "active",
            SignalingState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Snapshot of a session, published on every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SignalingState,
    pub ice_state: IceConnectionState,
    /// Whether the last ICE edge reported was `connected`
    pub is_connected: bool,
    /// Generation of the current peer connection, if any
    pub peer_generation: Option<u64>,
    pub heartbeat_enabled: bool,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: SignalingState::Idle,
            ice_state: IceConnectionState::New,
            is_connected: false,
            peer_generation: None,
            heartbeat_enabled: false,
        }
    }
}

/// Input to a session task other than inbound WebSocket frames
///
/// Events produced on behalf of a peer connection carry its generation; the
/// session drops them once that connection has been replaced or released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Engine callback for the peer connection of `generation`
    Peer { generation: u64, event: PeerEvent },
    /// Local answer is ready to be sent
    AnswerReady { generation: u64, sdp: String },
    /// Applying the offer or creating the answer failed
    AnswerFailed { generation: u64, error: String },
    /// Heartbeat watchdog expired; `arm` identifies the countdown that fired
    WatchdogExpired { arm: u64 },
    /// Server is shutting down
    Shutdown,
}

impl SessionEvent {
    /// Peer generation the event belongs to, if any
    pub fn generation(&self) -> Option<u64> {
        match self {
            SessionEvent::Peer { generation, .. }
            | SessionEvent::AnswerReady { generation, .. }
            | SessionEvent::AnswerFailed { generation, .. } => Some(*generation),
            SessionEvent::WatchdogExpired { .. } | SessionEvent::Shutdown => None,
        }
    }
}
