//! Peer connection facade
//!
//! The signaling session drives the media engine only through the traits in
//! this module. Engine callbacks are reported as [`PeerEvent`]s to a
//! [`PeerObserver`]; they may arrive from any thread.

mod connection;
pub mod tracks;

pub use connection::{WebRtcConnector, WebRtcPeer};
pub use tracks::{LoggingRenderSink, RemoteVideoTrack, RenderSink, TrackRegistry};

use crate::config::PeerConfig;
use crate::signaling::protocol::IceCandidate;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;

/// ICE connection state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IceConnectionState {
    /// Not started (also used after a peer is released)
    New,
    /// Checking candidate pairs
    Checking,
    /// A usable candidate pair was found
    Connected,
    /// Checks finished
    Completed,
    /// Connectivity lost, may recover
    Disconnected,
    /// No usable candidate pair
    Failed,
    /// Agent shut down
    Closed,
}

impl IceConnectionState {
    /// Whether this state ends a connected period
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            IceConnectionState::Disconnected
                | IceConnectionState::Failed
                | IceConnectionState::Closed
        )
    }

    /// Lowercase name as used by browsers
    pub fn as_str(&self) -> &'static str {
        match self {
            IceConnectionState::New => "new",
            IceConnectionState::Checking => "checking",
            IceConnectionState::Connected => "connected",
            IceConnectionState::Completed => "completed",
            IceConnectionState::Disconnected => "disconnected",
            IceConnectionState::Failed => "failed",
            IceConnectionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for IceConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RTCIceConnectionState> for IceConnectionState {
    fn from(state: RTCIceConnectionState) -> Self {
        match state {
            RTCIceConnectionState::Checking => IceConnectionState::Checking,
            RTCIceConnectionState::Connected => IceConnectionState::Connected,
            RTCIceConnectionState::Completed => IceConnectionState::Completed,
            RTCIceConnectionState::Disconnected => IceConnectionState::Disconnected,
            RTCIceConnectionState::Failed => IceConnectionState::Failed,
            RTCIceConnectionState::Closed => IceConnectionState::Closed,
            _ => IceConnectionState::New,
        }
    }
}

/// Data channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelState {
    /// Channel is being created
    Connecting,
    /// Channel is open and ready for messages
    Open,
    /// Channel is closing
    Closing,
    /// Channel is closed
    Closed,
}

impl From<RTCDataChannelState> for DataChannelState {
    fn from(state: RTCDataChannelState) -> Self {
        match state {
            RTCDataChannelState::Open => DataChannelState::Open,
            RTCDataChannelState::Closing => DataChannelState::Closing,
            RTCDataChannelState::Closed => DataChannelState::Closed,
            _ => DataChannelState::Connecting,
        }
    }
}

/// Callback produced by the engine for one peer connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// ICE connection state changed
    IceConnectionStateChanged(IceConnectionState),
    /// A local ICE candidate was gathered
    IceCandidate(IceCandidate),
    /// Message received on the session's data channel
    DataChannelMessage(Bytes),
    /// The session's data channel changed state
    DataChannelStateChanged(DataChannelState),
}

/// Receives engine callbacks for one peer connection
///
/// Called from engine threads; implementations must not block.
pub trait PeerObserver: Send + Sync {
    /// Handle one engine callback
    fn on_event(&self, event: PeerEvent);
}

/// Summary of a statistics report, for diagnostics only
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    /// Number of entries in the report
    pub report_count: usize,
    /// Report entry identifiers
    pub report_ids: Vec<String>,
}

/// Creates peer connections
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a new peer connection reporting to `observer`
    async fn create(
        &self,
        config: &PeerConfig,
        observer: Arc<dyn PeerObserver>,
    ) -> Result<Arc<dyn PeerHandle>>;
}

/// One live peer connection
#[async_trait]
pub trait PeerHandle: Send + Sync {
    /// Unique identifier of this connection instance
    fn connection_id(&self) -> &str;

    /// Apply the remote SDP offer
    async fn set_offer(&self, sdp: String) -> Result<()>;

    /// Create the local answer for the applied offer and return its SDP
    async fn create_answer(&self) -> Result<String>;

    /// Apply a remote SDP answer
    async fn set_answer(&self, sdp: String) -> Result<()>;

    /// Add a remote ICE candidate
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Open an ordered, reliable data channel; its events go to the observer
    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannelHandle>>;

    /// Collect a statistics report
    async fn stats(&self) -> Result<StatsSummary>;

    /// Close the connection and release its resources
    async fn close(&self) -> Result<()>;
}

/// Data channel owned by a peer connection
#[async_trait]
pub trait DataChannelHandle: Send + Sync {
    /// Channel label
    fn label(&self) -> &str;

    /// Whether the channel is open for sending
    fn is_open(&self) -> bool;

    /// Send `data` unchanged
    async fn send(&self, data: Bytes) -> Result<()>;

    /// Close the channel
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ice_state_mapping() {
        assert_eq!(
            IceConnectionState::from(RTCIceConnectionState::Connected),
            IceConnectionState::Connected
        );
        assert_eq!(
            IceConnectionState::from(RTCIceConnectionState::Unspecified),
            IceConnectionState::New
        );
        assert!(IceConnectionState::Failed.is_disconnect());
        assert!(IceConnectionState::Closed.is_disconnect());
        assert!(!IceConnectionState::Checking.is_disconnect());
        assert!(!IceConnectionState::Completed.is_disconnect());
    }

    #[test]
    fn test_data_channel_state_mapping() {
        assert_eq!(
            DataChannelState::from(RTCDataChannelState::Open),
            DataChannelState::Open
        );
        assert_eq!(
            DataChannelState::from(RTCDataChannelState::Connecting),
            DataChannelState::Connecting
        );
    }
}
