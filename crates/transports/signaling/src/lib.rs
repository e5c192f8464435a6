//! WebSocket signaling for screen-capture viewers
//!
//! This crate negotiates one WebRTC peer connection per WebSocket client and
//! reports when that connection comes up or goes down to a local process.
//!
//! # Features
//!
//! - **JSON control protocol**: offer/answer/candidate exchange, `register`
//!   with a heartbeat, `close`/`bye`
//! - **Session actor**: one task per client owns all negotiation state
//! - **Connection notifications**: `SCREEN_CAPTURE_CONNECTED` /
//!   `SCREEN_CAPTURE_DISCONNECTED` over a Unix socket or named pipe
//! - **Data channel relay**: messages are echoed back and mirrored over the
//!   signaling socket
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Browser (WebSocket + WebRTC)                        │
//! │  ↓                                                   │
//! │  SignalingServer (accept loop)                       │
//! │  └─ Session (one task per client)                    │
//! │     ├─ TransportReader / TransportWriter             │
//! │     ├─ Watchdog (heartbeat ping)                     │
//! │     ├─ PeerHandle (webrtc-rs) → RenderSink           │
//! │     └─ NotificationQueue → NotificationSink          │
//! │  SessionRegistry (routes engine callbacks by id)     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use screenlink_signaling::SignalingConfig;
//!
//! let config = SignalingConfig {
//!     listen_addr: "127.0.0.1:8080".to_string(),
//!     notify_endpoint: Some("/tmp/screenlink.sock".to_string()),
//!     ..Default::default()
//! };
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.heartbeat_interval_secs, 30);
//! ```
//!
//! ## Async Usage
//!
//! ```no_run
//! use screenlink_signaling::{
//!     LoggingRenderSink, PipeNotifier, SharedState, SignalingConfig, SignalingServer,
//!     WebRtcConnector,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> screenlink_signaling::Result<()> {
//! let config = Arc::new(SignalingConfig::default());
//! let state = Arc::new(SharedState::new(
//!     Arc::clone(&config),
//!     Arc::new(WebRtcConnector::new(Arc::new(LoggingRenderSink))),
//!     Arc::new(PipeNotifier::from_config(&config)),
//! ));
//!
//! let handle = SignalingServer::bind(state).await?.start();
//! // ...
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod channels;
pub mod config;
pub mod error;
pub mod notify;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod watchdog;

pub use config::{PeerConfig, SignalingConfig, DEFAULT_STUN_SERVERS};
pub use error::{Error, Result};
pub use notify::{Notification, NotificationQueue, NotificationSink, PipeNotifier};
pub use peer::{
    DataChannelHandle, DataChannelState, IceConnectionState, LoggingRenderSink, PeerConnector,
    PeerEvent, PeerHandle, PeerObserver, RemoteVideoTrack, RenderSink, StatsSummary,
    WebRtcConnector,
};
pub use session::{
    Session, SessionEnd, SessionEvent, SessionId, SessionRegistry, SessionStatus, SignalingState,
};
pub use signaling::protocol::{ControlMessage, IceCandidate, OutboundMessage, ParsedFrame};
pub use signaling::websocket::{
    handle_connection, handle_stream, FrameSource, ReadEvent, SharedState, SignalingServer,
    SignalingServerHandle, TransportSession, TransportWriter,
};
pub use watchdog::Watchdog;

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
