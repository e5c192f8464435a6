//! Per-connection WebSocket handler
//!
//! Accepts the upgrade, creates a [`Session`] for the client and runs it until
//! the connection ends.

use super::transport::TransportSession;
use crate::config::SignalingConfig;
use crate::notify::NotificationSink;
use crate::peer::PeerConnector;
use crate::session::{Session, SessionEnd, SessionRegistry};
use crate::Result;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{error, info};

/// Shared state across all WebSocket connections
pub struct SharedState {
    pub config: Arc<SignalingConfig>,
    /// Creates one peer connection per offer
    pub connector: Arc<dyn PeerConnector>,
    /// Connect/disconnect notifications, shared by every session
    pub notifier: Arc<dyn NotificationSink>,
    pub registry: Arc<SessionRegistry>,
}

impl SharedState {
    /// Create shared state with an empty session registry
    pub fn new(
        config: Arc<SignalingConfig>,
        connector: Arc<dyn PeerConnector>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            connector,
            notifier,
            registry: Arc::new(SessionRegistry::new()),
        }
    }
}

/// Handle a single TCP connection
pub async fn handle_connection(stream: TcpStream, state: Arc<SharedState>) -> Result<SessionEnd> {
    let peer_addr = stream.peer_addr()?;
    info!("New WebSocket connection from: {}", peer_addr);

    let end = handle_stream(stream, state).await?;
    info!("WebSocket connection from {} finished: {:?}", peer_addr, end);
    Ok(end)
}

/// Run a signaling session over any byte stream
///
/// Fails only when the WebSocket handshake fails; everything after the
/// upgrade is reported through the returned [`SessionEnd`].
pub async fn handle_stream<S>(stream: S, state: Arc<SharedState>) -> Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let transport = TransportSession::accept(stream).await.map_err(|e| {
        error!("WebSocket handshake failed: {}", e);
        e
    })?;

    let session = Session::new(&state, transport.writer);
    Ok(session.run(transport.reader).await)
}
