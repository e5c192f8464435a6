//! Per-client session actor

use super::registry::SessionRegistry;
use super::state::{SessionEvent, SessionStatus, SignalingState};
use super::SessionId;
use crate::config::{PeerConfig, SignalingConfig};
use crate::notify::{Notification, NotificationQueue, NotificationSink};
use crate::peer::{
    DataChannelHandle, IceConnectionState, PeerConnector, PeerEvent, PeerHandle, PeerObserver,
};
use crate::signaling::protocol::{ControlMessage, IceCandidate, OutboundMessage, ParsedFrame};
use crate::signaling::websocket::handler::SharedState;
use crate::signaling::websocket::transport::{FrameSource, ReadEvent, TransportWriter};
use crate::watchdog::Watchdog;
use crate::Result;
use bytes::Bytes;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client closed the WebSocket
    Closed,
    /// Reading from the WebSocket failed
    TransportFailed(String),
    /// An outbound frame could not be enqueued
    WriteFailed(String),
    /// Server shutdown
    Shutdown,
}

/// Routes engine callbacks of one peer generation into the session queue
struct SessionPeerObserver {
    session_id: SessionId,
    generation: u64,
    registry: Weak<SessionRegistry>,
}

impl PeerObserver for SessionPeerObserver {
    fn on_event(&self, event: PeerEvent) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let generation = self.generation;
        if !registry.dispatch(self.session_id, SessionEvent::Peer { generation, event }) {
            trace!(
                session_id = %self.session_id,
                generation,
                "Peer callback arrived after session ended"
            );
        }
    }
}

struct ActivePeer {
    generation: u64,
    handle: Arc<dyn PeerHandle>,
    data_channel: Option<Arc<dyn DataChannelHandle>>,
}

enum Flow {
    Continue,
    Stop,
}

/// Signaling session for one WebSocket client
///
/// Owns the transport writer, the heartbeat watchdog and at most one peer
/// connection. All state is mutated from [`Session::run`] only; engine
/// callbacks, the answer task and the watchdog reach it as [`SessionEvent`]s.
pub struct Session {
    id: SessionId,
    registry: Arc<SessionRegistry>,
    connector: Arc<dyn PeerConnector>,
    notifications: NotificationQueue,
    peer_config: PeerConfig,
    heartbeat_interval: Duration,
    writer: TransportWriter,
    watchdog: Watchdog,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    status: watch::Sender<SessionStatus>,
    peer: Option<ActivePeer>,
    next_generation: u64,
    state: SignalingState,
    ice_state: IceConnectionState,
    is_connected: bool,
}

impl Session {
    /// Create a session writing to `writer` and register it
    pub fn new(shared: &SharedState, writer: TransportWriter) -> Self {
        Self::with_parts(
            &shared.config,
            Arc::clone(&shared.registry),
            Arc::clone(&shared.connector),
            Arc::clone(&shared.notifier),
            writer,
        )
    }

    /// Create a session from individual collaborators and register it
    pub fn with_parts(
        config: &SignalingConfig,
        registry: Arc<SessionRegistry>,
        connector: Arc<dyn PeerConnector>,
        notifier: Arc<dyn NotificationSink>,
        writer: TransportWriter,
    ) -> Self {
        let id = SessionId::new();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(SessionStatus::default());
        registry.register(id, events_tx, status_rx);

        let weak_registry = Arc::downgrade(&registry);
        let watchdog = Watchdog::new(move |arm| {
            if let Some(registry) = weak_registry.upgrade() {
                registry.dispatch(id, SessionEvent::WatchdogExpired { arm });
            }
        });

        Self {
            id,
            registry,
            connector,
            notifications: NotificationQueue::spawn(notifier),
            peer_config: config.peer_config(),
            heartbeat_interval: config.heartbeat_interval(),
            writer,
            watchdog,
            events,
            status,
            peer: None,
            next_generation: 1,
            state: SignalingState::Idle,
            ice_state: IceConnectionState::New,
            is_connected: false,
        }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Process frames and events until the client leaves, the transport
    /// fails or the server shuts down, then tear the session down
    pub async fn run<S: FrameSource>(mut self, mut source: S) -> SessionEnd {
        info!(session_id = %self.id, "Session started");

        let end = loop {
            tokio::select! {
                read = source.read() => match read {
                    ReadEvent::Text(text) => {
                        if let Err(e) = self.handle_frame(&text).await {
                            error!(session_id = %self.id, "Failed to write frame: {}", e);
                            break SessionEnd::WriteFailed(e.to_string());
                        }
                    }
                    ReadEvent::Closed => {
                        debug!(session_id = %self.id, "WebSocket closed by client");
                        break SessionEnd::Closed;
                    }
                    ReadEvent::Failed(e) => {
                        error!(session_id = %self.id, "WebSocket read error: {}", e);
                        break SessionEnd::TransportFailed(e.to_string());
                    }
                },
                Some(event) = self.events.recv() => match self.handle_event(event).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Stop) => break SessionEnd::Shutdown,
                    Err(e) => {
                        error!(session_id = %self.id, "Failed to write frame: {}", e);
                        break SessionEnd::WriteFailed(e.to_string());
                    }
                },
            }
        };

        self.teardown(&end).await;
        end
    }

    async fn handle_frame(&mut self, text: &str) -> Result<()> {
        debug!(session_id = %self.id, "recv: {}", text);

        match ControlMessage::parse(text) {
            ParsedFrame::Message(message) => self.handle_message(message).await,
            ParsedFrame::Unknown(message_type) => {
                debug!(session_id = %self.id, "Ignoring unknown message type {}", message_type);
                Ok(())
            }
            ParsedFrame::Malformed(reason) => {
                debug!(session_id = %self.id, "Dropping malformed frame: {}", reason);
                Ok(())
            }
        }
    }

    async fn handle_message(&mut self, message: ControlMessage) -> Result<()> {
        trace!(session_id = %self.id, state = %self.state, "Handling {}", message.kind());

        match message {
            ControlMessage::Offer { sdp } => {
                self.handle_offer(sdp).await;
                Ok(())
            }
            ControlMessage::Answer { sdp } => {
                self.handle_remote_answer(sdp).await;
                Ok(())
            }
            ControlMessage::Candidate { ice } => {
                self.handle_remote_candidate(ice).await;
                Ok(())
            }
            ControlMessage::Close => {
                self.handle_close().await;
                Ok(())
            }
            ControlMessage::Register => self.handle_register().await,
            ControlMessage::Pong => Ok(()),
        }
    }

    async fn handle_offer(&mut self, sdp: String) {
        self.release_peer("replaced by a new offer").await;

        let generation = self.next_generation;
        self.next_generation += 1;

        let observer = Arc::new(SessionPeerObserver {
            session_id: self.id,
            generation,
            registry: Arc::downgrade(&self.registry),
        });

        let handle = match self.connector.create(&self.peer_config, observer).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(session_id = %self.id, generation, "Failed to create peer connection: {}", e);
                self.set_state(SignalingState::Idle);
                return;
            }
        };

        let data_channel = match handle
            .create_data_channel(&self.peer_config.data_channel_label)
            .await
        {
            Ok(channel) => {
                info!(session_id = %self.id, "Created data channel '{}'", channel.label());
                Some(channel)
            }
            Err(e) => {
                error!(session_id = %self.id, "Failed to create data channel: {}", e);
                None
            }
        };

        self.peer = Some(ActivePeer {
            generation,
            handle: Arc::clone(&handle),
            data_channel,
        });
        self.ice_state = IceConnectionState::New;
        self.set_state(SignalingState::Negotiating);

        let registry = Arc::downgrade(&self.registry);
        let session_id = self.id;
        tokio::spawn(async move {
            let event = match answer_offer(handle.as_ref(), sdp).await {
                Ok(sdp) => SessionEvent::AnswerReady { generation, sdp },
                Err(e) => SessionEvent::AnswerFailed {
                    generation,
                    error: e.to_string(),
                },
            };

            let delivered = registry
                .upgrade()
                .map(|registry| registry.dispatch(session_id, event))
                .unwrap_or(false);
            if !delivered {
                debug!(%session_id, generation, "Session ended before the answer was ready");
            }
        });
    }

    async fn handle_remote_answer(&mut self, sdp: String) {
        let Some(peer) = &self.peer else {
            debug!(session_id = %self.id, "Ignoring answer without a peer connection");
            return;
        };

        if let Err(e) = peer.handle.set_answer(sdp).await {
            warn!(session_id = %self.id, "Failed to apply remote answer: {}", e);
        }
    }

    async fn handle_remote_candidate(&mut self, ice: IceCandidate) {
        let Some(peer) = &self.peer else {
            debug!(session_id = %self.id, "Ignoring candidate without a peer connection");
            return;
        };

        if let Err(e) = peer.handle.add_ice_candidate(ice).await {
            warn!(session_id = %self.id, "Failed to add remote candidate: {}", e);
        }
    }

    async fn handle_close(&mut self) {
        info!(session_id = %self.id, "Client requested close");
        self.set_state(SignalingState::Closing);
        self.release_peer("closed by client").await;
        self.set_state(SignalingState::Idle);
    }

    async fn handle_register(&mut self) -> Result<()> {
        self.send(OutboundMessage::accept()).await?;
        self.watchdog.enable(self.heartbeat_interval);
        self.publish_status();
        info!(
            session_id = %self.id,
            "Client registered, heartbeat every {:?}", self.heartbeat_interval
        );
        Ok(())
    }

    async fn handle_event(&mut self, event: SessionEvent) -> Result<Flow> {
        if let Some(generation) = event.generation() {
            if !self.is_current(generation) {
                trace!(
                    session_id = %self.id,
                    generation,
                    "Dropping event from a released peer connection"
                );
                return Ok(Flow::Continue);
            }
        }

        match event {
            SessionEvent::Peer { event, .. } => self.handle_peer_event(event).await?,
            SessionEvent::AnswerReady { generation, sdp } => {
                debug!(session_id = %self.id, generation, "Sending answer");
                self.send(OutboundMessage::Answer { sdp }).await?;
                if self.state == SignalingState::Negotiating {
                    self.set_state(SignalingState::Active);
                }
            }
            SessionEvent::AnswerFailed { generation, error } => {
                error!(session_id = %self.id, generation, "Failed to answer offer: {}", error);
                self.release_peer("answer failed").await;
                self.set_state(SignalingState::Idle);
            }
            SessionEvent::WatchdogExpired { arm } => {
                // Expiries queued before a disable or a re-arm are stale
                if self.watchdog.is_current(arm) {
                    self.send(OutboundMessage::Ping).await?;
                    self.watchdog.reset();
                }
            }
            SessionEvent::Shutdown => return Ok(Flow::Stop),
        }

        Ok(Flow::Continue)
    }

    async fn handle_peer_event(&mut self, event: PeerEvent) -> Result<()> {
        match event {
            PeerEvent::IceConnectionStateChanged(state) => {
                self.handle_ice_state(state).await;
                Ok(())
            }
            PeerEvent::IceCandidate(ice) => self.send(OutboundMessage::Candidate { ice }).await,
            PeerEvent::DataChannelMessage(data) => self.handle_data_channel_message(data).await,
            PeerEvent::DataChannelStateChanged(state) => {
                info!(session_id = %self.id, "Data channel state changed to {:?}", state);
                Ok(())
            }
        }
    }

    async fn handle_ice_state(&mut self, state: IceConnectionState) {
        if state == self.ice_state {
            return;
        }

        info!(
            session_id = %self.id,
            "ICE connection state {} -> {}", self.ice_state, state
        );
        self.ice_state = state;
        self.spawn_stats_report();

        if state == IceConnectionState::Connected {
            if !self.is_connected {
                self.is_connected = true;
                self.notifications.push(Notification::Connected);
            }
            if self.state == SignalingState::Negotiating {
                self.set_state(SignalingState::Active);
            }
        } else if state.is_disconnect() {
            self.mark_disconnected();
        }

        self.publish_status();
    }

    async fn handle_data_channel_message(&mut self, data: Bytes) -> Result<()> {
        let message = String::from_utf8_lossy(&data).into_owned();
        info!(session_id = %self.id, "Data channel message: {}", message);

        let channel = self
            .peer
            .as_ref()
            .and_then(|peer| peer.data_channel.as_ref());
        if let Some(channel) = channel {
            if channel.is_open() {
                if let Err(e) = channel.send(data).await {
                    warn!(session_id = %self.id, "Failed to echo data channel message: {}", e);
                }
            }
        }

        self.send(OutboundMessage::DataChannel { message }).await
    }

    fn spawn_stats_report(&self) {
        let Some(peer) = &self.peer else {
            return;
        };

        let handle = Arc::clone(&peer.handle);
        let session_id = self.id;
        tokio::spawn(async move {
            match handle.stats().await {
                Ok(stats) => debug!(
                    %session_id,
                    "Stats report with {} entries: {:?}", stats.report_count, stats.report_ids
                ),
                Err(e) => debug!(%session_id, "Failed to collect stats: {}", e),
            }
        });
    }

    /// Fire the disconnect notification if currently connected
    fn mark_disconnected(&mut self) {
        if self.is_connected {
            self.is_connected = false;
            self.notifications.push(Notification::Disconnected);
        }
    }

    async fn release_peer(&mut self, reason: &str) {
        self.mark_disconnected();

        if let Some(peer) = self.peer.take() {
            info!(
                session_id = %self.id,
                generation = peer.generation,
                "Releasing peer connection {}: {}", peer.handle.connection_id(), reason
            );

            if let Some(channel) = peer.data_channel {
                if let Err(e) = channel.close().await {
                    debug!(session_id = %self.id, "Failed to close data channel: {}", e);
                }
            }
            if let Err(e) = peer.handle.close().await {
                warn!(session_id = %self.id, "Failed to close peer connection: {}", e);
            }
        }

        self.ice_state = IceConnectionState::New;
        self.publish_status();
    }

    async fn teardown(&mut self, end: &SessionEnd) {
        self.set_state(SignalingState::Closing);
        self.watchdog.disable();
        self.release_peer("session ended").await;
        self.notifications.flush().await;
        self.registry.remove(self.id);

        if *end == SessionEnd::Shutdown {
            if let Err(e) = self.writer.close().await {
                debug!(session_id = %self.id, "Failed to send close frame: {}", e);
            }
        }

        info!(session_id = %self.id, "Session ended: {:?}", end);
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let payload = message.to_json()?;
        debug!(session_id = %self.id, "send: {}", payload);
        self.writer.write_text(payload).await
    }

    fn is_current(&self, generation: u64) -> bool {
        self.peer
            .as_ref()
            .is_some_and(|peer| peer.generation == generation)
    }

    fn set_state(&mut self, state: SignalingState) {
        if self.state != state {
            debug!(session_id = %self.id, "State {} -> {}", self.state, state);
            self.state = state;
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        self.status.send_replace(SessionStatus {
            state: self.state,
            ice_state: self.ice_state,
            is_connected: self.is_connected,
            peer_generation: self.peer.as_ref().map(|peer| peer.generation),
            heartbeat_enabled: self.watchdog.is_enabled(),
        });
    }
}

async fn answer_offer(handle: &dyn PeerHandle, offer: String) -> Result<String> {
    handle.set_offer(offer).await?;
    handle.create_answer().await
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("ice_state", &self.ice_state)
            .field("is_connected", &self.is_connected)
            .finish()
    }
}
