//! Signaling session test harness
//!
//! Provides infrastructure for driving sessions without a browser:
//! - In-memory peer connection engine (`MockConnector` / `MockPeer`)
//! - Recording notification sink
//! - Channel-backed frame source standing in for the WebSocket reader
//! - `SessionDriver` wiring all of the above to one running session
//!
//! Basic usage pattern:
//!
//! 1. Create a `SessionDriver`
//! 2. Feed client frames with `send_json` / `send_text`
//! 3. Read server frames with `next_frame`, emit engine callbacks through
//!    the connector's peers
//! 4. Call `close` and inspect the returned `SessionEnd`

#![allow(dead_code)]

pub mod mock_peer;

use async_trait::async_trait;
use parking_lot::Mutex;
use screenlink_signaling::{
    Error, FrameSource, Notification, NotificationSink, ReadEvent, Session, SessionEnd, SessionId,
    SessionRegistry, SessionStatus, SignalingConfig, TransportWriter,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

pub use mock_peer::{MockConnector, MockDataChannel, MockPeer};

/// Default wait for frames and state changes
pub const WAIT: Duration = Duration::from_secs(5);

/// Initialize test logging (call once per test)
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,screenlink_signaling=debug")
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds
pub async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Timed out waiting for condition"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Notification sink that records every notification in order
///
/// With `hold` set, each delivery waits for `release` first, like an endpoint
/// that accepts the connection but never reads.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    pub hold: AtomicBool,
    gate: Notify,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Let one held delivery complete
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// Wait until exactly `expected` has been delivered
    pub async fn wait_for(&self, expected: &[Notification]) {
        wait_until(|| self.sent() == expected).await;
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        if self.hold.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        self.sent.lock().push(notification);
    }
}

/// Frame source fed from a channel; a dropped sender reads as a close
pub struct ChannelFrameSource {
    rx: mpsc::UnboundedReceiver<ReadEvent>,
}

impl ChannelFrameSource {
    pub fn new() -> (mpsc::UnboundedSender<ReadEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl FrameSource for ChannelFrameSource {
    async fn read(&mut self) -> ReadEvent {
        self.rx.recv().await.unwrap_or(ReadEvent::Closed)
    }
}

/// One running session plus handles on everything around it
pub struct SessionDriver {
    pub id: SessionId,
    pub registry: Arc<SessionRegistry>,
    pub connector: Arc<MockConnector>,
    pub notifier: Arc<RecordingNotifier>,
    inbound: mpsc::UnboundedSender<ReadEvent>,
    outbound: mpsc::Receiver<Message>,
    task: Option<JoinHandle<SessionEnd>>,
}

impl SessionDriver {
    /// Start a session with the default configuration
    pub fn start() -> Self {
        Self::start_with(SignalingConfig::default(), MockConnector::new())
    }

    /// Start a session with a prepared connector
    pub fn start_with_connector(connector: Arc<MockConnector>) -> Self {
        Self::start_with(SignalingConfig::default(), connector)
    }

    pub fn start_with(config: SignalingConfig, connector: Arc<MockConnector>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let notifier = RecordingNotifier::new();
        let (writer, outbound) = TransportWriter::channel(64);
        let (inbound, source) = ChannelFrameSource::new();

        let session = Session::with_parts(
            &config,
            Arc::clone(&registry),
            connector.clone(),
            notifier.clone(),
            writer,
        );
        let id = session.id();
        let task = tokio::spawn(session.run(source));

        Self {
            id,
            registry,
            connector,
            notifier,
            inbound,
            outbound,
            task: Some(task),
        }
    }

    /// Feed one text frame
    pub fn send_text(&self, text: &str) {
        self.inbound
            .send(ReadEvent::Text(text.to_string()))
            .expect("session stopped reading");
    }

    /// Feed one JSON frame
    pub fn send_json(&self, value: serde_json::Value) {
        self.send_text(&value.to_string());
    }

    pub fn send_offer(&self, sdp: &str) {
        self.send_json(serde_json::json!({"type": "offer", "sdp": sdp}));
    }

    /// Next outbound text frame as JSON
    pub async fn next_frame(&mut self) -> serde_json::Value {
        let message = tokio::time::timeout(WAIT, self.outbound.recv())
            .await
            .expect("timed out waiting for an outbound frame")
            .expect("outbound queue closed");
        match message {
            Message::Text(text) => serde_json::from_str(&text).expect("outbound frame is JSON"),
            other => panic!("Expected text frame, got {:?}", other),
        }
    }

    /// Next outbound frame, if one is already queued
    pub fn try_next_message(&mut self) -> Option<Message> {
        self.outbound.try_recv().ok()
    }

    /// Assert nothing is sent within `window`
    pub async fn assert_silent(&mut self, window: Duration) {
        if let Ok(Some(message)) = tokio::time::timeout(window, self.outbound.recv()).await {
            panic!("Expected no outbound frame, got {:?}", message);
        }
    }

    /// Send `register` and wait for `accept`
    ///
    /// Frames are handled in order, so this also waits for every frame sent
    /// before it.
    pub async fn register(&mut self) {
        self.send_json(serde_json::json!({"type": "register"}));
        let frame = self.next_frame().await;
        assert_eq!(frame["type"], "accept", "unexpected frame {}", frame);
    }

    /// Latest published status
    pub fn status(&self) -> SessionStatus {
        self.registry
            .status(self.id)
            .expect("session is not registered")
    }

    /// Wait until the published status satisfies `predicate`
    pub async fn wait_status<F>(&self, predicate: F) -> SessionStatus
    where
        F: Fn(&SessionStatus) -> bool,
    {
        let mut rx = self
            .registry
            .subscribe(self.id)
            .expect("session is not registered");
        let status = tokio::time::timeout(WAIT, rx.wait_for(|status| predicate(status)))
            .await
            .expect("timed out waiting for session status")
            .expect("session status channel closed");
        status.clone()
    }

    /// Offer, wait for the answer and return the answer SDP
    pub async fn negotiate(&mut self, offer: &str) -> String {
        self.send_offer(offer);
        let frame = self.next_frame().await;
        assert_eq!(frame["type"], "answer", "unexpected frame {}", frame);
        frame["sdp"].as_str().unwrap_or_default().to_string()
    }

    /// Simulate a transport read error
    pub fn send_failure(&self) {
        let _ = self.inbound.send(ReadEvent::Failed(Error::WebSocketError(
            "connection reset".to_string(),
        )));
    }

    /// Simulate the client closing the WebSocket and wait for teardown
    pub async fn close(mut self) -> SessionEnd {
        let _ = self.inbound.send(ReadEvent::Closed);
        self.join().await
    }

    /// Wait for the session task to finish
    pub async fn join(&mut self) -> SessionEnd {
        let task = self.task.take().expect("session already joined");
        tokio::time::timeout(WAIT, task)
            .await
            .expect("timed out waiting for session to end")
            .expect("session task panicked")
    }
}
