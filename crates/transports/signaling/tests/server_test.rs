//! WebSocket signaling server end-to-end tests
//!
//! Start a real `SignalingServer` on a random local port and talk to it with a
//! tokio-tungstenite client. The peer connection engine is the in-memory mock.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p screenlink-signaling --test server_test -- --nocapture
//! ```

mod harness;

use futures::{SinkExt, StreamExt};
use harness::{init_logging, wait_until, MockConnector, RecordingNotifier, WAIT};
use screenlink_signaling::{
    IceConnectionState, Notification, PeerEvent, SharedState, SignalingConfig, SignalingServer,
    SignalingServerHandle,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    handle: SignalingServerHandle,
    state: Arc<SharedState>,
    connector: Arc<MockConnector>,
    notifier: Arc<RecordingNotifier>,
}

impl TestServer {
    async fn start() -> Self {
        let config = Arc::new(SignalingConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            ..Default::default()
        });
        let connector = MockConnector::new();
        let notifier = RecordingNotifier::new();
        let state = Arc::new(SharedState::new(
            config,
            connector.clone(),
            notifier.clone(),
        ));

        let server = SignalingServer::bind(Arc::clone(&state)).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);

        Self {
            handle: server.start(),
            state,
            connector,
            notifier,
        }
    }

    fn addr(&self) -> SocketAddr {
        self.handle.local_addr()
    }

    async fn connect(&self) -> Client {
        let (client, _) = connect_async(format!("ws://{}", self.addr()))
            .await
            .unwrap();
        client
    }
}

async fn send(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

async fn recv(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for a server frame")
            .expect("connection closed")
            .unwrap();
        match message {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_register_and_offer_over_websocket() {
    init_logging();
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    send(&mut client, json!({"type": "register", "roomId": "screen"})).await;
    assert_eq!(
        recv(&mut client).await,
        json!({"type": "accept", "isExistUser": true})
    );

    send(&mut client, json!({"type": "offer", "sdp": "v=0 browser"})).await;
    assert_eq!(
        recv(&mut client).await,
        json!({"type": "answer", "sdp": "v=0 browserANSWER"})
    );

    assert_eq!(server.state.registry.len(), 1);

    client.close(None).await.unwrap();
    let registry = Arc::clone(&server.state.registry);
    wait_until(|| registry.is_empty()).await;
    assert!(server.connector.peer(0).is_closed());

    server.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_client_disconnect_while_connected_notifies() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    send(&mut client, json!({"type": "offer", "sdp": "v=0"})).await;
    assert_eq!(recv(&mut client).await["type"], "answer");

    server
        .connector
        .peer(0)
        .emit(PeerEvent::IceConnectionStateChanged(IceConnectionState::Connected));
    let notifier = Arc::clone(&server.notifier);
    wait_until(|| notifier.sent() == vec![Notification::Connected]).await;

    // Drop the socket without a close handshake
    drop(client);

    let registry = Arc::clone(&server.state.registry);
    wait_until(|| registry.is_empty()).await;
    assert_eq!(
        server.notifier.sent(),
        vec![Notification::Connected, Notification::Disconnected]
    );

    server.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let server = TestServer::start().await;
    let mut first = server.connect().await;
    let mut second = server.connect().await;

    send(&mut first, json!({"type": "offer", "sdp": "v=0 a"})).await;
    send(&mut second, json!({"type": "offer", "sdp": "v=0 b"})).await;

    assert_eq!(recv(&mut first).await["sdp"], "v=0 aANSWER");
    assert_eq!(recv(&mut second).await["sdp"], "v=0 bANSWER");

    let registry = Arc::clone(&server.state.registry);
    assert_eq!(registry.len(), 2);

    first.close(None).await.unwrap();
    wait_until(|| registry.len() == 1).await;

    // The remaining session still answers
    send(&mut second, json!({"type": "register"})).await;
    assert_eq!(recv(&mut second).await["type"], "accept");

    server.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_live_sessions() {
    init_logging();
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    send(&mut client, json!({"type": "register"})).await;
    assert_eq!(recv(&mut client).await["type"], "accept");

    let registry = Arc::clone(&server.state.registry);
    server.handle.shutdown().await.unwrap();

    let closed = tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "client was not disconnected");
    wait_until(|| registry.is_empty()).await;
}

#[tokio::test]
async fn test_connections_refused_after_shutdown() {
    let server = TestServer::start().await;
    let addr = server.addr();
    server.handle.shutdown().await.unwrap();

    let result = connect_async(format!("ws://{}", addr)).await;
    assert!(result.is_err());
}
