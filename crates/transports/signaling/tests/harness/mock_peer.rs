//! In-memory peer connection engine
//!
//! The answer SDP is the offer with `ANSWER` appended, so tests can tell which
//! offer an answer belongs to.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use screenlink_signaling::{
    DataChannelHandle, Error, IceCandidate, PeerConfig, PeerConnector, PeerEvent, PeerHandle,
    PeerObserver, Result, StatsSummary,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Data channel double
#[derive(Default)]
pub struct MockDataChannel {
    label: String,
    open: AtomicBool,
    closed: AtomicBool,
    sent: Mutex<Vec<Bytes>>,
}

impl MockDataChannel {
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Payloads sent on the channel, oldest first
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataChannelHandle for MockDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, data: Bytes) -> Result<()> {
        self.sent.lock().push(data);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Peer connection double
pub struct MockPeer {
    id: String,
    observer: Arc<dyn PeerObserver>,
    calls: Mutex<Vec<String>>,
    offer: Mutex<Option<String>>,
    closed: AtomicBool,
    fail_answer: bool,
    fail_data_channel: bool,
    answer_gate: Option<Notify>,
    data_channel: Mutex<Option<Arc<MockDataChannel>>>,
}

impl MockPeer {
    /// Deliver an engine callback to the session
    pub fn emit(&self, event: PeerEvent) {
        self.observer.on_event(event);
    }

    /// Recorded facade calls, e.g. `set_offer`, `candidate:<line>`, `close`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn data_channel(&self) -> Option<Arc<MockDataChannel>> {
        self.data_channel.lock().clone()
    }

    /// Let a held `create_answer` complete
    pub fn release_answer(&self) {
        if let Some(gate) = &self.answer_gate {
            gate.notify_one();
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl PeerHandle for MockPeer {
    fn connection_id(&self) -> &str {
        &self.id
    }

    async fn set_offer(&self, sdp: String) -> Result<()> {
        self.record("set_offer");
        *self.offer.lock() = Some(sdp);
        Ok(())
    }

    async fn create_answer(&self) -> Result<String> {
        if let Some(gate) = &self.answer_gate {
            gate.notified().await;
        }
        self.record("create_answer");

        if self.fail_answer {
            return Err(Error::SdpError("mock answer failure".to_string()));
        }

        let offer = self.offer.lock().clone().unwrap_or_default();
        Ok(format!("{}ANSWER", offer))
    }

    async fn set_answer(&self, sdp: String) -> Result<()> {
        self.record(format!("set_answer:{}", sdp));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(format!("candidate:{}", candidate.candidate));
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannelHandle>> {
        if self.fail_data_channel {
            return Err(Error::DataChannelError("mock data channel failure".to_string()));
        }

        let channel = Arc::new(MockDataChannel {
            label: label.to_string(),
            ..Default::default()
        });
        *self.data_channel.lock() = Some(Arc::clone(&channel));
        Ok(channel)
    }

    async fn stats(&self) -> Result<StatsSummary> {
        Ok(StatsSummary {
            report_count: 1,
            report_ids: vec![format!("{}-transport", self.id)],
        })
    }

    async fn close(&self) -> Result<()> {
        self.record("close");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector double that keeps every peer it created
#[derive(Default)]
pub struct MockConnector {
    peers: Mutex<Vec<Arc<MockPeer>>>,
    configs: Mutex<Vec<PeerConfig>>,
    pub fail_create: AtomicBool,
    pub fail_answer: AtomicBool,
    pub fail_data_channel: AtomicBool,
    pub hold_answers: AtomicBool,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Peers created so far, oldest first
    pub fn peers(&self) -> Vec<Arc<MockPeer>> {
        self.peers.lock().clone()
    }

    pub fn peer(&self, index: usize) -> Arc<MockPeer> {
        Arc::clone(&self.peers.lock()[index])
    }

    /// Configs passed to `create`, oldest first
    pub fn configs(&self) -> Vec<PeerConfig> {
        self.configs.lock().clone()
    }

    /// Number of `create` calls, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait until `count` peers exist
    pub async fn wait_for_peers(&self, count: usize) -> Vec<Arc<MockPeer>> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let peers = self.peers();
            if peers.len() >= count {
                return peers;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "Timed out waiting for {} peers, have {}",
                count,
                peers.len()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl PeerConnector for MockConnector {
    async fn create(
        &self,
        config: &PeerConfig,
        observer: Arc<dyn PeerObserver>,
    ) -> Result<Arc<dyn PeerHandle>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().push(config.clone());

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::PeerConnectionError("mock create failure".to_string()));
        }

        let peer = Arc::new(MockPeer {
            id: format!("mock-peer-{}", attempt),
            observer,
            calls: Mutex::new(Vec::new()),
            offer: Mutex::new(None),
            closed: AtomicBool::new(false),
            fail_answer: self.fail_answer.load(Ordering::SeqCst),
            fail_data_channel: self.fail_data_channel.load(Ordering::SeqCst),
            answer_gate: self
                .hold_answers
                .load(Ordering::SeqCst)
                .then(Notify::new),
            data_channel: Mutex::new(None),
        });
        self.peers.lock().push(Arc::clone(&peer));
        Ok(peer)
    }
}
