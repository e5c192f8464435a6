//! Session data channel over an `RTCDataChannel`

use crate::peer::{DataChannelHandle, DataChannelState, PeerEvent, PeerObserver};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

/// Ordered, reliable data channel whose callbacks are routed to a
/// [`PeerObserver`]
pub struct DataChannel {
    label: String,
    rtc_channel: Arc<RTCDataChannel>,
}

impl DataChannel {
    /// Open a channel labelled `label` on `peer_connection`
    pub async fn open(
        peer_connection: &RTCPeerConnection,
        label: &str,
        observer: Arc<dyn PeerObserver>,
    ) -> Result<Self> {
        // No max_retransmits / max_packet_life_time: reliable delivery
        let init = RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        };

        let rtc_channel = peer_connection
            .create_data_channel(label, Some(init))
            .await
            .map_err(|e| {
                Error::DataChannelError(format!("Failed to create data channel: {}", e))
            })?;

        let channel = Self {
            label: label.to_string(),
            rtc_channel,
        };
        channel.install_handlers(observer);

        Ok(channel)
    }

    fn install_handlers(&self, observer: Arc<dyn PeerObserver>) {
        let label = self.label.clone();
        let on_open = Arc::clone(&observer);
        self.rtc_channel.on_open(Box::new(move || {
            let observer = Arc::clone(&on_open);
            let label = label.clone();
            Box::pin(async move {
                debug!("Data channel '{}' opened", label);
                observer.on_event(PeerEvent::DataChannelStateChanged(DataChannelState::Open));
            })
        }));

        let label = self.label.clone();
        let on_close = Arc::clone(&observer);
        self.rtc_channel.on_close(Box::new(move || {
            let observer = Arc::clone(&on_close);
            let label = label.clone();
            Box::pin(async move {
                debug!("Data channel '{}' closed", label);
                observer.on_event(PeerEvent::DataChannelStateChanged(DataChannelState::Closed));
            })
        }));

        let on_message = observer;
        self.rtc_channel.on_message(Box::new(move |msg: DataChannelMessage| {
            let observer = Arc::clone(&on_message);
            Box::pin(async move {
                observer.on_event(PeerEvent::DataChannelMessage(msg.data));
            })
        }));

        let label = self.label.clone();
        self.rtc_channel.on_error(Box::new(move |err: webrtc::Error| {
            let label = label.clone();
            Box::pin(async move {
                warn!("Data channel '{}' error: {}", label, err);
            })
        }));
    }

    /// Current channel state
    pub fn state(&self) -> DataChannelState {
        self.rtc_channel.ready_state().into()
    }
}

#[async_trait]
impl DataChannelHandle for DataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        self.rtc_channel.ready_state() == RTCDataChannelState::Open
    }

    async fn send(&self, data: Bytes) -> Result<()> {
        self.rtc_channel
            .send(&data)
            .await
            .map_err(|e| {
                Error::DataChannelError(format!("Failed to send on '{}': {}", self.label, e))
            })?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.rtc_channel
            .close()
            .await
            .map_err(|e| {
                Error::DataChannelError(format!("Failed to close '{}': {}", self.label, e))
            })
    }
}

impl std::fmt::Debug for DataChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChannel")
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}
