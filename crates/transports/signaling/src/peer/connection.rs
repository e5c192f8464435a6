//! webrtc-rs backed peer connections

use super::tracks::{RemoteVideoTrack, RenderSink, TrackRegistry};
use super::{
    DataChannelHandle, PeerConnector, PeerEvent, PeerHandle, PeerObserver, StatsSummary,
};
use crate::channels::DataChannel;
use crate::config::PeerConfig;
use crate::signaling::protocol::IceCandidate;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// Creates webrtc-rs peer connections that hand remote video to a render sink
#[derive(Clone)]
pub struct WebRtcConnector {
    render_sink: Arc<dyn RenderSink>,
}

impl WebRtcConnector {
    /// Create a connector delivering remote video tracks to `render_sink`
    pub fn new(render_sink: Arc<dyn RenderSink>) -> Self {
        Self { render_sink }
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn create(
        &self,
        config: &PeerConfig,
        observer: Arc<dyn PeerObserver>,
    ) -> Result<Arc<dyn PeerHandle>> {
        let peer = WebRtcPeer::new(config, observer, Arc::clone(&self.render_sink)).await?;
        Ok(Arc::new(peer))
    }
}

/// One webrtc-rs peer connection
pub struct WebRtcPeer {
    /// Unique identifier for this connection instance
    connection_id: String,

    peer_connection: Arc<RTCPeerConnection>,

    /// Receives every engine callback for this connection
    observer: Arc<dyn PeerObserver>,

    /// Remote video tracks currently handed to `render_sink`
    tracks: Arc<TrackRegistry>,

    render_sink: Arc<dyn RenderSink>,
}

impl WebRtcPeer {
    /// Build a peer connection with default codecs and interceptors
    ///
    /// Observer callbacks are installed before the connection is returned, so
    /// no ICE candidate or state change can be missed.
    #[instrument(skip_all)]
    pub async fn new(
        config: &PeerConfig,
        observer: Arc<dyn PeerObserver>,
        render_sink: Arc<dyn RenderSink>,
    ) -> Result<Self> {
        let connection_id = uuid::Uuid::new_v4().to_string();
        info!("Creating peer connection {}", connection_id);

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::WebRtcError(format!("Failed to register interceptors: {}", e))
            })?;

        let mut setting_engine = SettingEngine::default();
        setting_engine.set_ice_timeouts(
            Some(config.ice_disconnected_timeout),
            None,
            Some(config.ice_keepalive_interval),
        );

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .with_setting_engine(setting_engine)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|url| RTCIceServer {
                    urls: vec![url.clone()],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection =
            Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
                Error::PeerConnectionError(format!("Failed to create peer connection: {}", e))
            })?);

        let peer = Self {
            connection_id,
            peer_connection,
            observer,
            tracks: Arc::new(TrackRegistry::new()),
            render_sink,
        };
        peer.install_handlers();

        Ok(peer)
    }

    fn install_handlers(&self) {
        let observer = Arc::clone(&self.observer);
        let connection_id = self.connection_id.clone();
        self.peer_connection
            .on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
                let observer = Arc::clone(&observer);
                let connection_id = connection_id.clone();
                Box::pin(async move {
                    debug!("Peer {} ICE connection state: {}", connection_id, state);
                    observer.on_event(PeerEvent::IceConnectionStateChanged(state.into()));
                })
            }));

        let observer = Arc::clone(&self.observer);
        self.peer_connection
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let observer = Arc::clone(&observer);
                Box::pin(async move {
                    let Some(candidate) = candidate else {
                        debug!("ICE gathering complete");
                        return;
                    };

                    match candidate.to_json() {
                        Ok(init) => observer.on_event(PeerEvent::IceCandidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mline_index: init.sdp_mline_index.unwrap_or(0),
                            sdp_mid: init.sdp_mid.unwrap_or_default(),
                        })),
                        Err(e) => warn!("Failed to serialize local ICE candidate: {}", e),
                    }
                })
            }));

        let tracks = Arc::clone(&self.tracks);
        let sink = Arc::clone(&self.render_sink);
        self.peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tracks = Arc::clone(&tracks);
                let sink = Arc::clone(&sink);
                Box::pin(async move {
                    if track.kind() != RTPCodecType::Video {
                        debug!("Ignoring remote {} track {}", track.kind(), track.id());
                        return;
                    }

                    let info = RemoteVideoTrack {
                        id: track.id(),
                        stream_id: track.stream_id(),
                        mime_type: track.codec().capability.mime_type.clone(),
                    };
                    if !tracks.add(info.clone(), sink.as_ref()) {
                        return;
                    }

                    // Drain RTP until the track ends, then withdraw it
                    tokio::spawn(async move {
                        let mut packets: u64 = 0;
                        while track.read_rtp().await.is_ok() {
                            packets += 1;
                        }
                        debug!("Remote track {} ended after {} packets", info.id, packets);
                        tracks.remove(&info.id, sink.as_ref());
                    });
                })
            },
        ));

        self.peer_connection
            .on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
                Box::pin(async move {
                    debug!("Remote opened data channel '{}'", channel.label());
                })
            }));
    }

    /// Number of remote video tracks currently handed to the render sink
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

#[async_trait]
impl PeerHandle for WebRtcPeer {
    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    async fn set_offer(&self, sdp: String) -> Result<()> {
        let offer = RTCSessionDescription::offer(sdp)
            .map_err(|e| Error::SdpError(format!("Failed to parse offer: {}", e)))?;

        self.peer_connection
            .set_remote_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create answer: {}", e)))?;

        self.peer_connection
            .set_local_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        let local_desc = self
            .peer_connection
            .local_description()
            .await
            .ok_or_else(|| {
                Error::SdpError("No local description after setting answer".to_string())
            })?;

        debug!("Created SDP answer for connection {}", self.connection_id);
        Ok(local_desc.sdp)
    }

    async fn set_answer(&self, sdp: String) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| Error::SdpError(format!("Failed to parse answer: {}", e)))?;

        self.peer_connection
            .set_remote_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        debug!(
            "Adding ICE candidate for connection {}: {}",
            self.connection_id, candidate.candidate
        );

        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: Some(candidate.sdp_mid),
            sdp_mline_index: Some(candidate.sdp_mline_index),
            username_fragment: None,
        };

        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::IceCandidateError(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannelHandle>> {
        let channel =
            DataChannel::open(&self.peer_connection, label, Arc::clone(&self.observer)).await?;
        Ok(Arc::new(channel))
    }

    async fn stats(&self) -> Result<StatsSummary> {
        let report = self.peer_connection.get_stats().await;
        let mut report_ids: Vec<String> = report.reports.keys().cloned().collect();
        report_ids.sort();

        Ok(StatsSummary {
            report_count: report_ids.len(),
            report_ids,
        })
    }

    async fn close(&self) -> Result<()> {
        info!("Closing peer connection {}", self.connection_id);

        let withdrawn = self.tracks.clear_all(self.render_sink.as_ref());
        if withdrawn > 0 {
            debug!("Withdrew {} remote video tracks", withdrawn);
        }

        self.peer_connection.close().await.map_err(|e| {
            Error::PeerConnectionError(format!("Failed to close connection: {}", e))
        })
    }
}
