//! Configuration types for the signaling server

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public STUN servers used unless `use_stun` is turned off
pub const DEFAULT_STUN_SERVERS: [&str; 3] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
];

/// Main configuration for the signaling server and its sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingConfig {
    /// Address the WebSocket listener binds to (default: 0.0.0.0:8080)
    pub listen_addr: String,

    /// Offer STUN servers to the peer connection (default: true)
    pub use_stun: bool,

    /// STUN server URLs, used only when `use_stun` is set
    pub stun_servers: Vec<String>,

    /// Local IPC endpoint that receives connect/disconnect notifications.
    ///
    /// A Unix socket path on Unix, a named pipe (`\\.\pipe\name`) on Windows.
    /// `None` disables notifications.
    pub notify_endpoint: Option<String>,

    /// Upper bound for a single notification attempt in milliseconds (default: 2000)
    pub notify_timeout_ms: u64,

    /// Ping interval armed by `register`, in seconds (default: 30)
    pub heartbeat_interval_secs: u64,

    /// Label of the data channel opened on every new peer connection
    pub data_channel_label: String,

    /// ICE disconnected timeout in milliseconds (default: 5000)
    pub ice_disconnected_timeout_ms: u64,

    /// ICE keepalive interval in milliseconds (default: 2000)
    pub ice_keepalive_interval_ms: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            use_stun: true,
            stun_servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
            notify_endpoint: None,
            notify_timeout_ms: 2000,
            heartbeat_interval_secs: 30,
            data_channel_label: "testdatachannel".to_string(),
            ice_disconnected_timeout_ms: 5000,
            ice_keepalive_interval_ms: 2000,
        }
    }
}

impl SignalingConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `use_stun` is set but `stun_servers` is empty
    /// - `heartbeat_interval_secs` is zero
    /// - `data_channel_label` is empty
    /// - `notify_endpoint` is `Some("")`
    /// - `listen_addr` is not a socket address
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.use_stun && self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required when STUN is enabled".to_string(),
            ));
        }

        if let Some(url) = self
            .stun_servers
            .iter()
            .find(|url| !url.starts_with("stun:") && !url.starts_with("stuns:"))
        {
            return Err(Error::InvalidConfig(format!(
                "STUN server URL must start with stun: or stuns:, got {}",
                url
            )));
        }

        if self.heartbeat_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.data_channel_label.is_empty() {
            return Err(Error::InvalidConfig(
                "data_channel_label must not be empty".to_string(),
            ));
        }

        if matches!(self.notify_endpoint.as_deref(), Some("")) {
            return Err(Error::InvalidConfig(
                "notify_endpoint must not be empty (omit it to disable notifications)".to_string(),
            ));
        }

        self.listen_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                Error::InvalidConfig(format!("Invalid listen_addr {}: {}", self.listen_addr, e))
            })?;

        Ok(())
    }

    /// Heartbeat interval as a `Duration`
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Notification timeout as a `Duration`
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    /// Peer connection settings derived from this configuration
    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            ice_servers: if self.use_stun {
                self.stun_servers.clone()
            } else {
                Vec::new()
            },
            data_channel_label: self.data_channel_label.clone(),
            ice_disconnected_timeout: Duration::from_millis(self.ice_disconnected_timeout_ms),
            ice_keepalive_interval: Duration::from_millis(self.ice_keepalive_interval_ms),
        }
    }
}

/// Settings handed to the peer connection engine for each new connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// ICE server URLs (empty when STUN is disabled)
    pub ice_servers: Vec<String>,

    /// Label for the ordered, reliable data channel
    pub data_channel_label: String,

    /// Time without ICE traffic before the connection is reported disconnected
    pub ice_disconnected_timeout: Duration,

    /// Interval of ICE keepalive checks
    pub ice_keepalive_interval: Duration,
}
