//! JSON control protocol spoken over the signaling WebSocket
//!
//! Every text frame carries one JSON object discriminated by its `type` field.

use serde::{Deserialize, Serialize};

/// ICE candidate as exchanged on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceCandidate {
    /// Candidate attribute line
    pub candidate: String,

    /// Media section index the candidate belongs to
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: u16,

    /// Media stream identification tag
    #[serde(rename = "sdpMid")]
    pub sdp_mid: String,
}

/// Messages received from the signaling client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Remote SDP offer; starts a new negotiation
    Offer {
        /// SDP offer
        sdp: String,
    },

    /// Remote SDP answer
    Answer {
        /// SDP answer
        sdp: String,
    },

    /// Remote ICE candidate
    Candidate {
        /// Candidate payload
        ice: IceCandidate,
    },

    /// Client is leaving (`close` or `bye`)
    #[serde(alias = "bye")]
    Close,

    /// Client joins; answered with `accept` and starts the heartbeat
    Register,

    /// Reply to a heartbeat ping (accepted and ignored)
    Pong,
}

/// Outcome of decoding one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFrame {
    /// Recognised control message
    Message(ControlMessage),
    /// Valid JSON object with a `type` this protocol does not know
    Unknown(String),
    /// Not JSON, no `type` field, or missing required fields
    Malformed(String),
}

impl ControlMessage {
    /// Decode a text frame
    ///
    /// Never fails: frames that cannot be used are reported as
    /// [`ParsedFrame::Unknown`] or [`ParsedFrame::Malformed`] so the caller can
    /// drop them and keep reading.
    pub fn parse(text: &str) -> ParsedFrame {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return ParsedFrame::Malformed(format!("invalid JSON: {}", e)),
        };

        let message_type = match value.get("type").and_then(|t| t.as_str()) {
            Some(t) => t.to_string(),
            None => return ParsedFrame::Malformed("missing string field `type`".to_string()),
        };

        if !Self::is_known_type(&message_type) {
            return ParsedFrame::Unknown(message_type);
        }

        match serde_json::from_value::<ControlMessage>(value) {
            Ok(message) => ParsedFrame::Message(message),
            Err(e) => ParsedFrame::Malformed(format!("invalid `{}` message: {}", message_type, e)),
        }
    }

    fn is_known_type(message_type: &str) -> bool {
        matches!(
            message_type,
            "offer" | "answer" | "candidate" | "close" | "bye" | "register" | "pong"
        )
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::Close => "close",
            Self::Register => "register",
            Self::Pong => "pong",
        }
    }
}

/// Messages sent to the signaling client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Local SDP answer
    Answer {
        /// SDP answer
        sdp: String,
    },

    /// Locally gathered ICE candidate
    Candidate {
        /// Candidate payload
        ice: IceCandidate,
    },

    /// Reply to `register`
    Accept {
        /// Always true: the viewer is the only peer and is always present
        #[serde(rename = "isExistUser")]
        is_exist_user: bool,
    },

    /// Heartbeat announcement; no reply is required
    Ping,

    /// Data channel message mirrored over the signaling socket
    #[serde(rename = "datachannel")]
    DataChannel {
        /// Message text
        message: String,
    },
}

impl OutboundMessage {
    /// The `accept` reply sent for `register`
    pub fn accept() -> Self {
        Self::Accept {
            is_exist_user: true,
        }
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
