//! Signaling protocol and WebSocket server

pub mod protocol;
pub mod websocket;

pub use protocol::{ControlMessage, IceCandidate, OutboundMessage, ParsedFrame};
