//! WebSocket signaling server
//!
//! Accepts WebSocket upgrades and runs one signaling session per client.

pub mod handler;
mod server;
pub mod transport;

pub use handler::{handle_connection, handle_stream, SharedState};
pub use server::{SignalingServer, SignalingServerHandle};
pub use transport::{FrameSource, ReadEvent, TransportReader, TransportSession, TransportWriter};
