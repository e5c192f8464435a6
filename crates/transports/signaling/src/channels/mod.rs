//! Data channels opened by the server side of a peer connection

mod data_channel;

pub use data_channel::DataChannel;
