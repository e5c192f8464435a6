//! Framed text transport over an accepted WebSocket
//!
//! The socket is split: reads happen in the session task through
//! [`TransportReader`], writes are queued on a channel and sent in order by a
//! forwarding task, so any number of [`TransportWriter`] clones may enqueue.

use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, error, trace};

/// Outbound frames buffered before writers wait
pub const OUTBOUND_QUEUE_CAPACITY: usize = 128;

/// Result of one read
#[derive(Debug)]
pub enum ReadEvent {
    /// A complete text frame
    Text(String),
    /// The peer closed the connection or the stream ended
    Closed,
    /// Any other transport error
    Failed(Error),
}

/// Source of inbound text frames
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next frame
    ///
    /// Must be cancel safe: dropping the future before it completes loses no
    /// text frame.
    async fn read(&mut self) -> ReadEvent;
}

/// Enqueues outbound frames for the forwarding task
#[derive(Debug, Clone)]
pub struct TransportWriter {
    tx: mpsc::Sender<Message>,
}

impl TransportWriter {
    /// Create a writer and the receiving end of its queue
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue a text frame; fails once the socket has stopped accepting writes
    pub async fn write_text(&self, payload: String) -> Result<()> {
        self.write_message(Message::Text(payload)).await
    }

    /// Enqueue a close frame
    pub async fn close(&self) -> Result<()> {
        self.write_message(Message::Close(None)).await
    }

    async fn write_message(&self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| Error::TransportClosed("outbound queue closed".to_string()))
    }

    /// Whether the forwarding side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Reading half of an accepted WebSocket
pub struct TransportReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
    writer: TransportWriter,
}

#[async_trait]
impl<S> FrameSource for TransportReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self) -> ReadEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return ReadEvent::Text(text),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Received close frame: {:?}", frame);
                    return ReadEvent::Closed;
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.writer.write_message(Message::Pong(data)).await {
                        return ReadEvent::Failed(e);
                    }
                }
                Some(Ok(other)) => trace!("Skipping non-text frame ({} bytes)", other.len()),
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return ReadEvent::Closed
                }
                Some(Err(e)) => return ReadEvent::Failed(e.into()),
            }
        }
    }
}

/// An accepted WebSocket connection
pub struct TransportSession<S> {
    /// Inbound frames
    pub reader: TransportReader<S>,
    /// Outbound frames
    pub writer: TransportWriter,
}

impl<S> TransportSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Complete the WebSocket handshake on `stream` and start the forwarding
    /// task
    pub async fn accept(stream: S) -> Result<Self> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_tx, ws_rx) = ws_stream.split();

        let (writer, mut rx) = TransportWriter::channel(OUTBOUND_QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = message.is_close();
                if let Err(e) = ws_tx.send(message).await {
                    error!("Failed to send WebSocket message: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            trace!("WebSocket forwarding task finished");
        });

        Ok(Self {
            reader: TransportReader {
                stream: ws_rx,
                writer: writer.clone(),
            },
            writer,
        })
    }
}
