//! Best-effort connect/disconnect notifications to a local process
//!
//! Each notification opens the configured endpoint, writes one literal payload
//! and closes it again. Failures are logged and swallowed; the signaling
//! session never observes them.
//!
//! Sessions do not call a sink directly. They push into a [`NotificationQueue`],
//! which delivers in order from its own task, so an endpoint that stalls until
//! the delivery timeout never holds up frame handling.

use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connection edge reported to the local consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    /// The peer connection reached ICE `connected`
    Connected,
    /// The peer connection left ICE `connected` (or the session ended)
    Disconnected,
}

impl Notification {
    /// Literal wire payload
    pub fn as_str(&self) -> &'static str {
        match self {
            Notification::Connected => "SCREEN_CAPTURE_CONNECTED",
            Notification::Disconnected => "SCREEN_CAPTURE_DISCONNECTED",
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for connection notifications
///
/// Implementations must not return errors or panic: delivery is a hint only.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Attempt to deliver `notification` once
    async fn notify(&self, notification: Notification);
}

/// Ordered background delivery into a [`NotificationSink`]
pub struct NotificationQueue {
    tx: Option<mpsc::UnboundedSender<Notification>>,
    task: Option<JoinHandle<()>>,
}

impl NotificationQueue {
    /// Start the delivery task for `sink`
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        let task = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                sink.notify(notification).await;
            }
        });

        Self {
            tx: Some(tx),
            task: Some(task),
        }
    }

    /// Queue `notification` behind any not yet delivered
    pub fn push(&self, notification: Notification) {
        let queued = self
            .tx
            .as_ref()
            .is_some_and(|tx| tx.send(notification).is_ok());
        if !queued {
            debug!("Notification queue closed, dropping {}", notification);
        }
    }

    /// Stop accepting notifications and wait until the queued ones are delivered
    pub async fn flush(&mut self) {
        self.tx.take();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Notification task failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationQueue")
            .field("open", &self.tx.is_some())
            .finish()
    }
}

/// Sends notifications over a Unix domain socket (Unix) or named pipe (Windows)
#[derive(Debug, Clone)]
pub struct PipeNotifier {
    endpoint: Option<String>,
    timeout: Duration,
}

impl PipeNotifier {
    /// Create a notifier for `endpoint`; `None` disables delivery
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }

    /// Build from the server configuration
    pub fn from_config(config: &crate::config::SignalingConfig) -> Self {
        Self::new(config.notify_endpoint.clone(), config.notify_timeout())
    }

    /// Configured endpoint
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    async fn try_send(&self, endpoint: &str, payload: &[u8]) -> Result<()> {
        tokio::time::timeout(self.timeout, write_once(endpoint, payload))
            .await
            .map_err(|_| {
                Error::NotificationError(format!(
                    "timed out after {:?} writing to {}",
                    self.timeout, endpoint
                ))
            })?
    }
}

#[async_trait]
impl NotificationSink for PipeNotifier {
    async fn notify(&self, notification: Notification) {
        let Some(endpoint) = self.endpoint.as_deref() else {
            debug!("No notification endpoint configured, dropping {}", notification);
            return;
        };

        match self.try_send(endpoint, notification.as_str().as_bytes()).await {
            Ok(()) => info!(endpoint = %endpoint, "Sent notification: {}", notification),
            Err(e) => warn!(
                endpoint = %endpoint,
                "Failed to send notification {}: {}", notification, e
            ),
        }
    }
}

#[cfg(unix)]
async fn write_once(endpoint: &str, payload: &[u8]) -> Result<()> {
    let mut stream = tokio::net::UnixStream::connect(endpoint).await?;
    stream.write_all(payload).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(windows)]
async fn write_once(endpoint: &str, payload: &[u8]) -> Result<()> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let mut pipe = ClientOptions::new().read(false).open(endpoint)?;
    pipe.write_all(payload).await?;
    pipe.flush().await?;
    Ok(())
}

#[cfg(not(any(unix, windows)))]
async fn write_once(endpoint: &str, _payload: &[u8]) -> Result<()> {
    Err(Error::NotificationError(format!(
        "local endpoints are not supported on this platform: {}",
        endpoint
    )))
}
