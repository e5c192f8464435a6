//! WebSocket signaling server
//!
//! Accepts TCP connections and runs one signaling session per connection.

use super::handler::{handle_connection, SharedState};
use crate::{Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// WebSocket signaling server bound to a local address
pub struct SignalingServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<SharedState>,
}

impl SignalingServer {
    /// Bind to `state.config.listen_addr`
    pub async fn bind(state: Arc<SharedState>) -> Result<Self> {
        let addr: SocketAddr = state.config.listen_addr.parse().map_err(|e| {
            Error::InvalidConfig(format!(
                "Invalid listen_addr {}: {}",
                state.config.listen_addr, e
            ))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind WebSocket server to {}: {}", addr, e);
            e
        })?;
        let local_addr = listener.local_addr()?;
        info!("WebSocket signaling server listening on ws://{}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            state,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get shared state (for external access)
    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    /// Accept connections until `shutdown` resolves, then ask every live
    /// session to tear down
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => match result {
                    Ok((stream, peer_addr)) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, state).await {
                                error!("WebSocket connection error from {}: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept WebSocket connection: {}", e);
                    }
                },
                _ = &mut shutdown => {
                    info!("WebSocket signaling server received shutdown signal");
                    break;
                }
            }
        }

        let notified = self.state.registry.shutdown_all();
        info!(
            "WebSocket signaling server accept loop exited, {} sessions asked to close",
            notified
        );
        Ok(())
    }

    /// Run the accept loop on a spawned task
    pub fn start(self) -> SignalingServerHandle {
        let local_addr = self.local_addr;
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

        let task = tokio::spawn(self.run(async move {
            let _ = shutdown_rx.recv().await;
        }));

        SignalingServerHandle {
            local_addr,
            shutdown_tx,
            task: Some(task),
        }
    }
}

/// Handle for a server started with [`SignalingServer::start`]
pub struct SignalingServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<Result<()>>>,
}

impl SignalingServerHandle {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections, close live sessions and wait for the
    /// accept loop to exit
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down WebSocket signaling server");
        let _ = self.shutdown_tx.send(());

        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| Error::Other(anyhow::anyhow!("accept loop panicked: {}", e)))?,
            None => Ok(()),
        }
    }
}

impl Drop for SignalingServerHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            warn!("SignalingServerHandle dropped without shutdown, stopping accept loop");
            let _ = self.shutdown_tx.send(());
        }
    }
}
