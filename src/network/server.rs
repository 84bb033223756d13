//! WebSocket Table Server
//!
//! Accepts WebSocket connections, frames JSON text messages in and out,
//! and hands every decoded frame to that connection's [`Dispatcher`]. One
//! writer task per connection drains its bounded outbound queue, so every
//! frame a connection is sent arrives in queue order.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::network::dispatcher::Dispatcher;
use crate::protocol::{ErrorCode, ServerFrame};
use crate::table::TableDirectory;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Per-connection outbound queue depth.
    pub outbound_queue: usize,
    /// Interval between table cleanup sweeps.
    pub cleanup_interval: Duration,
    /// Deserted mid-game tables survive this many sweeps before reaping,
    /// giving disconnected players a window to come back.
    pub abandoned_sweeps: u32,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("static address"),
            max_connections: 1000,
            outbound_queue: 64,
            cleanup_interval: Duration::from_secs(60),
            abandoned_sweeps: 5,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Table server errors.
#[derive(Debug, thiserror::Error)]
pub enum TableServerError {
    /// Failed to bind to address.
    #[error("failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// The table server: one process hosting many independent tables.
pub struct TableServer {
    config: ServerConfig,
    directory: Arc<TableDirectory>,
    connections: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TableServer {
    /// Create a server with an empty table directory.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            directory: Arc::new(TableDirectory::new()),
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// The shared table directory.
    pub fn directory(&self) -> Arc<TableDirectory> {
        self.directory.clone()
    }

    /// Run the accept loop until shutdown.
    pub async fn run(&self) -> Result<(), TableServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("table server v{} listening on {}", self.config.version, self.config.bind_addr);

        let cleanup_directory = self.directory.clone();
        let cleanup_interval = self.config.cleanup_interval;
        let abandoned_sweeps = self.config.abandoned_sweeps;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_directory, cleanup_interval, abandoned_sweeps).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::Relaxed) >= self.config.max_connections {
                                warn!("connection limit reached, rejecting {addr}");
                                continue;
                            }
                            debug!("new connection from {addr}");
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("accept error: {e}");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    /// Handshake and run one connection to completion on its own task.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let directory = self.directory.clone();
        let connections = self.connections.clone();
        let queue_depth = self.config.outbound_queue;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("websocket handshake failed for {addr}: {e}");
                    connections.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (frame_tx, mut frame_rx) = mpsc::channel::<ServerFrame>(queue_depth);

            // Writer task: the single consumer of this connection's queue.
            let sender_task = tokio::spawn(async move {
                while let Some(frame) = frame_rx.recv().await {
                    let text = match serde_json::to_string(&frame) {
                        Ok(t) => t,
                        Err(e) => {
                            error!("failed to serialize frame: {e}");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut dispatcher = Dispatcher::new(directory, frame_tx.clone());

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str(&text) {
                                    Ok(frame) => dispatcher.handle_frame(frame).await,
                                    Err(e) => {
                                        debug!("invalid frame from {addr}: {e}");
                                        let _ = frame_tx.send(ServerFrame::Error {
                                            code: ErrorCode::MalformedFrame,
                                            message: "invalid frame format".to_string(),
                                        }).await;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("client {addr} disconnected");
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("websocket error for {addr}: {e}");
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = frame_tx.send(ServerFrame::Shutdown {
                            reason: "server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            dispatcher.connection_closed().await;
            sender_task.abort();
            connections.fetch_sub(1, Ordering::Relaxed);
            debug!("client {addr} cleaned up");
        });
    }

    /// Periodic sweep reaping tables nobody is attached to. Most sweeps
    /// spare deserted mid-game tables; every Nth sweep reaps those too.
    async fn run_cleanup_loop(
        directory: Arc<TableDirectory>,
        period: Duration,
        abandoned_sweeps: u32,
    ) {
        let mut ticker = interval(period);
        let mut sweep: u32 = 0;

        loop {
            ticker.tick().await;
            sweep = sweep.wrapping_add(1);
            let reap_playing = abandoned_sweeps > 0 && sweep % abandoned_sweeps == 0;
            directory.cleanup(reap_playing).await;
            let tables = directory.table_count().await;
            debug!(tables, reap_playing, "cleanup sweep");
        }
    }

    /// Signal every task to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.outbound_queue, 64);
        assert!(config.abandoned_sweeps > 0);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = TableServer::new(ServerConfig::default());
        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.directory().table_count().await, 0);
    }

    #[tokio::test]
    async fn test_server_shutdown_stops_run() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = Arc::new(TableServer::new(config));

        let running = server.clone();
        let handle = tokio::spawn(async move { running.run().await });

        // Give the accept loop a moment to bind, then signal shutdown.
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("run should exit after shutdown")
            .expect("task should not panic");
        assert!(result.is_ok());
    }
}
