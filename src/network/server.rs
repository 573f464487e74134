//! WebSocket Game Server
//!
//! Accepts WebSocket connections and feeds them into a single game task.
//!
//! Each connection gets a reader (frames in, forwarded as [`Inbound`]
//! events) and a writer (drains the connection's outbound queue). The
//! game task owns the [`Dispatcher`] and multiplexes inbound events, the
//! tick interval and the shutdown signal with `select!`, so no game state
//! is ever shared between tasks.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ServerConfig, StorageConfig};
use crate::game::content::{ContentError, ContentTables};
use crate::network::broadcast::Outbound;
use crate::network::dispatch::{ConnectionId, Dispatcher};
use crate::network::world::World;
use crate::persistence::{MemoryStore, PersistenceGateway, SqliteStore, StoreError};

/// Reason sent to clients on a graceful shutdown.
pub const SHUTDOWN_REASON: &str = "Server shutting down";

/// Capacity of the connection -> game task queue.
const INBOUND_QUEUE: usize = 4096;

/// How long connection tasks get to flush their final frames on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// Storage backend could not be opened.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Content document missing or invalid.
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Game task panicked or was cancelled.
    #[error("Game task failed: {0}")]
    GameTask(#[from] tokio::task::JoinError),
}

/// Connection event delivered to the game task.
#[derive(Debug)]
pub enum Inbound {
    Connected { conn: ConnectionId, outbound: Outbound },
    Frame { conn: ConnectionId, text: String },
    Disconnected { conn: ConnectionId },
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Class and recipe tables.
    content: Arc<ContentTables>,
    /// Storage backend.
    store: Arc<dyn PersistenceGateway>,
    /// Open WebSocket connections.
    connections: Arc<AtomicUsize>,
    /// Next connection id.
    next_conn: AtomicU64,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server over already-loaded content and storage.
    pub fn new(
        config: ServerConfig,
        content: Arc<ContentTables>,
        store: Arc<dyn PersistenceGateway>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            content,
            store,
            connections: Arc::new(AtomicUsize::new(0)),
            next_conn: AtomicU64::new(1),
            shutdown_tx,
        }
    }

    /// Load content and open storage as described by `config`.
    pub fn from_config(config: ServerConfig) -> Result<Self, GameServerError> {
        let content = match &config.content_path {
            Some(path) => ContentTables::from_path(path)?,
            None => ContentTables::builtin()?,
        };
        info!(
            classes = content.classes.len(),
            recipes = content.recipes.len(),
            "Content loaded"
        );

        let store: Arc<dyn PersistenceGateway> = match &config.storage {
            StorageConfig::Sqlite(path) => Arc::new(SqliteStore::open(path)?),
            StorageConfig::Memory => Arc::new(MemoryStore::new()),
        };
        info!(backend = store.name(), "Storage ready");

        Ok(Self::new(config, Arc::new(content), store))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until shutdown.
    ///
    /// Returns once every session has been flushed to storage and every
    /// connection has written its `shutdown` frame, or [`DRAIN_TIMEOUT`]
    /// has passed.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut conn_tasks = JoinSet::new();

        let world = World::new(
            self.content.clone(),
            self.store.clone(),
            self.config.tick_rate,
        );
        let game = tokio::spawn(run_game_loop(
            Dispatcher::new(world),
            inbound_rx,
            tick_period(self.config.tick_rate),
            self.shutdown_tx.subscribe(),
        ));

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::SeqCst) >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
                            debug!(conn, "New connection from {}", addr);
                            self.handle_connection(&mut conn_tasks, stream, conn, inbound_tx.clone());
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                Some(_) = conn_tasks.join_next(), if !conn_tasks.is_empty() => {}
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        drop(inbound_tx);
        game.await?;

        // The game task dropped every outbound queue, so writers finish
        // once their backlog is on the wire.
        let drain = async { while conn_tasks.join_next().await.is_some() {} };
        if timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            warn!(remaining = conn_tasks.len(), "Connections did not drain, aborting");
            conn_tasks.shutdown().await;
        }
        info!("Game server stopped");
        Ok(())
    }

    /// Spawn the reader and writer for one accepted socket.
    fn handle_connection(
        &self,
        tasks: &mut JoinSet<()>,
        stream: TcpStream,
        conn: ConnectionId,
        inbound: mpsc::Sender<Inbound>,
    ) {
        let connections = self.connections.clone();
        connections.fetch_add(1, Ordering::SeqCst);

        tasks.spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!(conn, "WebSocket handshake failed: {}", e);
                    connections.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (outbound, mut outbound_rx) = Outbound::channel();

            if inbound.send(Inbound::Connected { conn, outbound }).await.is_err() {
                connections.fetch_sub(1, Ordering::SeqCst);
                return;
            }

            // Ends when the game task drops the session's queue.
            let mut writer = tokio::spawn(async move {
                while let Some(msg) = outbound_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            loop {
                tokio::select! {
                    frame = ws_receiver.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                if inbound.send(Inbound::Frame { conn, text }).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(conn, "Client disconnected");
                                break;
                            }
                            Some(Err(e)) => {
                                debug!(conn, "WebSocket error: {}", e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = &mut writer => {
                        break;
                    }
                }
            }

            let _ = inbound.send(Inbound::Disconnected { conn }).await;
            connections.fetch_sub(1, Ordering::SeqCst);
            debug!(conn, "Connection cleaned up");
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Interval between ticks at `tick_rate` Hz.
pub fn tick_period(tick_rate: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(tick_rate.max(1)))
}

/// The game task: the only place game state is touched.
async fn run_game_loop(
    mut dispatcher: Dispatcher,
    mut inbound: mpsc::Receiver<Inbound>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(event) = inbound.recv() => match event {
                Inbound::Connected { conn, outbound } => dispatcher.on_connect(conn, outbound),
                Inbound::Frame { conn, text } => dispatcher.on_frame(conn, &text),
                Inbound::Disconnected { conn } => dispatcher.on_disconnect(conn),
            },
            _ = ticker.tick() => {
                dispatcher.tick();
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    dispatcher.shutdown(SHUTDOWN_REASON);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio_tungstenite::connect_async;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            storage: StorageConfig::Memory,
            ..Default::default()
        }
    }

    async fn start(config: ServerConfig) -> (Arc<GameServer>, String, tokio::task::JoinHandle<Result<(), GameServerError>>) {
        let listener = TcpListener::bind(config.bind_addr).await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = Arc::new(GameServer::from_config(config).unwrap());
        let task = {
            let server = server.clone();
            tokio::spawn(async move { server.serve(listener).await })
        };
        (server, url, task)
    }

    /// Next frame of the given type, skipping everything else.
    async fn next_of_type<S>(ws: &mut S, kind: &str) -> Value
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = msg {
                let json: Value = serde_json::from_str(&text).unwrap();
                if json["type"] == kind {
                    return json;
                }
            }
        }
    }

    #[test]
    fn test_tick_period() {
        assert_eq!(tick_period(20), Duration::from_millis(50));
        assert_eq!(tick_period(0), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = GameServer::from_config(test_config()).unwrap();
        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.config().tick_rate, 20);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let server = GameServer::from_config(test_config()).unwrap();
        server.shutdown();
        // Should not panic
    }

    #[tokio::test]
    async fn test_bad_content_path_fails() {
        let config = ServerConfig {
            content_path: Some("/nonexistent/content.json".into()),
            ..test_config()
        };
        assert!(matches!(
            GameServer::from_config(config),
            Err(GameServerError::Content(_))
        ));
    }

    #[tokio::test]
    async fn test_join_chat_and_shutdown_over_websocket() {
        let (server, url, task) = start(test_config()).await;

        let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
        ws.send(Message::Text(r#"{"type":"join","name":"Tester"}"#.to_string()))
            .await
            .unwrap();
        let init = next_of_type(&mut ws, "init").await;
        assert_eq!(init["player"]["name"], "Tester");
        assert_eq!(server.connection_count(), 1);

        ws.send(Message::Text(r#"{"type":"chat","msg":"hello"}"#.to_string()))
            .await
            .unwrap();
        loop {
            let chat = next_of_type(&mut ws, "chat").await;
            if chat["msg"] == "hello" {
                assert_eq!(chat["name"], "Tester");
                break;
            }
        }

        server.shutdown();
        let bye = next_of_type(&mut ws, "shutdown").await;
        assert_eq!(bye["reason"], SHUTDOWN_REASON);

        timeout(Duration::from_secs(5), task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_serve_returns_after_connections_flush() {
        let (server, url, task) = start(test_config()).await;

        let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
        ws.send(Message::Text(r#"{"type":"join","name":"Flusher"}"#.to_string()))
            .await
            .unwrap();
        next_of_type(&mut ws, "init").await;

        server.shutdown();
        timeout(Duration::from_secs(5), task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();

        // Every connection task has already finished by the time serve returns.
        assert_eq!(server.connection_count(), 0);
        let bye = next_of_type(&mut ws, "shutdown").await;
        assert_eq!(bye["reason"], SHUTDOWN_REASON);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let config = ServerConfig {
            max_connections: 1,
            ..test_config()
        };
        let (server, url, _task) = start(config).await;

        let (mut first, _) = connect_async(url.as_str()).await.unwrap();
        first
            .send(Message::Text(r#"{"type":"join","name":"a"}"#.to_string()))
            .await
            .unwrap();
        next_of_type(&mut first, "init").await;

        assert!(connect_async(url.as_str()).await.is_err());
        server.shutdown();
    }
}
