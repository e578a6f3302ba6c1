use std::collections::HashMap;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::{mpsc, RwLock};

use crate::error::Result;
use crate::events::OutboundEvent;
use crate::registry::ConnectionId;
use crate::transport::Transport;

/// Default per-client outbound queue length.
pub const DEFAULT_MAX_SEND_QUEUE: usize = 256;

/// Write side of one client connection
pub struct Client {
    connection: ConnectionId,
    writer: OwnedWriteHalf,
}

impl Client {
    pub fn new(connection: ConnectionId, writer: OwnedWriteHalf) -> Self {
        Self { connection, writer }
    }

    /// Send event to client
    pub async fn send_event(&mut self, event: &OutboundEvent) -> Result<()> {
        let json_line = event.to_json_line()?;
        self.send_line(&json_line).await
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Drain `queue` into the socket until the queue closes or a write fails.
    pub async fn run(mut self, mut queue: mpsc::Receiver<String>) {
        while let Some(line) = queue.recv().await {
            if let Err(e) = self.send_line(&line).await {
                tracing::warn!("Failed to write to client {}: {}", self.connection, e);
                break;
            }
        }
        let _ = self.writer.shutdown().await;
        tracing::debug!("Writer for {} stopped", self.connection);
    }

    pub async fn shutdown(mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// Delivery list of connected clients; the socket-backed [`Transport`].
///
/// Sends serialize once and `try_send` into each client's bounded queue. A
/// full or closed queue marks the client dead and it is dropped from the list.
pub struct ClientManager {
    clients: RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>,
    max_send_queue: usize,
}

impl ClientManager {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            max_send_queue: max_send_queue.max(1),
        }
    }

    /// Add new client, returning the queue its writer should drain
    pub async fn add_client(&self, connection: ConnectionId) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let mut clients = self.clients.write().await;
        clients.insert(connection, tx);
        tracing::info!("New client connected. Total clients: {}", clients.len());
        rx
    }

    /// Remove client; returns false if it was already gone
    pub async fn remove_client(&self, connection: &ConnectionId) -> bool {
        let mut clients = self.clients.write().await;
        let removed = clients.remove(connection).is_some();
        if removed {
            tracing::info!("Client {} removed. Remaining: {}", connection, clients.len());
        }
        removed
    }

    /// Get current client count
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    fn encode(event: &OutboundEvent) -> Option<String> {
        match event.to_json_line() {
            Ok(line) => Some(line),
            Err(e) => {
                tracing::error!("Failed to serialize outbound event: {}", e);
                None
            }
        }
    }

    async fn drop_dead(&self, dead: Vec<ConnectionId>) {
        if dead.is_empty() {
            return;
        }
        let mut clients = self.clients.write().await;
        for connection in dead {
            clients.remove(&connection);
            tracing::info!("Removed dead client {}. Remaining: {}", connection, clients.len());
        }
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEND_QUEUE)
    }
}

#[async_trait]
impl Transport for ClientManager {
    async fn send_to(&self, connection: &ConnectionId, event: &OutboundEvent) {
        let Some(line) = Self::encode(event) else {
            return;
        };

        let delivered = {
            let clients = self.clients.read().await;
            match clients.get(connection) {
                Some(tx) => tx.try_send(line).is_ok(),
                None => {
                    tracing::debug!("No client {} to send to", connection);
                    return;
                }
            }
        };

        if !delivered {
            tracing::warn!("Failed to send to client {}", connection);
            self.drop_dead(vec![connection.clone()]).await;
        }
    }

    async fn broadcast(&self, event: &OutboundEvent) {
        let Some(line) = Self::encode(event) else {
            return;
        };

        let dead: Vec<ConnectionId> = {
            let clients = self.clients.read().await;
            clients
                .iter()
                .filter(|(_, tx)| tx.try_send(line.clone()).is_err())
                .map(|(connection, _)| connection.clone())
                .collect()
        };

        for connection in &dead {
            tracing::warn!("Failed to send to client {}", connection);
        }
        self.drop_dead(dead).await;
    }
}
