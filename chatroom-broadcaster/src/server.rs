use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};

use crate::client::{Client, ClientManager, DEFAULT_MAX_SEND_QUEUE};
use crate::error::{BroadcasterError, Result};
use crate::events::{InboundFrame, OutboundEvent};
use crate::frame::{Frame, FrameReader, DEFAULT_MAX_FRAME_LEN};
use crate::registry::ConnectionId;
use crate::room::{BroadcastRoom, RoomConfig};
use crate::transport::RoomHandler;

/// Server tunables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub room: RoomConfig,
    /// Outbound lines buffered per client before it is considered dead
    pub max_send_queue: usize,
    /// Longest accepted inbound line in bytes; longer lines are dropped
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            room: RoomConfig::default(),
            max_send_queue: DEFAULT_MAX_SEND_QUEUE,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// What every connection task needs
#[derive(Clone)]
struct ConnectionContext {
    handler: Arc<dyn RoomHandler>,
    clients: Arc<ClientManager>,
    namespace: Arc<str>,
    max_frame_len: usize,
}

/// Unix socket front end for one [`BroadcastRoom`]
pub struct ChatServer {
    socket_path: PathBuf,
    room: Arc<BroadcastRoom>,
    clients: Arc<ClientManager>,
    max_frame_len: usize,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    running: Arc<RwLock<bool>>,
    shutdown: watch::Sender<bool>,
}

impl ChatServer {
    /// Create new server; nothing is bound until [`ChatServer::start`]
    pub fn new(socket_path: impl AsRef<Path>, config: ServerConfig) -> Self {
        let clients = Arc::new(ClientManager::new(config.max_send_queue));
        let room = Arc::new(BroadcastRoom::new(config.room, clients.clone()));
        let (shutdown, _) = watch::channel(false);

        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            room,
            clients,
            max_frame_len: config.max_frame_len,
            accept_task: Mutex::new(None),
            running: Arc::new(RwLock::new(false)),
            shutdown,
        }
    }

    /// Start the server (listen for clients)
    pub async fn start(&self) -> Result<()> {
        let is_running = *self.running.read().await;
        if is_running {
            return Err(BroadcasterError::AlreadyRunning);
        }

        // Remove stale socket file
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if self.socket_path.exists() {
                let permissions = std::fs::Permissions::from_mode(0o600);
                std::fs::set_permissions(&self.socket_path, permissions)?;
            }
        }

        tracing::info!(
            "Chat server started on {:?} (namespace {}, history {})",
            self.socket_path,
            self.room.config().namespace,
            self.room.config().history_capacity
        );

        *self.running.write().await = true;
        self.shutdown.send_replace(false);

        let context = ConnectionContext {
            handler: self.room.clone(),
            clients: Arc::clone(&self.clients),
            namespace: Arc::from(self.room.config().namespace.as_str()),
            max_frame_len: self.max_frame_len,
        };
        let shutdown = self.shutdown.subscribe();

        let task = tokio::spawn(accept_loop(listener, context, shutdown));
        *self.accept_task.lock().await = Some(task);

        Ok(())
    }

    /// Stop accepting clients, end every live session and remove the socket file
    ///
    /// Each open connection goes through its normal teardown, so the room
    /// sees one `on_disconnect` per session before this returns.
    pub async fn stop(&self) -> Result<()> {
        let is_running = *self.running.read().await;
        if !is_running {
            return Err(BroadcasterError::NotStarted);
        }

        *self.running.write().await = false;
        self.shutdown.send_replace(true);

        let task = self.accept_task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Client acceptance task failed: {}", e);
            }
        }

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        tracing::info!("Chat server stopped");
        Ok(())
    }

    /// Shared handle to the room, e.g. for the recent-history query
    pub fn room(&self) -> Arc<BroadcastRoom> {
        Arc::clone(&self.room)
    }

    pub async fn client_count(&self) -> usize {
        self.clients.client_count().await
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for ChatServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

/// Accept clients until shutdown, then wait for every connection to finish.
async fn accept_loop(listener: UnixListener, context: ConnectionContext, mut shutdown: watch::Receiver<bool>) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let context = context.clone();
                    let shutdown = shutdown.clone();
                    connections.spawn(async move {
                        if let Err(e) = serve_connection(stream, context, shutdown).await {
                            tracing::warn!("Connection ended with error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept client: {}", e);
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!("Connection task failed: {}", e);
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    drop(listener);
    tracing::info!("Client acceptance task stopped, closing {} connections", connections.len());
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            tracing::warn!("Connection task failed: {}", e);
        }
    }
}

/// Run one client connection from handshake to teardown.
///
/// `on_disconnect` fires exactly once for every connection that got past the
/// handshake, whether the peer closed, the read failed or the server stopped.
async fn serve_connection(
    stream: UnixStream,
    context: ConnectionContext,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half, context.max_frame_len);
    let connection = ConnectionId::generate();
    let mut client = Client::new(connection.clone(), write_half);

    let first = tokio::select! {
        frame = reader.next_frame() => frame?,
        _ = shutdown.changed() => return Ok(()),
    };

    let rejection = match first {
        Frame::Eof => return Ok(()),
        Frame::Line(line) => match InboundFrame::parse(&line) {
            Ok(InboundFrame::Connect { namespace: requested }) if *requested == *context.namespace => None,
            Ok(InboundFrame::Connect { namespace: requested }) => {
                Some(format!("unknown namespace: {}", requested))
            }
            Ok(_) => Some("expected connect frame".to_string()),
            Err(e) => Some(format!("invalid handshake: {}", e)),
        },
        Frame::NotUtf8 => Some("invalid handshake: not UTF-8".to_string()),
        Frame::Oversized => Some(format!(
            "invalid handshake: frame exceeds {} bytes",
            context.max_frame_len
        )),
    };

    if let Some(reason) = rejection {
        client.send_event(&OutboundEvent::Error(reason.clone())).await?;
        client.shutdown().await;
        return Err(BroadcasterError::Handshake(reason));
    }

    let clients = &context.clients;
    let handler = &context.handler;

    let queue = clients.add_client(connection.clone()).await;
    let writer = tokio::spawn(client.run(queue));

    handler.on_connect(&connection).await;

    loop {
        let frame = tokio::select! {
            frame = reader.next_frame() => frame,
            _ = shutdown.changed() => {
                tracing::debug!("Closing {} for server shutdown", connection);
                break;
            }
        };

        match frame {
            Ok(Frame::Line(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match InboundFrame::parse(&line) {
                    Ok(InboundFrame::Message { text }) => handler.on_message(&connection, text).await,
                    Ok(InboundFrame::Connect { .. }) => {
                        tracing::debug!("Ignoring repeated connect from {}", connection)
                    }
                    Err(e) => tracing::warn!("Skipping malformed frame from {}: {}", connection, e),
                }
            }
            Ok(Frame::NotUtf8) => {
                tracing::warn!("Skipping non-UTF-8 frame from {}", connection);
            }
            Ok(Frame::Oversized) => {
                tracing::warn!(
                    "Skipping frame over {} bytes from {}",
                    context.max_frame_len,
                    connection
                );
            }
            Ok(Frame::Eof) => break,
            Err(e) => {
                tracing::warn!("Read from {} failed: {}", connection, e);
                break;
            }
        }
    }

    // The departing client is already off the delivery list when its leave
    // announcement goes out.
    clients.remove_client(&connection).await;
    handler.on_disconnect(&connection).await;

    // A peer that stopped reading must not hold up shutdown
    if *shutdown.borrow() {
        writer.abort();
    }
    let _ = writer.await;
    Ok(())
}
