//! Unix socket query server for recent history and status

use anyhow::{Context, Result};
use chatroom_broadcaster::ChatServer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Control command
#[derive(Debug, PartialEq, Eq)]
enum ControlCommand {
    Recent,
    Status,
}

impl ControlCommand {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "recent" => Ok(Self::Recent),
            "status" => Ok(Self::Status),
            _ => anyhow::bail!("Unknown command: {}", s.trim()),
        }
    }
}

/// Answer one command against the running chat server.
pub async fn respond(request: &str, server: &ChatServer) -> String {
    match ControlCommand::parse(request) {
        Ok(ControlCommand::Recent) => {
            let recent = server.room().recent_messages();
            serde_json::to_string(&recent).unwrap_or_else(|e| format!("Error: {}", e))
        }
        Ok(ControlCommand::Status) => {
            let room = server.room();
            serde_json::json!({
                "clients": server.client_count().await,
                "sessions": room.session_count(),
                "history": room.history_len(),
                "capacity": room.config().history_capacity,
                "namespace": room.config().namespace,
            })
            .to_string()
        }
        Err(e) => format!("Error: {}", e),
    }
}

/// Query socket server, one request per connection
pub struct ControlServer {
    socket_path: PathBuf,
    listener: UnixListener,
    server: Arc<ChatServer>,
}

impl ControlServer {
    /// Bind the control socket, replacing any stale file
    pub fn bind(socket_path: impl AsRef<Path>, server: Arc<ChatServer>) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();
        chatroom_paths::ensure_parent_dir(&socket_path)?;
        let _ = std::fs::remove_file(&socket_path);

        let listener = UnixListener::bind(&socket_path)
            .context("Failed to bind control socket")?;
        chatroom_paths::secure_socket_permissions(&socket_path)?;

        info!("Control server listening on {}", socket_path.display());

        Ok(Self {
            socket_path,
            listener,
            server,
        })
    }

    /// Accept and answer requests until the task is cancelled
    ///
    /// A failed accept is logged and the loop keeps going.
    pub async fn run(&self) {
        loop {
            let stream = match self.listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!("Failed to accept control connection: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };
            let server = Arc::clone(&self.server);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, server).await {
                    warn!("Control request failed: {}", e);
                }
            });
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Handle a single control connection
pub async fn handle_connection(mut stream: UnixStream, server: Arc<ChatServer>) -> Result<()> {
    let mut buffer = [0u8; 1024];
    let n = stream.read(&mut buffer).await?;

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..n]);
    debug!("Received control command: {}", request.trim());

    let response = respond(&request, &server).await;

    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await?;

    Ok(())
}

/// Send `command` to a running daemon and return its reply
pub async fn query(socket_path: impl AsRef<Path>, command: &str) -> Result<String> {
    let socket_path = socket_path.as_ref();
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("Failed to connect to {}", socket_path.display()))?;

    stream.write_all(command.as_bytes()).await?;
    stream.shutdown().await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}
