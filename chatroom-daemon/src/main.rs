//! Chatroom Daemon - single-room broadcast chat over a Unix socket
//!
//! Serves chat clients on the chat socket and answers `recent` / `status`
//! queries on the control socket.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use chatroom_broadcaster::ChatServer;
use chatroom_daemon::{query, ControlServer, DaemonConfig};

#[derive(Parser, Debug)]
#[command(name = "chatroom-daemon", version, about = "Single-room broadcast chat daemon")]
struct Cli {
    /// Configuration file (default: <config dir>/chatroom/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chat socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Control socket path
    #[arg(long)]
    control_socket: Option<PathBuf>,

    /// Records replayed to new joiners
    #[arg(long)]
    history_capacity: Option<usize>,

    /// Namespace clients must connect to
    #[arg(long)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon (default)
    Serve,
    /// Print recent messages of a running daemon as JSON
    Recent,
    /// Print status of a running daemon as JSON
    Status,
}

impl Cli {
    /// Resolve the configuration; only `serve` writes a default file
    fn into_config(self) -> Result<(DaemonConfig, Command)> {
        let command = self.command.unwrap_or(Command::Serve);
        let writes_defaults = matches!(command, Command::Serve);

        let mut config = match (&self.config, writes_defaults) {
            (Some(path), true) => DaemonConfig::load_from(path),
            (None, true) => DaemonConfig::load(),
            (Some(path), false) => DaemonConfig::read_from(path),
            (None, false) => DaemonConfig::read(),
        }
        .context("Failed to load configuration")?;

        if let Some(socket) = self.socket {
            config.socket_path = socket;
        }
        if let Some(control_socket) = self.control_socket {
            config.control_socket_path = control_socket;
        }
        if let Some(capacity) = self.history_capacity {
            config.history_capacity = capacity;
        }
        if let Some(namespace) = self.namespace {
            config.namespace = namespace;
        }

        Ok((config, command))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Cli::parse().into_config()?;

    match command {
        Command::Serve => serve(config).await,
        Command::Recent => print_query(&config, "recent").await,
        Command::Status => print_query(&config, "status").await,
    }
}

async fn print_query(config: &DaemonConfig, command: &str) -> Result<()> {
    let reply = query(&config.control_socket_path, command).await?;
    println!("{}", reply);
    Ok(())
}

async fn serve(config: DaemonConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    info!("Starting chatroom daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config.config_path.display());

    chatroom_paths::ensure_parent_dir(&config.socket_path)
        .context("Failed to create socket directory")?;
    let server = Arc::new(ChatServer::new(&config.socket_path, config.server_config()));
    server.start().await.context("Failed to start chat server")?;

    let control = ControlServer::bind(&config.control_socket_path, Arc::clone(&server))
        .context("Failed to start control server")?;

    info!("Chatroom daemon ready");
    info!("  - chat socket: {}", config.socket_path.display());
    info!("  - control socket: {}", config.control_socket_path.display());

    tokio::select! {
        _ = control.run() => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        },
    }

    info!("Shutting down...");
    server.stop().await.context("Failed to stop chat server")?;
    info!("Chatroom daemon stopped");

    Ok(())
}
