//! Configuration management

use anyhow::{Context, Result};
use chatroom_broadcaster::{
    RoomConfig, ServerConfig, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_FRAME_LEN, DEFAULT_MAX_SEND_QUEUE,
    DEFAULT_NAMESPACE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Unix socket chat clients connect to
    pub socket_path: PathBuf,

    /// Unix socket answering `recent` / `status` queries
    pub control_socket_path: PathBuf,

    /// Namespace clients must name in their connect frame
    pub namespace: String,

    /// Number of records replayed to new joiners
    pub history_capacity: usize,

    /// Outbound lines buffered per client before it is dropped
    pub max_send_queue: usize,

    /// Longest inbound line in bytes; longer lines are dropped
    pub max_frame_len: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            socket_path: chatroom_paths::get_chat_socket_path()
                .unwrap_or_else(|_| PathBuf::from("/tmp/chatroom.sock")),
            control_socket_path: chatroom_paths::get_control_socket_path()
                .unwrap_or_else(|_| PathBuf::from("/tmp/chatroom_control.sock")),
            namespace: DEFAULT_NAMESPACE.to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_send_queue: DEFAULT_MAX_SEND_QUEUE,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_config_path())
    }

    /// Load configuration from `config_path`, writing defaults there if missing
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let config = Self::read_from(config_path)?;

        if !config_path.exists() {
            config.save()
                .context("Failed to save default config")?;
        }
        Ok(config)
    }

    /// Read configuration from the default location without touching disk
    pub fn read() -> Result<Self> {
        Self::read_from(Self::default_config_path())
    }

    /// Read configuration from `config_path`; a missing file means defaults
    pub fn read_from(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref().to_path_buf();

        if !config_path.exists() {
            return Ok(Self {
                config_path,
                ..Self::default()
            });
        }

        let contents = std::fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let mut config: DaemonConfig = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        config.config_path = config_path;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        chatroom_paths::ensure_parent_dir(&self.config_path)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Settings handed to the chat server
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            room: RoomConfig {
                history_capacity: self.history_capacity,
                namespace: self.namespace.clone(),
            },
            max_send_queue: self.max_send_queue,
            max_frame_len: self.max_frame_len,
        }
    }

    fn default_config_path() -> PathBuf {
        chatroom_paths::get_config_path().unwrap_or_else(|_| PathBuf::from("chatroom.toml"))
    }
}
