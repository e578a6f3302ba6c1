//! Cross-platform path utilities for the chatroom daemon.
//!
//! Single source of truth for where the daemon keeps its configuration and
//! where it binds its sockets.
//!
//! # Platform Behavior
//!
//! | Platform | Config Directory | Socket Directory |
//! |----------|------------------|------------------|
//! | Linux    | `~/.config/chatroom` | `$XDG_RUNTIME_DIR` or data dir |
//! | macOS    | `~/Library/Application Support/chatroom` | Same as data dir |
//! | Other    | data dir | data dir |
//!
//! The `get_*` functions only resolve paths. Call [`ensure_parent_dir`]
//! before binding a socket or writing a file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

/// Errors specific to path operations.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not determine data directory")]
    NoDataDirectory,

    #[error("Could not determine config directory")]
    NoConfigDirectory,
}

/// Application identifier used in path construction.
const APP_NAME: &str = "chatroom";

/// Socket file name for chat clients.
const CHAT_SOCKET_NAME: &str = "chatroom.sock";

/// Socket file name for the recent-history / status query socket.
const CONTROL_SOCKET_NAME: &str = "chatroom_control.sock";

/// Configuration file name inside the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Create `dir` (and parents) with owner-only permissions if it is missing.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o700);
        fs::set_permissions(dir, perms)
            .with_context(|| format!("Failed to set permissions on {}", dir.display()))?;
    }

    Ok(())
}

/// Create the parent directory of `path` (0o700) if it is missing.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_private_dir(parent),
        _ => Ok(()),
    }
}

/// Get the application data directory.
///
/// # Errors
/// Returns an error if the platform has no data directory.
pub fn get_data_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().ok_or(PathError::NoDataDirectory)?;
    Ok(base_dir.join(APP_NAME))
}

/// Get the socket directory.
///
/// On Linux this prefers `$XDG_RUNTIME_DIR` (e.g. `/run/user/1000`) and
/// falls back to the data directory everywhere else.
pub fn get_socket_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Some(runtime_dir) = dirs::runtime_dir() {
            if runtime_dir.exists() {
                return Ok(runtime_dir);
            }
        }
    }

    get_data_dir()
}

/// Get the configuration directory.
///
/// # Platform Behavior
/// - **Linux**: `~/.config/chatroom`
/// - **Other**: config lives with data
pub fn get_config_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let config_base = dirs::config_dir().ok_or(PathError::NoConfigDirectory)?;
        Ok(config_base.join(APP_NAME))
    }

    #[cfg(not(target_os = "linux"))]
    {
        get_data_dir()
    }
}

/// Get the default path of the configuration file.
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Get the path of the socket chat clients connect to.
pub fn get_chat_socket_path() -> Result<PathBuf> {
    Ok(get_socket_dir()?.join(CHAT_SOCKET_NAME))
}

/// Get the path of the query socket (`recent`, `status`).
pub fn get_control_socket_path() -> Result<PathBuf> {
    Ok(get_socket_dir()?.join(CONTROL_SOCKET_NAME))
}

/// Set secure Unix socket permissions (0o600, owner read/write only).
///
/// No-op on non-Unix platforms.
#[cfg(unix)]
pub fn secure_socket_permissions(socket_path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if socket_path.exists() {
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(socket_path, perms).with_context(|| {
            format!("Failed to set socket permissions: {}", socket_path.display())
        })?;
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn secure_socket_permissions(_socket_path: &Path) -> Result<()> {
    Ok(())
}
