//! Chatroom daemon library
//!
//! Configuration loading and the control (query) socket, exposed for the
//! binary and for integration testing.

pub mod config;
pub mod control;

pub use config::DaemonConfig;
pub use control::{ControlServer, query};
