//! Single-room broadcast chat for local clients
//!
//! Any connected participant's message is fanned out to every connected
//! participant, and a bounded recent-history buffer is replayed to each new
//! joiner.
//!
//! # Pieces
//!
//! - [`HistoryBuffer`] - fixed-capacity, oldest-first record buffer
//! - [`SessionRegistry`] - connection id to participant id, ids never reused
//! - [`BroadcastRoom`] - owns both behind one lock, implements [`RoomHandler`]
//! - [`Transport`] - outbound delivery; [`ClientManager`] is the socket one
//! - [`ChatServer`] - Unix domain socket, newline-delimited JSON
//!
//! # Protocol
//!
//! Client to server, one JSON object per line:
//!
//! - `{"type":"connect","namespace":"/ws/chat"}` - must come first
//! - `{"type":"message","text":"hello"}`
//!
//! Lines longer than [`ServerConfig::max_frame_len`] and lines that are not
//! UTF-8 are skipped; the connection stays up.
//!
//! Server to client:
//!
//! - `{"event":"messages","data":[["14:23:15","user0","hello"]]}`
//! - `{"event":"error","data":"unknown namespace: /other"}`
//!
//! # Example Usage
//!
//! ```no_run
//! use chatroom_broadcaster::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ChatServer::new("/tmp/chatroom.sock", ServerConfig::default());
//!     server.start().await?;
//!
//!     // Recent history, oldest first
//!     let recent = server.room().recent_messages();
//!     println!("{}", serde_json::to_string(&recent)?);
//!
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod events;
pub mod frame;
pub mod history;
pub mod registry;
pub mod room;
pub mod server;
pub mod transport;

// Re-exports
pub use client::{ClientManager, DEFAULT_MAX_SEND_QUEUE};
pub use error::{BroadcasterError, Result};
pub use events::{InboundFrame, MessageRecord, OutboundEvent, MESSAGES_EVENT};
pub use frame::{Frame, FrameReader, DEFAULT_MAX_FRAME_LEN};
pub use history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
pub use registry::{ConnectionId, ParticipantId, SessionRegistry};
pub use room::{BroadcastRoom, RoomConfig, DEFAULT_NAMESPACE, JOIN_TEXT, LEAVE_TEXT};
pub use server::{ChatServer, ServerConfig};
pub use transport::{RoomHandler, Transport};
