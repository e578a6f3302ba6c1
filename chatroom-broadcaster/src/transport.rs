//! Seams between the room and whatever carries bytes to clients.

use async_trait::async_trait;

use crate::events::OutboundEvent;
use crate::registry::ConnectionId;

/// Outbound delivery. Failures stay inside the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `event` to exactly one connection.
    async fn send_to(&self, connection: &ConnectionId, event: &OutboundEvent);

    /// Deliver `event` to every currently connected connection.
    async fn broadcast(&self, event: &OutboundEvent);
}

/// Inbound connection lifecycle, called once per event in per-connection order.
#[async_trait]
pub trait RoomHandler: Send + Sync {
    async fn on_connect(&self, connection: &ConnectionId);

    /// Must be called exactly once per connection, also after abrupt teardown.
    async fn on_disconnect(&self, connection: &ConnectionId);

    async fn on_message(&self, connection: &ConnectionId, text: String);
}
