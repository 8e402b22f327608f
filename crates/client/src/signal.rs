//! Signaling seam
//!
//! The state machine speaks to the server by emitting [`ClientEvent`]s
//! through this sink. An implementation typically queues the event onto
//! a websocket writer, so sending is synchronous and cheap.

use helplink_shared::events::ClientEvent;

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Signaling channel closed")]
    Closed,
    #[error("Transport error: {0}")]
    Transport(String),
}

pub trait SignalSink: Send + Sync {
    fn send(&self, event: ClientEvent) -> Result<(), SignalError>;
}
