//! Real-time relay over WebSocket
//!
//! Presence-aware fan-out for the support chat:
//! - **Connection**: one authenticated live connection
//! - **Room**: named delivery groups (per-identity rooms + the admin pool)
//! - **Presence**: online/offline table with pooled admin availability
//! - **Signaling**: stateless forwarding of call-negotiation events
//! - **Handler**: Axum WebSocket route handler
//! - **State**: shared state across all connection tasks

pub mod connection;
pub mod handler;
pub mod presence;
pub mod room;
pub mod signaling;
pub mod state;

pub use handler::ws_handler;
pub use state::WebSocketState;
