//! Room-addressed event fan-out
//!
//! Manages named delivery groups: one per-identity room per connected
//! participant, plus the fixed `admins` room holding every connected
//! operator. Pure addressing layer with no persistence and best-effort
//! delivery; emitting to a room nobody is in is a silent no-op.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use helplink_shared::{ServerEvent, SessionId, UserId};

use super::connection::Connection;

/// Room address. Closed set: a specific identity's room or the admin pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomId {
    /// Exactly one identity's connections (user or a single admin instance)
    User(UserId),
    /// All currently connected admins
    Admins,
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomId::User(id) => write!(f, "user:{id}"),
            RoomId::Admins => write!(f, "admins"),
        }
    }
}

/// Manages rooms and broadcasts events to their members
pub struct RoomManager {
    /// Map of room -> member connections
    rooms: RwLock<HashMap<RoomId, Vec<Arc<Connection>>>>,
}

impl RoomManager {
    /// Create a new room manager
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to a room
    pub async fn join(&self, room: RoomId, conn: Arc<Connection>) {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(room).or_default();
        if members.iter().any(|c| c.session_id == conn.session_id) {
            return; // idempotent per session
        }
        members.push(Arc::clone(&conn));

        tracing::debug!(
            room = %room,
            session_id = %conn.session_id,
            room_size = members.len(),
            "Connection joined room"
        );
    }

    /// Remove a connection from a room
    pub async fn leave(&self, room: RoomId, session_id: SessionId) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(&room) {
            members.retain(|c| c.session_id != session_id);

            // Clean up empty rooms
            if members.is_empty() {
                rooms.remove(&room);
                tracing::debug!(room = %room, "Removed empty room");
            } else {
                tracing::debug!(
                    room = %room,
                    session_id = %session_id,
                    room_size = members.len(),
                    "Connection left room"
                );
            }
        }
    }

    /// Emit an event to every member of a room
    ///
    /// Delivery order across members is unspecified; per member it is
    /// FIFO. A room with zero members is a silent no-op, never an error.
    pub async fn emit(&self, room: RoomId, event: ServerEvent) {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(&room) else {
            tracing::debug!(room = %room, "Emit to empty room, dropping event");
            return;
        };

        let mut failed = 0usize;
        for conn in members {
            if conn.send(event.clone()).is_err() {
                failed += 1;
            }
        }

        tracing::debug!(
            room = %room,
            recipients = members.len() - failed,
            failed,
            "Emitted event to room"
        );
    }

    /// Emit an event to every connection in every room, once per connection
    ///
    /// Used for the aggregate admin availability broadcasts, which go to
    /// every connected identity.
    pub async fn broadcast_all(&self, event: ServerEvent) {
        let rooms = self.rooms.read().await;
        let mut seen = std::collections::HashSet::new();
        for members in rooms.values() {
            for conn in members {
                if seen.insert(conn.session_id) {
                    let _ = conn.send(event.clone());
                }
            }
        }
    }

    /// Remove a connection from every room it is in
    pub async fn remove_connection(&self, session_id: SessionId) {
        let mut rooms = self.rooms.write().await;
        for members in rooms.values_mut() {
            members.retain(|c| c.session_id != session_id);
        }

        // Clean up empty rooms
        rooms.retain(|_, members| !members.is_empty());
    }

    /// Number of members currently in a room
    pub async fn room_size(&self, room: RoomId) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(&room).map(|m| m.len()).unwrap_or(0)
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
