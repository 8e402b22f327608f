//! Global WebSocket state
//!
//! Bundles the presence registry and room manager shared across all
//! connection tasks. These two structures are the only shared mutable
//! state in the relay; everything else is owned by a single connection's
//! task.

use std::sync::Arc;

use helplink_shared::{ChatStore, ServerEvent, UserProfile, UserUpdateKind};

use super::presence::PresenceRegistry;
use super::room::{RoomId, RoomManager};

/// Shared real-time state
#[derive(Clone)]
pub struct WebSocketState {
    pub presence: Arc<PresenceRegistry>,
    pub rooms: Arc<RoomManager>,
}

impl WebSocketState {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        let rooms = Arc::new(RoomManager::new());
        let presence = Arc::new(PresenceRegistry::new(Arc::clone(&rooms), store));
        Self { presence, rooms }
    }

    /// Admin management side channel: tell connected operators a user
    /// record was created or updated. Called by the (external) admin CRUD
    /// layer; not part of the call/message core.
    pub async fn notify_user_updated(&self, kind: UserUpdateKind, user: UserProfile) {
        self.rooms
            .emit(RoomId::Admins, ServerEvent::UserUpdated { kind, user })
            .await;
    }
}
