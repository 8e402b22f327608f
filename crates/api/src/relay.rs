//! Message relay
//!
//! Accepts an inbound chat message, delegates persistence to the store,
//! and fans the persisted message out through the room router. Emission
//! strictly follows persistence, so a recipient can never observe a
//! message that did not durably save. Duplicate submissions create
//! duplicate messages; retry decisions belong to the caller.

use std::sync::Arc;

use helplink_shared::{ChatStore, Identity, Message, Role, ServerEvent, StoreError, UserId};

use crate::websocket::{room::RoomId, WebSocketState};

/// Routes chat messages between users and the admin pool.
#[derive(Clone)]
pub struct MessageRelay {
    store: Arc<dyn ChatStore>,
    ws: WebSocketState,
}

impl MessageRelay {
    pub fn new(store: Arc<dyn ChatStore>, ws: WebSocketState) -> Self {
        Self { store, ws }
    }

    /// Persist and deliver one chat message.
    ///
    /// A user sender always addresses their assigned admin (`target` is
    /// ignored); an admin sender must name the target user. Conversation
    /// creation is lazy: a user's first message picks any available
    /// admin, an admin's first message assigns the sender.
    pub async fn send(
        &self,
        sender: &Identity,
        target: Option<UserId>,
        text: &str,
    ) -> Result<Message, RelayError> {
        let (conversation_user, admin_hint) = match sender.role {
            Role::User => (sender.id, None),
            Role::Admin => (target.ok_or(RelayError::MissingTarget)?, Some(sender.id)),
        };

        let conversation = self
            .store
            .find_or_create_conversation(conversation_user, admin_hint)
            .await?;

        let message = self
            .store
            .append_message(conversation.id, sender.id, sender.role, text)
            .await?;

        // Emit after persist; fan-out depends on who is speaking
        let event = ServerEvent::MessageNew {
            message: message.clone(),
        };
        match sender.role {
            // Any connected admin instance observes user traffic
            Role::User => self.ws.rooms.emit(RoomId::Admins, event).await,
            Role::Admin => {
                self.ws
                    .rooms
                    .emit(RoomId::User(conversation_user), event)
                    .await
            }
        }

        tracing::debug!(
            message_id = %message.id,
            conversation_id = %conversation.id,
            sender_id = %sender.id,
            sender_role = ?sender.role,
            "Message relayed"
        );

        Ok(message)
    }

    /// Conversation history for a user, oldest first. Empty when no
    /// conversation exists yet.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<Message>, RelayError> {
        match self.store.conversation_for_user(user_id).await? {
            Some(conversation) => Ok(self.store.list_messages(conversation.id).await?),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Admin messages require a target user")]
    MissingTarget,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RelayError> for crate::error::ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::MissingTarget => {
                crate::error::ApiError::BadRequest("target user required".to_string())
            }
            RelayError::Store(e) => e.into(),
        }
    }
}
