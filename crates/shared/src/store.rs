//! Persistence contract consumed by the relay core
//!
//! The relay never owns chat history or user records; it talks to an
//! external store through this trait. The server crate ships a Postgres
//! implementation and an in-memory one for tests.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::types::{Conversation, ConversationId, Message, Role, UserId, UserProfile};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Conversation creation requires an assignable admin and none exists
    #[error("No admin available to receive messages")]
    NoAdminAvailable,

    #[error("Not found: {0}")]
    NotFound(&'static str),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row"),
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// External user/conversation/message store.
///
/// Messages are append-only: nothing in this contract edits or deletes
/// one. `persist_last_seen` is the durability point written on
/// disconnect; callers treat its failure as non-fatal.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Look up a user record by id. `None` for unknown subjects.
    async fn user_by_id(&self, id: UserId) -> Result<Option<UserProfile>, StoreError>;

    /// Resolve the conversation for `user_id`, creating it on first use.
    ///
    /// Creation assigns an admin: `admin_hint` when given (an admin
    /// starting the conversation assigns themselves), otherwise any
    /// available admin. Fails with [`StoreError::NoAdminAvailable`] when
    /// creation is needed and no admin exists.
    async fn find_or_create_conversation(
        &self,
        user_id: UserId,
        admin_hint: Option<UserId>,
    ) -> Result<Conversation, StoreError>;

    /// Append a message and stamp the conversation's `last_message_at`.
    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        sender_role: Role,
        text: &str,
    ) -> Result<Message, StoreError>;

    /// Messages of a conversation ordered by creation time.
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, StoreError>;

    /// Conversation for a user, if one exists yet.
    async fn conversation_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Best-effort durability point written when a connection closes.
    async fn persist_last_seen(
        &self,
        user_id: UserId,
        at: OffsetDateTime,
    ) -> Result<(), StoreError>;
}
