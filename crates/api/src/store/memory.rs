//! In-memory chat store
//!
//! Implements the full [`ChatStore`] contract against process memory.
//! Used by the test suite as the persistence collaborator; also handy
//! for local development without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use time::OffsetDateTime;

use helplink_shared::{
    ChatStore, Conversation, ConversationId, Message, MessageId, Role, StoreError, UserId,
    UserProfile,
};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, UserProfile>,
    conversations: HashMap<ConversationId, Conversation>,
    conversation_by_user: HashMap<UserId, ConversationId>,
    messages: Vec<Message>,
}

/// In-memory [`ChatStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user record and return its profile.
    pub fn add_user(&self, username: &str, role: Role) -> UserProfile {
        let user = UserProfile {
            id: UserId::new(),
            username: username.to_string(),
            role,
            active: true,
            last_seen: None,
        };
        self.lock().users.insert(user.id, user.clone());
        user
    }

    /// Enable or disable a user account.
    pub fn set_active(&self, id: UserId, active: bool) {
        if let Some(user) = self.lock().users.get_mut(&id) {
            user.active = active;
        }
    }

    /// Make every subsequent write fail, to exercise persistence-failure
    /// paths in tests.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn message_count(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn conversation_count(&self) -> usize {
        self.lock().conversations.len()
    }

    pub fn last_seen(&self, id: UserId) -> Option<OffsetDateTime> {
        self.lock().users.get(&id).and_then(|u| u.last_seen)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("write failure injected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn user_by_id(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_or_create_conversation(
        &self,
        user_id: UserId,
        admin_hint: Option<UserId>,
    ) -> Result<Conversation, StoreError> {
        let mut inner = self.lock();

        if let Some(id) = inner.conversation_by_user.get(&user_id) {
            if let Some(existing) = inner.conversations.get(id) {
                return Ok(existing.clone());
            }
        }

        self.check_writes()?;

        let admin_id = match admin_hint {
            Some(id) => id,
            None => inner
                .users
                .values()
                .find(|u| u.role == Role::Admin && u.active)
                .map(|u| u.id)
                .ok_or(StoreError::NoAdminAvailable)?,
        };

        let conversation = Conversation {
            id: ConversationId::new(),
            user_id,
            admin_id,
            last_message_at: OffsetDateTime::now_utc(),
        };
        inner.conversation_by_user.insert(user_id, conversation.id);
        inner
            .conversations
            .insert(conversation.id, conversation.clone());

        Ok(conversation)
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        sender_role: Role,
        text: &str,
    ) -> Result<Message, StoreError> {
        self.check_writes()?;

        let mut inner = self.lock();
        let now = OffsetDateTime::now_utc();

        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StoreError::NotFound("conversation"))?;
        conversation.last_message_at = now;

        let message = Message {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            sender_role,
            text: text.to_string(),
            created_at: now,
        };
        inner.messages.push(message.clone());

        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.lock();
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn conversation_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Conversation>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .conversation_by_user
            .get(&user_id)
            .and_then(|id| inner.conversations.get(id))
            .cloned())
    }

    async fn persist_last_seen(
        &self,
        user_id: UserId,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        self.check_writes()?;

        let mut inner = self.lock();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound("user"))?;
        user.last_seen = Some(at);
        Ok(())
    }
}
