//! Postgres-backed chat store

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use helplink_shared::{
    ChatStore, Conversation, ConversationId, Message, MessageId, Role, StoreError, UserId,
    UserProfile,
};

/// Production store backed by a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pick any active admin, used when a conversation is created without
    /// an explicit assignee.
    async fn find_available_admin(&self) -> Result<Option<UserId>, StoreError> {
        let admin = sqlx::query_scalar::<_, UserId>(
            "SELECT id FROM users WHERE role = 'ADMIN' AND active ORDER BY created_at LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(admin)
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn user_by_id(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let user = sqlx::query_as::<_, UserProfile>(
            "SELECT id, username, role, active, last_seen FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_or_create_conversation(
        &self,
        user_id: UserId,
        admin_hint: Option<UserId>,
    ) -> Result<Conversation, StoreError> {
        if let Some(existing) = self.conversation_for_user(user_id).await? {
            return Ok(existing);
        }

        let admin_id = match admin_hint {
            Some(id) => id,
            None => self
                .find_available_admin()
                .await?
                .ok_or(StoreError::NoAdminAvailable)?,
        };

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (id, user_id, admin_id, last_message_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, admin_id, last_message_at
            "#,
        )
        .bind(ConversationId::new())
        .bind(user_id)
        .bind(admin_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        sender_role: Role,
        text: &str,
    ) -> Result<Message, StoreError> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, sender_role, text, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, conversation_id, sender_id, sender_role, text, created_at
            "#,
        )
        .bind(MessageId::new())
        .bind(conversation_id)
        .bind(sender_id)
        .bind(sender_role)
        .bind(text)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET last_message_at = NOW() WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, sender_id, sender_role, text, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn conversation_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Conversation>, StoreError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT id, user_id, admin_id, last_message_at FROM conversations WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn persist_last_seen(
        &self,
        user_id: UserId,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_seen = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
