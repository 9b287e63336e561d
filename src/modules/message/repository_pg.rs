use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    api::error,
    modules::message::{repository::MessageRepository, schema::MessageEntity},
};

#[derive(Clone)]
pub struct MessageRepositoryPg {
    pool: sqlx::PgPool,
}

impl MessageRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for MessageRepositoryPg {
    async fn insert(&self, message: &MessageEntity) -> Result<MessageEntity, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            INSERT INTO messages (
                id, conversation_id, sender_id, sender, type, body, status, readers,
                reply_to_message_id, recall, media, pinned, pinned_by, pinned_at,
                edited_at, created_at, modified_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, 0)
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id())
        .bind(Json(&message.sender))
        .bind(message._type)
        .bind(&message.body)
        .bind(message.status)
        .bind(Json(&message.readers))
        .bind(message.reply_to_message_id)
        .bind(Json(&message.recall))
        .bind(Json(&message.media))
        .bind(message.pinned)
        .bind(message.pinned_by)
        .bind(message.pinned_at)
        .bind(message.edited_at)
        .bind(message.created_at)
        .bind(message.modified_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn find_by_id(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>("SELECT * FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(message)
    }

    async fn find_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        let messages = sqlx::query_as::<_, MessageEntity>(
            "SELECT * FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn find_unread_candidates(
        &self,
        conversation_id: &Uuid,
        viewer_id: &Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        // has index on (conversation_id, created_at, id)
        let messages = sqlx::query_as::<_, MessageEntity>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
              AND (sender_id IS NULL OR sender_id <> $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(conversation_id)
        .bind(viewer_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn find_latest(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            "SELECT * FROM messages WHERE conversation_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn replace(&self, message: &MessageEntity) -> Result<MessageEntity, error::SystemError> {
        let updated = sqlx::query_as::<_, MessageEntity>(
            r#"
            UPDATE messages
            SET body = $2,
                status = $3,
                readers = $4,
                recall = $5,
                media = $6,
                pinned = $7,
                pinned_by = $8,
                pinned_at = $9,
                edited_at = $10,
                modified_at = $11,
                version = version + 1
            WHERE id = $1 AND version = $12
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(&message.body)
        .bind(message.status)
        .bind(Json(&message.readers))
        .bind(Json(&message.recall))
        .bind(Json(&message.media))
        .bind(message.pinned)
        .bind(message.pinned_by)
        .bind(message.pinned_at)
        .bind(message.edited_at)
        .bind(message.modified_at)
        .bind(message.version)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(message) => Ok(message),
            None => match self.find_by_id(&message.id).await? {
                Some(_) => Err(error::SystemError::concurrency_conflict(format!(
                    "message {} version {}",
                    message.id, message.version
                ))),
                None => Err(error::SystemError::not_found("Message not found")),
            },
        }
    }

    async fn delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
