use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    api::error,
    modules::conversation::{repository::ConversationRepository, schema::ConversationEntity},
};

#[derive(Clone)]
pub struct ConversationPgRepository {
    pool: sqlx::PgPool,
}

impl ConversationPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn insert_with<'e, E>(
        &self,
        conversation: &ConversationEntity,
        on_conflict: &str,
        tx: E,
    ) -> Result<Option<ConversationEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO conversations (
                id, type, participants_hash, participants, participant_ids,
                group_name, group_avatar, created_by, last_message,
                created_at, modified_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0)
            {on_conflict}
            RETURNING *
            "#
        );

        let conversation = sqlx::query_as::<_, ConversationEntity>(&sql)
            .bind(conversation.id)
            .bind(conversation._type)
            .bind(&conversation.participants_hash)
            .bind(Json(&conversation.participants))
            .bind(conversation.participant_ids())
            .bind(&conversation.group_name)
            .bind(&conversation.group_avatar)
            .bind(conversation.created_by)
            .bind(Json(&conversation.last_message))
            .bind(conversation.created_at)
            .bind(conversation.modified_at)
            .fetch_optional(tx)
            .await?;

        Ok(conversation)
    }
}

#[async_trait::async_trait]
impl ConversationRepository for ConversationPgRepository {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        let conversation =
            sqlx::query_as::<_, ConversationEntity>("SELECT * FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(conversation)
    }

    async fn find_by_participant(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationEntity>, error::SystemError> {
        // GIN index trên participant_ids
        let conversations = sqlx::query_as::<_, ConversationEntity>(
            "SELECT * FROM conversations WHERE participant_ids @> ARRAY[$1]::uuid[] ORDER BY modified_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }

    async fn find_or_create_direct(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<(ConversationEntity, bool), error::SystemError> {
        let inserted = self
            .insert_with(
                conversation,
                "ON CONFLICT (participants_hash) WHERE type = 'DIRECT' DO NOTHING",
                &self.pool,
            )
            .await?;

        if let Some(created) = inserted {
            return Ok((created, true));
        }

        let existing = sqlx::query_as::<_, ConversationEntity>(
            "SELECT * FROM conversations WHERE participants_hash = $1 AND type = 'DIRECT'",
        )
        .bind(&conversation.participants_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok((existing, false))
    }

    async fn insert(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<ConversationEntity, error::SystemError> {
        self.insert_with(conversation, "", &self.pool)
            .await?
            .ok_or_else(|| error::SystemError::DatabaseError("Insert returned no row".into()))
    }

    async fn replace(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<ConversationEntity, error::SystemError> {
        let updated = sqlx::query_as::<_, ConversationEntity>(
            r#"
            UPDATE conversations
            SET participants_hash = $2,
                participants = $3,
                participant_ids = $4,
                group_name = $5,
                group_avatar = $6,
                last_message = $7,
                modified_at = $8,
                version = version + 1
            WHERE id = $1 AND version = $9
            RETURNING *
            "#,
        )
        .bind(conversation.id)
        .bind(&conversation.participants_hash)
        .bind(Json(&conversation.participants))
        .bind(conversation.participant_ids())
        .bind(&conversation.group_name)
        .bind(&conversation.group_avatar)
        .bind(Json(&conversation.last_message))
        .bind(conversation.modified_at)
        .bind(conversation.version)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(conversation) => Ok(conversation),
            None => match self.find_by_id(&conversation.id).await? {
                Some(_) => Err(error::SystemError::concurrency_conflict(format!(
                    "conversation {} version {}",
                    conversation.id, conversation.version
                ))),
                None => Err(error::SystemError::not_found("Conversation not found")),
            },
        }
    }

    async fn record_members_added(
        &self,
        conversation_id: &Uuid,
        user_ids: &[Uuid],
        added_at: DateTime<Utc>,
    ) -> Result<(), error::SystemError> {
        sqlx::query(
            r#"
            INSERT INTO membership_events (conversation_id, user_id, last_added_at)
            SELECT $1, member_id, $3 FROM UNNEST($2::uuid[]) AS member_id
            ON CONFLICT (conversation_id, user_id)
            DO UPDATE SET last_added_at = GREATEST(membership_events.last_added_at, EXCLUDED.last_added_at)
            "#,
        )
        .bind(conversation_id)
        .bind(user_ids)
        .bind(added_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn last_added_at(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<DateTime<Utc>>, error::SystemError> {
        let added_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT last_added_at FROM membership_events WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(added_at)
    }
}
