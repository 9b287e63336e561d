use uuid::Uuid;

use crate::{
    api::error,
    modules::reaction::{repository::ReactionRepository, schema::ReactionEntity},
    utils,
};

#[derive(Clone)]
pub struct ReactionRepositoryPg {
    pool: sqlx::PgPool,
}

impl ReactionRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReactionRepository for ReactionRepositoryPg {
    async fn find(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<Option<ReactionEntity>, error::SystemError> {
        let reaction = sqlx::query_as::<_, ReactionEntity>(
            "SELECT * FROM reactions WHERE message_id = $1 AND user_id = $2 AND icon = $3",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(icon)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reaction)
    }

    async fn insert_if_absent(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<Option<ReactionEntity>, error::SystemError> {
        let reaction = sqlx::query_as::<_, ReactionEntity>(
            r#"
            INSERT INTO reactions (message_id, user_id, icon, count, created_at, modified_at)
            SELECT $1, $2, $3, COUNT(DISTINCT r.user_id) + 1, $4, $4
            FROM reactions r
            WHERE r.message_id = $1 AND r.icon = $3
            ON CONFLICT (message_id, user_id, icon) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .bind(icon)
        .bind(utils::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(reaction)
    }

    async fn count_users(&self, message_id: &Uuid, icon: &str) -> Result<i64, error::SystemError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT user_id) FROM reactions WHERE message_id = $1 AND icon = $2",
        )
        .bind(message_id)
        .bind(icon)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            "DELETE FROM reactions WHERE message_id = $1 AND user_id = $2 AND icon = $3",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(icon)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_message(
        &self,
        message_id: &Uuid,
    ) -> Result<Vec<ReactionEntity>, error::SystemError> {
        let reactions = sqlx::query_as::<_, ReactionEntity>(
            "SELECT * FROM reactions WHERE message_id = $1 ORDER BY created_at ASC",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reactions)
    }
}
