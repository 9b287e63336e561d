use serde::Serialize;
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Một row cho mỗi (message, user, icon)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionEntity {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub icon: String,
    pub count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub modified_at: chrono::DateTime<chrono::Utc>,
}
