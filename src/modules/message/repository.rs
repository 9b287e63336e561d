use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{api::error, constants::MAX_CONFLICT_RETRIES, modules::message::schema::MessageEntity};

pub type MessageMutation<'a> =
    dyn FnMut(&mut MessageEntity) -> Result<(), error::SystemError> + Send + 'a;

#[async_trait::async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: &MessageEntity) -> Result<MessageEntity, error::SystemError>;

    async fn find_by_id(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    /// Tất cả messages của conversation, cũ nhất trước
    async fn find_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<MessageEntity>, error::SystemError>;

    /// Messages không do `viewer_id` gửi, tạo từ `since` trở đi (nếu có)
    async fn find_unread_candidates(
        &self,
        conversation_id: &Uuid,
        viewer_id: &Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<MessageEntity>, error::SystemError>;

    async fn find_latest(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    /// Replace nếu `version` khớp, ngược lại `ConcurrencyConflict`
    async fn replace(&self, message: &MessageEntity) -> Result<MessageEntity, error::SystemError>;

    async fn delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError>;

    async fn modify(
        &self,
        message_id: &Uuid,
        mutate: &mut MessageMutation<'_>,
    ) -> Result<MessageEntity, error::SystemError> {
        let mut attempt = 0;
        loop {
            let mut message = self
                .find_by_id(message_id)
                .await?
                .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

            mutate(&mut message)?;

            match self.replace(&message).await {
                Err(error::SystemError::ConcurrencyConflict(_))
                    if attempt < MAX_CONFLICT_RETRIES =>
                {
                    attempt += 1;
                    tracing::debug!("Message {} modified concurrently, retry {}", message_id, attempt);
                }
                other => return other,
            }
        }
    }
}
