use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    api::error, constants::MAX_CONFLICT_RETRIES, modules::conversation::schema::ConversationEntity,
};

pub type ConversationMutation<'a> =
    dyn FnMut(&mut ConversationEntity) -> Result<(), error::SystemError> + Send + 'a;

#[async_trait::async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError>;

    async fn find_by_participant(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationEntity>, error::SystemError>;

    /// Lookup-or-create nguyên tử theo `participants_hash` của DIRECT conversation.
    /// Trả về conversation đang lưu và `true` nếu vừa được tạo.
    async fn find_or_create_direct(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<(ConversationEntity, bool), error::SystemError>;

    async fn insert(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<ConversationEntity, error::SystemError>;

    /// Replace toàn bộ document nếu `version` khớp, ngược lại `ConcurrencyConflict`
    async fn replace(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<ConversationEntity, error::SystemError>;

    async fn record_members_added(
        &self,
        conversation_id: &Uuid,
        user_ids: &[Uuid],
        added_at: DateTime<Utc>,
    ) -> Result<(), error::SystemError>;

    async fn last_added_at(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<DateTime<Utc>>, error::SystemError>;

    /// Read-modify-replace với retry khi version cũ. `mutate` có thể chạy nhiều lần,
    /// mỗi lần trên bản mới nhất.
    async fn modify(
        &self,
        conversation_id: &Uuid,
        mutate: &mut ConversationMutation<'_>,
    ) -> Result<ConversationEntity, error::SystemError> {
        let mut attempt = 0;
        loop {
            let mut conversation = self
                .find_by_id(conversation_id)
                .await?
                .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

            mutate(&mut conversation)?;

            match self.replace(&conversation).await {
                Err(error::SystemError::ConcurrencyConflict(_))
                    if attempt < MAX_CONFLICT_RETRIES =>
                {
                    attempt += 1;
                    tracing::debug!(
                        "Conversation {} modified concurrently, retry {}",
                        conversation_id,
                        attempt
                    );
                }
                other => return other,
            }
        }
    }
}
