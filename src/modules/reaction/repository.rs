use uuid::Uuid;

use crate::{api::error, modules::reaction::schema::ReactionEntity};

#[async_trait::async_trait]
pub trait ReactionRepository: Send + Sync {
    async fn find(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<Option<ReactionEntity>, error::SystemError>;

    /// Insert nếu chưa tồn tại, `count` = số user distinct đã dùng icon này + 1,
    /// tính trong cùng một thao tác nguyên tử. `None` nếu row đã có.
    async fn insert_if_absent(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<Option<ReactionEntity>, error::SystemError>;

    async fn count_users(&self, message_id: &Uuid, icon: &str) -> Result<i64, error::SystemError>;

    async fn delete(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<bool, error::SystemError>;

    /// Cũ nhất trước
    async fn find_by_message(
        &self,
        message_id: &Uuid,
    ) -> Result<Vec<ReactionEntity>, error::SystemError>;
}
