/// Presence Service
///
/// Trạng thái online/offline của users trong Redis:
///
/// - `presence:{user_id}` → "1" (TTL 60s), refresh theo heartbeat của session
/// - `last_seen:{user_id}` → RFC 3339 timestamp, ghi khi session cuối cùng đóng
use deadpool_redis::redis::{self, AsyncCommands};
use uuid::Uuid;

use crate::api::error;

/// Nếu server không nhận được disconnect, key tự expire sau TTL
const PRESENCE_TTL: u64 = 60;

const PRESENCE_PREFIX: &str = "presence:";
const LAST_SEEN_PREFIX: &str = "last_seen:";

#[derive(Clone)]
pub struct PresenceService {
    pool: deadpool_redis::Pool,
}

impl PresenceService {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }

    pub async fn set_online(&self, user_id: Uuid) -> Result<(), error::SystemError> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(format!("{PRESENCE_PREFIX}{user_id}"), "1", PRESENCE_TTL)
            .await?;
        Ok(())
    }

    /// Xóa presence key và lưu last_seen trong 1 round-trip
    pub async fn set_offline(&self, user_id: Uuid) -> Result<(), error::SystemError> {
        let mut conn = self.pool.get().await?;
        let now = chrono::Utc::now().to_rfc3339();

        redis::pipe()
            .del(format!("{PRESENCE_PREFIX}{user_id}"))
            .set(format!("{LAST_SEEN_PREFIX}{user_id}"), &now)
            .query_async::<()>(&mut *conn)
            .await?;

        Ok(())
    }

    pub async fn refresh(&self, user_id: Uuid) -> Result<(), error::SystemError> {
        let mut conn = self.pool.get().await?;
        conn.expire::<_, bool>(format!("{PRESENCE_PREFIX}{user_id}"), PRESENCE_TTL as i64)
            .await?;
        Ok(())
    }
}
