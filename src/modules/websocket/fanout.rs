/// Fanout
///
/// Seam giữa service layer và WebSocket server actor: services chỉ biết "gửi event cho user"
/// và "ai đang xem conversation", không phụ thuộc vào actor system.
use actix::Addr;
use uuid::Uuid;

use super::{
    events::{GetViewers, SendToUser},
    message::ServerEvent,
    server::WebSocketServer,
};

#[async_trait::async_trait]
pub trait Fanout: Send + Sync {
    /// Gửi tới mọi session của user; user offline thì bỏ qua
    fn send_to_user(&self, user_id: Uuid, event: ServerEvent);

    /// Users có session đang join conversation
    async fn viewing_users(&self, conversation_id: Uuid) -> Vec<Uuid>;
}

#[async_trait::async_trait]
impl Fanout for Addr<WebSocketServer> {
    fn send_to_user(&self, user_id: Uuid, event: ServerEvent) {
        self.do_send(SendToUser { user_id, event });
    }

    async fn viewing_users(&self, conversation_id: Uuid) -> Vec<Uuid> {
        match self.send(GetViewers { conversation_id }).await {
            Ok(viewers) => viewers,
            Err(e) => {
                tracing::warn!("Cannot query viewers of {}: {}", conversation_id, e);
                vec![]
            }
        }
    }
}
