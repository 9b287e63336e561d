/// WebSocket Actor Events
///
/// Messages trao đổi giữa Session actors và Server actor.
use actix::prelude::*;
use uuid::Uuid;

use super::message::ServerEvent;

/// Event: text frame thô từ client, session tự parse
#[derive(Message)]
#[rtype(result = "()")]
pub struct ClientText(pub String);

/// Event: connection mới, chưa xác thực
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub id: Uuid,
    /// Recipient của session actor để server đẩy ServerEvent xuống
    pub recipient: Recipient<ServerEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: Uuid,
}

/// Event: session đã xác thực thành công
#[derive(Message)]
#[rtype(result = "()")]
pub struct Authenticate {
    pub session_id: Uuid,
    pub user_id: Uuid,
}

/// Event: session bắt đầu xem một conversation
#[derive(Message)]
#[rtype(result = "()")]
pub struct JoinConversation {
    pub session_id: Uuid,
    pub conversation_id: Uuid,
}

/// Event: session rời conversation đang xem
#[derive(Message)]
#[rtype(result = "()")]
pub struct LeaveConversation {
    pub session_id: Uuid,
    pub conversation_id: Uuid,
}

/// Event: gửi cho mọi session của một user (multi-device)
#[derive(Message)]
#[rtype(result = "()")]
pub struct SendToUser {
    pub user_id: Uuid,
    pub event: ServerEvent,
}

/// Event: lấy users đang xem conversation
#[derive(Message)]
#[rtype(result = "Vec<Uuid>")]
pub struct GetViewers {
    pub conversation_id: Uuid,
}

/// Event: connection đã đóng, session actor cần dừng
#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;
