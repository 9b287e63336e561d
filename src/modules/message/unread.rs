/// Unread-count rules
///
/// DIRECT: message chưa đọc nếu không do viewer gửi, status khác SEEN, type khác SYSTEM.
///
/// GROUP: chỉ tính messages tạo từ lần cuối viewer được thêm vào group (membership anchor),
/// bỏ qua messages của chính viewer, bootstrap message, và messages viewer đã có trong
/// `readers`. Viewer chưa từng được thêm qua event (thành viên ban đầu) không bị giới hạn
/// theo thời gian.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::modules::{
    conversation::schema::ConversationType,
    message::schema::{MessageEntity, MessageStatus, MessageType},
};

pub fn is_unread(
    message: &MessageEntity,
    viewer_id: &Uuid,
    conversation_type: ConversationType,
    last_added_at: Option<DateTime<Utc>>,
) -> bool {
    if message.is_sent_by(viewer_id) {
        return false;
    }

    match conversation_type {
        ConversationType::Direct => {
            message.status != MessageStatus::Seen && message._type != MessageType::System
        }
        ConversationType::Group => {
            let after_anchor = last_added_at.map_or(true, |anchor| message.created_at >= anchor);
            after_anchor && !message.is_bootstrap() && !message.has_reader(viewer_id)
        }
    }
}

pub fn unread_messages<'a>(
    messages: &'a [MessageEntity],
    viewer_id: &'a Uuid,
    conversation_type: ConversationType,
    last_added_at: Option<DateTime<Utc>>,
) -> impl Iterator<Item = &'a MessageEntity> + 'a {
    messages
        .iter()
        .filter(move |m| is_unread(m, viewer_id, conversation_type, last_added_at))
}
