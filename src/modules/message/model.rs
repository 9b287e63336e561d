use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    constants::RECALLED_PLACEHOLDER,
    modules::{
        conversation::schema::ParticipantSnapshot,
        message::schema::{
            MediaAttachment, MessageEntity, MessageStatus, MessageType, Reader, RecallType,
        },
    },
};

/// Message như một viewer cụ thể nhìn thấy.
///
/// - RECALLED_EVERYONE: mọi viewer thấy placeholder
/// - RECALLED_SELF: chỉ người thu hồi thấy placeholder, người khác thấy nội dung gốc
///   và không biết message đã bị thu hồi
/// - Membership system message được render theo góc nhìn viewer ("You added ...")
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Option<ParticipantSnapshot>,
    pub me: bool,
    #[serde(rename = "type")]
    pub _type: MessageType,
    pub message: String,
    pub status: MessageStatus,
    pub readers: Vec<Reader>,
    pub reply_to_message_id: Option<Uuid>,
    pub media: Option<MediaAttachment>,
    pub recalled: bool,
    pub recall_type: Option<RecallType>,
    pub recalled_by: Option<Uuid>,
    pub recalled_at: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub pinned_by: Option<Uuid>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl MessageView {
    pub fn project(message: &MessageEntity, viewer_id: &Uuid) -> Self {
        let mut view = Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender: message.sender.clone(),
            me: message.is_sent_by(viewer_id),
            _type: message._type,
            message: render_body(message, viewer_id),
            status: message.status,
            readers: message.readers.clone(),
            reply_to_message_id: message.reply_to_message_id,
            media: message.media.clone(),
            recalled: false,
            recall_type: None,
            recalled_by: None,
            recalled_at: None,
            pinned: message.pinned,
            pinned_by: message.pinned_by,
            pinned_at: message.pinned_at,
            edited: message.edited_at.is_some(),
            edited_at: message.edited_at,
            created_at: message.created_at,
            modified_at: message.modified_at,
        };

        let Some(recall) = &message.recall else {
            return view;
        };

        let hidden = match recall.recall_type {
            RecallType::ForEveryone => true,
            RecallType::ForSelf => &recall.recalled_by == viewer_id,
        };

        if hidden {
            view.message = RECALLED_PLACEHOLDER.to_string();
            view.media = None;
            view.recalled = true;
            view.recall_type = Some(recall.recall_type);
            view.recalled_by = Some(recall.recalled_by);
            view.recalled_at = Some(recall.recalled_at);
        } else {
            view.message = recall.original_message.clone();
        }

        view
    }
}

fn render_body(message: &MessageEntity, viewer_id: &Uuid) -> String {
    let Some(change) = message.membership_change() else {
        return message.body.clone();
    };

    let names = change.member_names.join(", ");
    let by_viewer = &change.actor_id == viewer_id;
    let includes_viewer = change.member_ids.contains(viewer_id);
    let group = &change.group_name;
    let actor = &change.actor_name;

    match message._type {
        MessageType::SystemAddMembers if by_viewer => format!("You added {names} to {group}"),
        MessageType::SystemAddMembers if includes_viewer => {
            format!("You were added to {group} by {actor}")
        }
        MessageType::SystemAddMembers => format!("{actor} added {names} to {group}"),
        MessageType::SystemRemoveMembers if by_viewer => {
            format!("You removed {names} from {group}")
        }
        MessageType::SystemRemoveMembers if includes_viewer => {
            format!("You were removed from {group} by {actor}")
        }
        MessageType::SystemRemoveMembers => format!("{actor} removed {names} from {group}"),
        MessageType::SystemLeaveGroup if by_viewer => format!("You left {group}"),
        MessageType::SystemLeaveGroup => format!("{actor} left {group}"),
        _ => message.body.clone(),
    }
}

// === Socket / REST payloads ===

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: Uuid,
    #[validate(length(min = 1, max = 10000))]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMessageRequest {
    pub conversation_id: Uuid,
    #[validate(length(min = 1, max = 10000))]
    pub message: String,
    pub reply_to_message_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MediaMessageRequest {
    pub conversation_id: Uuid,
    #[validate(url)]
    pub file_url: String,
    pub file_type: Option<String>,
    #[validate(length(min = 1))]
    pub file_name: String,
    pub file_size: Option<i64>,
    pub caption: Option<String>,
    pub reply_to_message_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub message_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecallMessageRequest {
    pub message_id: Uuid,
    pub recall_type: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PinMessageRequest {
    pub message_id: Uuid,
    pub pin: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForwardMessageRequest {
    pub message_id: Uuid,
    pub to_conversation_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    #[validate(length(min = 1, max = 10000))]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    pub conversation_id: Uuid,
}

// === Broadcast payloads ===

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStatusUpdate {
    pub conversation_id: Uuid,
    pub message_ids: Vec<Uuid>,
    pub reader_id: Uuid,
    pub status: MessageStatus,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeleted {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub deleted_by: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::message::schema::MembershipChange;

    fn participant(name: &str) -> ParticipantSnapshot {
        ParticipantSnapshot {
            user_id: Uuid::now_v7(),
            username: name.to_lowercase(),
            first_name: Some(name.to_string()),
            last_name: None,
            avatar: None,
            department: None,
            position: None,
            seniority: None,
            role: None,
        }
    }

    fn text_from(sender: &ParticipantSnapshot, body: &str) -> MessageEntity {
        MessageEntity::new(Uuid::now_v7(), Some(sender.clone()), MessageType::Text, body)
    }

    #[test]
    fn test_active_message_projects_as_is() {
        let a = participant("An");
        let message = text_from(&a, "hello");

        let own = MessageView::project(&message, &a.user_id);
        let other = MessageView::project(&message, &Uuid::now_v7());

        assert!(own.me);
        assert!(!other.me);
        assert_eq!(own.message, "hello");
        assert_eq!(other.message, "hello");
        assert!(!own.recalled);
    }

    #[test]
    fn test_recall_for_everyone_hides_from_all() {
        let a = participant("An");
        let b = participant("Binh");
        let mut message = text_from(&a, "oops");
        message.recall(RecallType::ForEveryone, a.user_id).unwrap();

        for viewer in [a.user_id, b.user_id] {
            let view = MessageView::project(&message, &viewer);
            assert_eq!(view.message, RECALLED_PLACEHOLDER);
            assert!(view.recalled);
            assert_eq!(view.recall_type, Some(RecallType::ForEveryone));
            assert_eq!(view.recalled_by, Some(a.user_id));
        }
    }

    #[test]
    fn test_recall_for_self_only_hides_from_recaller() {
        let a = participant("An");
        let b = participant("Binh");
        let mut message = text_from(&a, "draft");
        message.recall(RecallType::ForSelf, a.user_id).unwrap();

        let own = MessageView::project(&message, &a.user_id);
        assert_eq!(own.message, RECALLED_PLACEHOLDER);
        assert!(own.recalled);

        let other = MessageView::project(&message, &b.user_id);
        assert_eq!(other.message, "draft");
        assert!(!other.recalled);
        assert_eq!(other.recall_type, None);
        assert_eq!(other.recalled_by, None);
        assert_eq!(other.recalled_at, None);
    }

    #[test]
    fn test_add_members_rendered_per_viewer() {
        let a = participant("An");
        let d = participant("Dung");
        let c = participant("Chi");
        let change = MembershipChange {
            actor_id: a.user_id,
            actor_name: "An".into(),
            member_ids: vec![d.user_id],
            member_names: vec!["Dung".into()],
            group_name: "Team".into(),
        };
        let message =
            MessageEntity::membership(Uuid::now_v7(), MessageType::SystemAddMembers, &change)
                .unwrap();

        assert_eq!(MessageView::project(&message, &a.user_id).message, "You added Dung to Team");
        assert_eq!(
            MessageView::project(&message, &d.user_id).message,
            "You were added to Team by An"
        );
        assert_eq!(MessageView::project(&message, &c.user_id).message, "An added Dung to Team");
    }

    #[test]
    fn test_leave_group_rendered_per_viewer() {
        let b = participant("Binh");
        let change = MembershipChange {
            actor_id: b.user_id,
            actor_name: "Binh".into(),
            member_ids: vec![b.user_id],
            member_names: vec!["Binh".into()],
            group_name: "Team".into(),
        };
        let message =
            MessageEntity::membership(Uuid::now_v7(), MessageType::SystemLeaveGroup, &change)
                .unwrap();

        assert_eq!(MessageView::project(&message, &b.user_id).message, "You left Team");
        assert_eq!(MessageView::project(&message, &Uuid::now_v7()).message, "Binh left Team");
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let a = participant("An");
        let view = MessageView::project(&text_from(&a, "hi"), &a.user_id);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "TEXT");
        assert_eq!(json["conversationId"], view.conversation_id.to_string());
        assert_eq!(json["status"], "SENT");
        assert_eq!(json["me"], true);
    }
}
