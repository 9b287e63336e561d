use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::modules::{
    conversation::schema::{ConversationEntity, ConversationType, ParticipantSnapshot},
    message::model::MessageView,
};

/// Conversation như một viewer cụ thể nhìn thấy (list / detail / broadcast)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub _type: ConversationType,
    pub participants_hash: String,
    pub conversation_name: String,
    pub conversation_avatar: Option<String>,
    pub participants: Vec<ParticipantSnapshot>,
    pub group_name: Option<String>,
    pub group_avatar: Option<String>,
    pub created_by: Option<Uuid>,
    pub last_message: Option<MessageView>,
    pub unread_count: usize,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl ConversationView {
    pub fn project(conversation: &ConversationEntity, viewer_id: &Uuid, unread_count: usize) -> Self {
        let (conversation_name, conversation_avatar) = match conversation._type {
            ConversationType::Group => {
                (conversation.group_name_or_default(), conversation.group_avatar.clone())
            }
            ConversationType::Direct => conversation
                .participants
                .iter()
                .find(|p| &p.user_id != viewer_id)
                .map(|p| (p.display_name(), p.avatar.clone()))
                .unwrap_or_default(),
        };

        Self {
            id: conversation.id,
            _type: conversation._type,
            participants_hash: conversation.participants_hash.clone(),
            conversation_name,
            conversation_avatar,
            participants: conversation.participants.clone(),
            group_name: conversation.group_name.clone(),
            group_avatar: conversation.group_avatar.clone(),
            created_by: conversation.created_by,
            last_message: conversation
                .last_message
                .as_ref()
                .map(|m| MessageView::project(m, viewer_id)),
            unread_count,
            created_at: conversation.created_at,
            modified_at: conversation.modified_at,
        }
    }
}

// === Socket / REST payloads ===

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectRequest {
    pub participant_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 255))]
    pub group_name: String,
    pub group_avatar: Option<String>,
    #[validate(length(min = 1))]
    pub participant_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsRequest {
    pub conversation_id: Uuid,
    #[validate(length(min = 1))]
    pub participant_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EditGroupInfoRequest {
    pub conversation_id: Uuid,
    pub group_name: Option<String>,
    pub group_avatar: Option<String>,
}

// === Broadcast payloads ===

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipUpdate {
    pub conversation_id: Uuid,
    pub actor_id: Uuid,
    pub member_ids: Vec<Uuid>,
    pub conversation: ConversationView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLeft {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::message::schema::MessageType;

    fn participant(first: &str, avatar: Option<&str>) -> ParticipantSnapshot {
        ParticipantSnapshot {
            user_id: Uuid::now_v7(),
            username: first.to_lowercase(),
            first_name: Some(first.to_string()),
            last_name: None,
            avatar: avatar.map(str::to_string),
            department: None,
            position: None,
            seniority: None,
            role: None,
        }
    }

    #[test]
    fn test_direct_named_after_other_party() {
        let a = participant("An", Some("a.png"));
        let b = participant("Binh", Some("b.png"));
        let conversation = ConversationEntity::new_direct(a.clone(), b.clone());

        let for_a = ConversationView::project(&conversation, &a.user_id, 0);
        assert_eq!(for_a.conversation_name, "Binh");
        assert_eq!(for_a.conversation_avatar.as_deref(), Some("b.png"));

        let for_b = ConversationView::project(&conversation, &b.user_id, 3);
        assert_eq!(for_b.conversation_name, "An");
        assert_eq!(for_b.unread_count, 3);
        assert_eq!(for_b.last_message.as_ref().map(|m| m._type), Some(MessageType::System));
    }

    #[test]
    fn test_group_named_after_group() {
        let a = participant("An", None);
        let b = participant("Binh", None);
        let group = ConversationEntity::new_group(
            a.user_id,
            "Backend".into(),
            Some("g.png".into()),
            vec![a.clone(), b],
        );

        let view = ConversationView::project(&group, &a.user_id, 0);
        assert_eq!(view.conversation_name, "Backend");
        assert_eq!(view.conversation_avatar.as_deref(), Some("g.png"));
        assert_eq!(view.created_by, Some(a.user_id));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "GROUP");
        assert_eq!(json["unreadCount"], 0);
    }
}
