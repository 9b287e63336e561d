use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

use crate::{clients::Profile, modules::message::schema::MessageEntity, utils};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "conversation_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationType {
    Direct,
    Group,
}

/// Bản sao profile lưu trong conversation, refresh mỗi lần thay đổi thành viên
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    pub user_id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub seniority: Option<String>,
    pub role: Option<String>,
}

impl ParticipantSnapshot {
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }
}

impl From<Profile> for ParticipantSnapshot {
    fn from(p: Profile) -> Self {
        Self {
            user_id: p.user_id,
            username: p.username,
            first_name: p.first_name,
            last_name: p.last_name,
            avatar: p.avatar,
            department: p.department,
            position: p.position,
            seniority: p.seniority,
            role: p.role,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntity {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub _type: ConversationType,
    pub participants_hash: String,
    #[sqlx(json)]
    pub participants: Vec<ParticipantSnapshot>,
    pub group_name: Option<String>,
    pub group_avatar: Option<String>,
    pub created_by: Option<Uuid>,
    #[sqlx(json)]
    pub last_message: Option<MessageEntity>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub modified_at: chrono::DateTime<chrono::Utc>,
    pub version: i64,
}

impl ConversationEntity {
    pub fn new_direct(a: ParticipantSnapshot, b: ParticipantSnapshot) -> Self {
        let now = utils::now();
        let mut conversation = Self {
            id: Uuid::now_v7(),
            _type: ConversationType::Direct,
            participants_hash: Self::direct_hash(&a.user_id, &b.user_id),
            participants: vec![a, b],
            group_name: None,
            group_avatar: None,
            created_by: None,
            last_message: None,
            created_at: now,
            modified_at: now,
            version: 0,
        };
        // Direct conversation chỉ seed preview, không persist bootstrap message
        conversation.last_message = Some(MessageEntity::bootstrap(conversation.id));
        conversation
    }

    /// `participants` phải có creator ở vị trí đầu tiên
    pub fn new_group(
        creator_id: Uuid,
        group_name: String,
        group_avatar: Option<String>,
        participants: Vec<ParticipantSnapshot>,
    ) -> Self {
        let now = utils::now();
        let mut conversation = Self {
            id: Uuid::now_v7(),
            _type: ConversationType::Group,
            participants_hash: String::new(),
            participants,
            group_name: Some(group_name),
            group_avatar,
            created_by: Some(creator_id),
            last_message: None,
            created_at: now,
            modified_at: now,
            version: 0,
        };
        conversation.refresh_hash();
        conversation
    }

    /// Canonical key của direct conversation: 2 id đã sort, nối bằng `_`
    pub fn direct_hash(a: &Uuid, b: &Uuid) -> String {
        let mut ids = [a.to_string(), b.to_string()];
        ids.sort();
        ids.join("_")
    }

    /// Group hash được tính lại sau mỗi lần thay đổi thành viên
    pub fn refresh_hash(&mut self) {
        if self._type == ConversationType::Group {
            let mut ids: Vec<String> =
                self.participants.iter().map(|p| p.user_id.to_string()).collect();
            ids.sort();
            self.participants_hash = ids.join(",");
        }
    }

    pub fn is_group(&self) -> bool {
        self._type == ConversationType::Group
    }

    pub fn is_participant(&self, user_id: &Uuid) -> bool {
        self.participants.iter().any(|p| &p.user_id == user_id)
    }

    pub fn participant(&self, user_id: &Uuid) -> Option<&ParticipantSnapshot> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    pub fn participant_ids(&self) -> Vec<Uuid> {
        self.participants.iter().map(|p| p.user_id).collect()
    }

    pub fn group_name_or_default(&self) -> String {
        self.group_name.clone().unwrap_or_else(|| "the group".to_string())
    }

    pub fn touch(&mut self) {
        self.modified_at = utils::now();
    }
}
