use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    api::error,
    constants::{CONVERSATION_STARTED, RECALLED_PLACEHOLDER},
    modules::conversation::schema::ParticipantSnapshot,
    utils,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "message_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    Media,
    System,
    SystemAddMembers,
    SystemRemoveMembers,
    SystemLeaveGroup,
    SystemEditGroupName,
    SystemEditGroupAvatar,
    SystemReaction,
}

impl MessageType {
    pub fn is_membership_change(&self) -> bool {
        matches!(
            self,
            MessageType::SystemAddMembers
                | MessageType::SystemRemoveMembers
                | MessageType::SystemLeaveGroup
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "message_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    Sent,
    Seen,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum RecallType {
    #[serde(rename = "SELF")]
    ForSelf,
    #[serde(rename = "EVERYONE")]
    ForEveryone,
}

impl FromStr for RecallType {
    type Err = error::SystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self" => Ok(RecallType::ForSelf),
            "everyone" => Ok(RecallType::ForEveryone),
            other => Err(error::SystemError::bad_request(format!(
                "Invalid recall type '{other}', expected 'self' or 'everyone'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reader {
    pub user_id: Uuid,
    pub read_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallState {
    pub recall_type: RecallType,
    pub recalled_by: Uuid,
    pub recalled_at: chrono::DateTime<chrono::Utc>,
    pub original_message: String,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    File,
}

impl MediaKind {
    /// Suy ra loại media từ MIME type, fallback đoán theo tên file
    pub fn detect(mime_type: Option<&str>, file_name: &str) -> Self {
        let guessed;
        let mime = match mime_type.filter(|m| !m.trim().is_empty()) {
            Some(m) => m.to_ascii_lowercase(),
            None => {
                guessed = mime_guess::from_path(file_name).first_or_octet_stream();
                guessed.essence_str().to_string()
            }
        };

        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else if mime.starts_with("audio/") {
            MediaKind::Audio
        } else if mime.contains("pdf")
            || mime.contains("document")
            || mime.contains("text")
            || mime.contains("msword")
            || mime.contains("spreadsheet")
            || mime.contains("presentation")
        {
            MediaKind::Document
        } else {
            MediaKind::File
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAttachment {
    pub url: String,
    pub mime_type: Option<String>,
    pub file_name: String,
    pub file_size: Option<i64>,
    pub kind: MediaKind,
}

/// Payload JSON của SYSTEM_ADD_MEMBERS / SYSTEM_REMOVE_MEMBERS / SYSTEM_LEAVE_GROUP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChange {
    pub actor_id: Uuid,
    pub actor_name: String,
    pub member_ids: Vec<Uuid>,
    pub member_names: Vec<String>,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntity {
    pub id: Uuid,
    pub conversation_id: Uuid,
    #[sqlx(json)]
    pub sender: Option<ParticipantSnapshot>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub _type: MessageType,
    pub body: String,
    pub status: MessageStatus,
    #[sqlx(json)]
    pub readers: Vec<Reader>,
    pub reply_to_message_id: Option<Uuid>,
    #[sqlx(json)]
    pub recall: Option<RecallState>,
    #[sqlx(json)]
    pub media: Option<MediaAttachment>,
    pub pinned: bool,
    pub pinned_by: Option<Uuid>,
    pub pinned_at: Option<chrono::DateTime<chrono::Utc>>,
    pub edited_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub modified_at: chrono::DateTime<chrono::Utc>,
    pub version: i64,
}

impl MessageEntity {
    /// Message mới; sender (nếu có) được seed làm reader đầu tiên
    pub fn new(
        conversation_id: Uuid,
        sender: Option<ParticipantSnapshot>,
        _type: MessageType,
        body: impl Into<String>,
    ) -> Self {
        let now = utils::now();
        let readers = sender
            .as_ref()
            .map(|s| vec![Reader { user_id: s.user_id, read_at: now }])
            .unwrap_or_default();

        Self {
            id: Uuid::now_v7(),
            conversation_id,
            sender,
            _type,
            body: body.into(),
            status: MessageStatus::Sent,
            readers,
            reply_to_message_id: None,
            recall: None,
            media: None,
            pinned: false,
            pinned_by: None,
            pinned_at: None,
            edited_at: None,
            created_at: now,
            modified_at: now,
            version: 0,
        }
    }

    pub fn system(conversation_id: Uuid, _type: MessageType, body: impl Into<String>) -> Self {
        Self::new(conversation_id, None, _type, body)
    }

    pub fn bootstrap(conversation_id: Uuid) -> Self {
        Self::system(conversation_id, MessageType::System, CONVERSATION_STARTED)
    }

    pub fn membership(
        conversation_id: Uuid,
        _type: MessageType,
        change: &MembershipChange,
    ) -> Result<Self, error::SystemError> {
        let body = serde_json::to_string(change)?;
        Ok(Self::system(conversation_id, _type, body))
    }

    pub fn with_reply_to(mut self, reply_to_message_id: Option<Uuid>) -> Self {
        self.reply_to_message_id = reply_to_message_id;
        self
    }

    pub fn with_media(mut self, media: MediaAttachment) -> Self {
        self.media = Some(media);
        self
    }

    pub fn sender_id(&self) -> Option<Uuid> {
        self.sender.as_ref().map(|s| s.user_id)
    }

    pub fn is_sent_by(&self, user_id: &Uuid) -> bool {
        self.sender_id().as_ref() == Some(user_id)
    }

    pub fn is_bootstrap(&self) -> bool {
        self._type == MessageType::System && self.body == CONVERSATION_STARTED
    }

    pub fn is_recalled(&self) -> bool {
        self.recall.is_some()
    }

    pub fn has_reader(&self, user_id: &Uuid) -> bool {
        self.readers.iter().any(|r| &r.user_id == user_id)
    }

    pub fn membership_change(&self) -> Option<MembershipChange> {
        if !self._type.is_membership_change() {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }

    /// Thêm reader và chuyển SEEN. Trả về `false` nếu không có gì thay đổi.
    pub fn mark_seen_by(&mut self, user_id: Uuid, at: chrono::DateTime<chrono::Utc>) -> bool {
        let mut changed = false;
        if !self.has_reader(&user_id) {
            self.readers.push(Reader { user_id, read_at: at });
            changed = true;
        }
        if self.status != MessageStatus::Seen {
            self.status = MessageStatus::Seen;
            changed = true;
        }
        changed
    }

    /// ACTIVE → RECALLED_SELF | RECALLED_EVERYONE (terminal)
    pub fn recall(
        &mut self,
        recall_type: RecallType,
        recalled_by: Uuid,
    ) -> Result<(), error::SystemError> {
        if self.is_recalled() {
            return Err(error::SystemError::bad_request("Message has already been recalled"));
        }
        if !self.is_sent_by(&recalled_by) {
            return Err(error::SystemError::forbidden("You can only recall your own messages"));
        }

        let now = utils::now();
        let original = std::mem::replace(&mut self.body, RECALLED_PLACEHOLDER.to_string());
        self.recall = Some(RecallState {
            recall_type,
            recalled_by,
            recalled_at: now,
            original_message: original,
        });
        self.modified_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> ParticipantSnapshot {
        ParticipantSnapshot {
            user_id: Uuid::now_v7(),
            username: "an".into(),
            first_name: Some("An".into()),
            last_name: None,
            avatar: None,
            department: None,
            position: None,
            seniority: None,
            role: None,
        }
    }

    #[test]
    fn test_sender_is_first_reader() {
        let s = sender();
        let message = MessageEntity::new(Uuid::now_v7(), Some(s.clone()), MessageType::Text, "hi");
        assert!(message.has_reader(&s.user_id));
        assert_eq!(message.status, MessageStatus::Sent);
    }

    #[test]
    fn test_recall_type_parsing() {
        assert_eq!("self".parse::<RecallType>().unwrap(), RecallType::ForSelf);
        assert_eq!("everyone".parse::<RecallType>().unwrap(), RecallType::ForEveryone);
        assert!(matches!(
            "EVERYONE".parse::<RecallType>(),
            Err(error::SystemError::BadRequest(_))
        ));
    }

    #[test]
    fn test_recall_is_terminal() {
        let s = sender();
        let mut message =
            MessageEntity::new(Uuid::now_v7(), Some(s.clone()), MessageType::Text, "secret");

        message.recall(RecallType::ForSelf, s.user_id).unwrap();
        assert_eq!(message.body, RECALLED_PLACEHOLDER);
        assert_eq!(message.recall.as_ref().unwrap().original_message, "secret");

        assert!(message.recall(RecallType::ForEveryone, s.user_id).is_err());
        assert_eq!(message.recall.as_ref().unwrap().recall_type, RecallType::ForSelf);
    }

    #[test]
    fn test_only_sender_can_recall() {
        let mut message =
            MessageEntity::new(Uuid::now_v7(), Some(sender()), MessageType::Text, "hello");
        let result = message.recall(RecallType::ForEveryone, Uuid::now_v7());
        assert!(matches!(result, Err(error::SystemError::Forbidden(_))));
        assert!(!message.is_recalled());
    }

    #[test]
    fn test_mark_seen_is_idempotent() {
        let mut message =
            MessageEntity::new(Uuid::now_v7(), Some(sender()), MessageType::Text, "hello");
        let reader = Uuid::now_v7();
        assert!(message.mark_seen_by(reader, utils::now()));
        assert!(!message.mark_seen_by(reader, utils::now()));
        assert_eq!(message.readers.len(), 2);
    }

    #[test]
    fn test_media_kind_detection() {
        assert_eq!(MediaKind::detect(Some("image/png"), "a.png"), MediaKind::Image);
        assert_eq!(MediaKind::detect(Some("video/mp4"), "a.mp4"), MediaKind::Video);
        assert_eq!(MediaKind::detect(Some("audio/mpeg"), "a.mp3"), MediaKind::Audio);
        assert_eq!(MediaKind::detect(Some("application/pdf"), "a.pdf"), MediaKind::Document);
        assert_eq!(MediaKind::detect(Some("application/zip"), "a.zip"), MediaKind::File);
        assert_eq!(MediaKind::detect(None, "photo.jpeg"), MediaKind::Image);
        assert_eq!(MediaKind::detect(None, "blob"), MediaKind::File);
    }

    #[test]
    fn test_membership_payload_parsed_only_for_membership_types() {
        let change = MembershipChange {
            actor_id: Uuid::now_v7(),
            actor_name: "An".into(),
            member_ids: vec![Uuid::now_v7()],
            member_names: vec!["Dung".into()],
            group_name: "Team".into(),
        };
        let message =
            MessageEntity::membership(Uuid::now_v7(), MessageType::SystemAddMembers, &change)
                .unwrap();
        assert_eq!(message.membership_change(), Some(change));
        assert!(message.sender.is_none());

        let text = MessageEntity::system(Uuid::now_v7(), MessageType::System, "{}");
        assert_eq!(text.membership_change(), None);
    }
}
