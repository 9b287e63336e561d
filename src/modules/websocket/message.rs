/// WebSocket Message Protocol
///
/// Mọi frame là JSON text `{ "event": string, "data": any }`, payload dùng camelCase.
/// Inbound frame được parse 2 bước: envelope trước, payload sau, để payload sai định dạng
/// vẫn trả được `<event>-error` đúng tên event.
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::error,
    modules::{
        conversation::model::{
            CreateGroupRequest, EditGroupInfoRequest, ParticipantsRequest,
        },
        message::model::{
            ConversationRef, EditMessageRequest, ForwardMessageRequest, MediaMessageRequest,
            MessageRef, PinMessageRequest, RecallMessageRequest, ReplyMessageRequest,
            SendMessageRequest,
        },
        reaction::model::ReactionRequest,
    },
};

// === Outbound event names ===

pub const AUTH_SUCCESS: &str = "auth-success";
pub const AUTH_ERROR: &str = "auth-error";
pub const PONG: &str = "pong";
pub const MESSAGE: &str = "message";
pub const REPLY_MESSAGE: &str = "reply-message";
pub const MESSAGE_STATUS_UPDATE: &str = "message-status-update";
pub const REACTION_UPDATE: &str = "reaction-update";
pub const MESSAGE_RECALLED: &str = "message-recalled";
pub const MESSAGE_PINNED: &str = "message-pinned";
pub const MESSAGE_UNPINNED: &str = "message-unpinned";
pub const MESSAGE_EDITED: &str = "message-edited";
pub const MESSAGE_DELETED: &str = "message-deleted";
pub const NEW_GROUP_CONVERSATION: &str = "new-group-conversation";
pub const PARTICIPANTS_ADDED: &str = "participants-added";
pub const PARTICIPANTS_REMOVED: &str = "participants-removed";
pub const MEMBER_LEFT: &str = "member-left";
pub const GROUP_INFO_UPDATED: &str = "group-info-updated";

/// Envelope của một inbound frame, payload chưa được parse
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AuthRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

/// Messages được gửi từ client đến server
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Auth(AuthRequest),
    Ping,
    JoinConversation(ConversationRef),
    LeaveConversation(ConversationRef),
    MessageStatusUpdate(ConversationRef),
    SendMessage(SendMessageRequest),
    ReplyMessage(ReplyMessageRequest),
    ReactMessage(ReactionRequest),
    RemoveReaction(ReactionRequest),
    ToggleReaction(ReactionRequest),
    RecallMessage(RecallMessageRequest),
    PinMessage(PinMessageRequest),
    SendMediaMessage(MediaMessageRequest),
    SendMediaReply(MediaMessageRequest),
    DeleteMediaMessage(MessageRef),
    CreateGroupConversation(CreateGroupRequest),
    AddParticipants(ParticipantsRequest),
    RemoveParticipants(ParticipantsRequest),
    LeaveGroup(ConversationRef),
    EditGroupInfo(EditGroupInfoRequest),
    ForwardMessage(ForwardMessageRequest),
    EditMessage(EditMessageRequest),
}

fn payload<T>(data: Value) -> Result<T, error::SystemError>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_value(data)
        .map_err(|e| error::SystemError::bad_request(format!("Invalid payload: {e}")))?;
    value
        .validate()
        .map_err(|e| error::SystemError::bad_request(format!("Invalid payload: {e}")))?;
    Ok(value)
}

impl ClientEvent {
    pub fn parse(frame: InboundFrame) -> Result<Self, error::SystemError> {
        let InboundFrame { event, data } = frame;
        let parsed = match event.as_str() {
            "auth" => Self::Auth(payload(data)?),
            "ping" => Self::Ping,
            "join-conversation" => Self::JoinConversation(payload(data)?),
            "leave-conversation" => Self::LeaveConversation(payload(data)?),
            "message-status-update" => Self::MessageStatusUpdate(payload(data)?),
            "send-message" => Self::SendMessage(payload(data)?),
            "reply-message" => Self::ReplyMessage(payload(data)?),
            "react-message" => Self::ReactMessage(payload(data)?),
            "remove-reaction" => Self::RemoveReaction(payload(data)?),
            "toggle-reaction" => Self::ToggleReaction(payload(data)?),
            "recall-message" => Self::RecallMessage(payload(data)?),
            "pin-message" => Self::PinMessage(payload(data)?),
            "send-media-message" => Self::SendMediaMessage(payload(data)?),
            "send-media-reply" => Self::SendMediaReply(payload(data)?),
            "delete-media-message" => Self::DeleteMediaMessage(payload(data)?),
            "create-group-conversation" => Self::CreateGroupConversation(payload(data)?),
            "add-participants" => Self::AddParticipants(payload(data)?),
            "remove-participants" => Self::RemoveParticipants(payload(data)?),
            "leave-group" => Self::LeaveGroup(payload(data)?),
            "edit-group-info" => Self::EditGroupInfo(payload(data)?),
            "forward-message" => Self::ForwardMessage(payload(data)?),
            "edit-message" => Self::EditMessage(payload(data)?),
            other => {
                return Err(error::SystemError::bad_request(format!("Unknown event: {other}")));
            }
        };
        Ok(parsed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Ping => "ping",
            Self::JoinConversation(_) => "join-conversation",
            Self::LeaveConversation(_) => "leave-conversation",
            Self::MessageStatusUpdate(_) => "message-status-update",
            Self::SendMessage(_) => "send-message",
            Self::ReplyMessage(_) => "reply-message",
            Self::ReactMessage(_) => "react-message",
            Self::RemoveReaction(_) => "remove-reaction",
            Self::ToggleReaction(_) => "toggle-reaction",
            Self::RecallMessage(_) => "recall-message",
            Self::PinMessage(_) => "pin-message",
            Self::SendMediaMessage(_) => "send-media-message",
            Self::SendMediaReply(_) => "send-media-reply",
            Self::DeleteMediaMessage(_) => "delete-media-message",
            Self::CreateGroupConversation(_) => "create-group-conversation",
            Self::AddParticipants(_) => "add-participants",
            Self::RemoveParticipants(_) => "remove-participants",
            Self::LeaveGroup(_) => "leave-group",
            Self::EditGroupInfo(_) => "edit-group-info",
            Self::ForwardMessage(_) => "forward-message",
            Self::EditMessage(_) => "edit-message",
        }
    }

    /// Tên event trả về khi thành công; unpin dùng tên riêng
    pub fn success_name(&self) -> Cow<'static, str> {
        match self {
            Self::PinMessage(req) if !req.pin => Cow::Borrowed("unpin-message-success"),
            other => Cow::Owned(format!("{}-success", other.name())),
        }
    }
}

/// Messages được gửi từ server đến client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEvent {
    pub event: Cow<'static, str>,
    pub data: Value,
}

impl ServerEvent {
    pub fn new(event: impl Into<Cow<'static, str>>, data: impl Serialize) -> Self {
        let event = event.into();
        let data = serde_json::to_value(data).unwrap_or_else(|e| {
            tracing::error!("Cannot serialize payload of '{}': {}", event, e);
            Value::Null
        });
        Self { event, data }
    }

    pub fn success(event: impl Into<Cow<'static, str>>, data: impl Serialize) -> Self {
        Self::new(event, data)
    }

    /// `<event>-error` với `{ "message": reason }`
    pub fn error(event: &str, reason: impl Into<String>) -> Self {
        Self::new(format!("{event}-error"), serde_json::json!({ "message": reason.into() }))
    }

    pub fn pong() -> Self {
        Self { event: Cow::Borrowed(PONG), data: Value::Null }
    }

    pub fn auth_success(user_id: Uuid) -> Self {
        Self::new(AUTH_SUCCESS, serde_json::json!({ "userId": user_id }))
    }

    pub fn to_json(&self) -> Result<String, error::SystemError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl actix::Message for ServerEvent {
    type Result = ();
}
