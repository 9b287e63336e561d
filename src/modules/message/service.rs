/// Message Service
///
/// Orchestrate các thao tác trên message: kiểm tra quyền, persist qua repository,
/// cập nhật `last_message` của conversation, rồi mới broadcast cho participants khác.
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        conversation::{
            repository::ConversationRepository,
            schema::{ConversationEntity, ParticipantSnapshot},
        },
        message::{
            model::{
                EditMessageRequest, ForwardMessageRequest, MediaMessageRequest, MessageDeleted,
                MessageStatusUpdate, MessageView, PinMessageRequest, RecallMessageRequest,
                ReplyMessageRequest, SendMessageRequest,
            },
            repository::MessageRepository,
            schema::{MediaAttachment, MediaKind, MessageEntity, MessageStatus, MessageType, RecallType},
            unread,
        },
        websocket::{
            fanout::Fanout,
            message::{self as events, ServerEvent},
        },
    },
    utils,
};

#[derive(Clone)]
pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    conversations: Arc<dyn ConversationRepository>,
    fanout: Arc<dyn Fanout>,
}

impl MessageService {
    pub fn with_dependencies(
        messages: Arc<dyn MessageRepository>,
        conversations: Arc<dyn ConversationRepository>,
        fanout: Arc<dyn Fanout>,
    ) -> Self {
        MessageService { messages, conversations, fanout }
    }

    pub async fn load_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<ConversationEntity, error::SystemError> {
        self.conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))
    }

    pub async fn load_message(&self, message_id: &Uuid) -> Result<MessageEntity, error::SystemError> {
        self.messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))
    }

    pub fn require_participant<'a>(
        conversation: &'a ConversationEntity,
        user_id: &Uuid,
    ) -> Result<&'a ParticipantSnapshot, error::SystemError> {
        conversation.participant(user_id).ok_or_else(|| {
            error::SystemError::forbidden("You are not a participant of this conversation")
        })
    }

    /// Conversation mà user được phép truy cập
    pub async fn accessible_conversation(
        &self,
        user_id: &Uuid,
        conversation_id: &Uuid,
    ) -> Result<ConversationEntity, error::SystemError> {
        let conversation = self.load_conversation(conversation_id).await?;
        Self::require_participant(&conversation, user_id)?;
        Ok(conversation)
    }

    /// Insert message rồi đặt nó làm `last_message` nếu mới hơn bản đang cache
    pub async fn post(
        &self,
        message: MessageEntity,
    ) -> Result<(MessageEntity, ConversationEntity), error::SystemError> {
        let message = self.messages.insert(&message).await?;

        let cached = message.clone();
        let conversation = self
            .conversations
            .modify(&message.conversation_id, &mut |conversation| {
                let newer = conversation
                    .last_message
                    .as_ref()
                    .map_or(true, |last| last.created_at <= cached.created_at);
                if newer {
                    conversation.last_message = Some(cached.clone());
                }
                conversation.touch();
                Ok(())
            })
            .await?;

        Ok((message, conversation))
    }

    /// Gửi event cho mọi participant trừ `skip`, payload build theo từng viewer
    pub fn broadcast<F>(&self, conversation: &ConversationEntity, skip: Option<Uuid>, build: F)
    where
        F: Fn(&Uuid) -> ServerEvent,
    {
        for participant in &conversation.participants {
            if Some(participant.user_id) == skip {
                continue;
            }
            self.fanout.send_to_user(participant.user_id, build(&participant.user_id));
        }
    }

    /// Gửi thẳng cho một user, kể cả khi họ không còn là participant
    pub fn notify(&self, user_id: Uuid, event: ServerEvent) {
        self.fanout.send_to_user(user_id, event);
    }

    pub fn broadcast_message(
        &self,
        conversation: &ConversationEntity,
        event: &'static str,
        message: &MessageEntity,
        skip: Option<Uuid>,
    ) {
        self.broadcast(conversation, skip, |viewer| {
            ServerEvent::new(event, MessageView::project(message, viewer))
        });
    }

    /// Đồng bộ bản cache `last_message` nếu đó chính là message vừa thay đổi
    async fn refresh_cached_message(&self, message: &MessageEntity) -> Result<(), error::SystemError> {
        let conversation = self.load_conversation(&message.conversation_id).await?;
        if conversation.last_message.as_ref().map(|m| m.id) != Some(message.id) {
            return Ok(());
        }

        self.conversations
            .modify(&message.conversation_id, &mut |conversation| {
                if conversation.last_message.as_ref().map(|m| m.id) == Some(message.id) {
                    conversation.last_message = Some(message.clone());
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// DIRECT: recipient đang xem conversation thì message được lưu SEEN ngay
    async fn deliver(
        &self,
        conversation: &ConversationEntity,
        mut message: MessageEntity,
        event: &'static str,
        actor_id: Uuid,
    ) -> Result<MessageView, error::SystemError> {
        if !conversation.is_group() {
            let viewers = self.fanout.viewing_users(conversation.id).await;
            let now = utils::now();
            for viewer in viewers.iter().filter(|v| **v != actor_id) {
                if conversation.is_participant(viewer) {
                    message.mark_seen_by(*viewer, now);
                }
            }
        }

        let (message, conversation) = self.post(message).await?;
        self.broadcast_message(&conversation, event, &message, Some(actor_id));

        tracing::info!("Message {} delivered to conversation {}", message.id, conversation.id);
        Ok(MessageView::project(&message, &actor_id))
    }

    async fn compose(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        _type: MessageType,
        body: String,
        reply_to_message_id: Option<Uuid>,
        media: Option<MediaAttachment>,
    ) -> Result<MessageView, error::SystemError> {
        let conversation = self.load_conversation(&conversation_id).await?;
        let sender = Self::require_participant(&conversation, &user_id)?.clone();

        if let Some(target_id) = reply_to_message_id {
            let target = self.load_message(&target_id).await?;
            if target.conversation_id != conversation.id {
                return Err(error::SystemError::bad_request(
                    "Reply target does not belong to this conversation",
                ));
            }
        }

        let mut message = MessageEntity::new(conversation.id, Some(sender), _type, body)
            .with_reply_to(reply_to_message_id);
        if let Some(media) = media {
            message = message.with_media(media);
        }

        let event = if reply_to_message_id.is_some() { events::REPLY_MESSAGE } else { events::MESSAGE };
        self.deliver(&conversation, message, event, user_id).await
    }

    pub async fn send_message(
        &self,
        user_id: Uuid,
        req: SendMessageRequest,
    ) -> Result<MessageView, error::SystemError> {
        let body = non_blank(&req.message)?;
        self.compose(user_id, req.conversation_id, MessageType::Text, body, None, None).await
    }

    pub async fn reply(
        &self,
        user_id: Uuid,
        req: ReplyMessageRequest,
    ) -> Result<MessageView, error::SystemError> {
        let body = non_blank(&req.message)?;
        self.compose(
            user_id,
            req.conversation_id,
            MessageType::Text,
            body,
            Some(req.reply_to_message_id),
            None,
        )
        .await
    }

    pub async fn send_media(
        &self,
        user_id: Uuid,
        req: MediaMessageRequest,
    ) -> Result<MessageView, error::SystemError> {
        let media = MediaAttachment {
            kind: MediaKind::detect(req.file_type.as_deref(), &req.file_name),
            url: req.file_url,
            mime_type: req.file_type,
            file_name: req.file_name,
            file_size: req.file_size,
        };
        let caption = req.caption.map(|c| c.trim().to_string()).unwrap_or_default();

        self.compose(
            user_id,
            req.conversation_id,
            MessageType::Media,
            caption,
            req.reply_to_message_id,
            Some(media),
        )
        .await
    }

    pub async fn send_media_reply(
        &self,
        user_id: Uuid,
        req: MediaMessageRequest,
    ) -> Result<MessageView, error::SystemError> {
        if req.reply_to_message_id.is_none() {
            return Err(error::SystemError::bad_request("replyToMessageId is required"));
        }
        self.send_media(user_id, req).await
    }

    pub async fn forward(
        &self,
        user_id: Uuid,
        req: ForwardMessageRequest,
    ) -> Result<MessageView, error::SystemError> {
        let source = self.load_message(&req.message_id).await?;
        self.accessible_conversation(&user_id, &source.conversation_id).await?;

        let target = self.load_conversation(&req.to_conversation_id).await?;
        let sender = Self::require_participant(&target, &user_id)?.clone();

        // Forward đúng nội dung mà user đang thấy
        let visible = MessageView::project(&source, &user_id);
        if visible.recalled {
            return Err(error::SystemError::bad_request("Recalled messages cannot be forwarded"));
        }
        if !matches!(visible._type, MessageType::Text | MessageType::Media) {
            return Err(error::SystemError::bad_request("Only text or media messages can be forwarded"));
        }

        let mut message = MessageEntity::new(target.id, Some(sender), visible._type, visible.message);
        if let Some(media) = visible.media {
            message = message.with_media(media);
        }

        self.deliver(&target, message, events::MESSAGE, user_id).await
    }

    pub async fn edit_message(
        &self,
        user_id: Uuid,
        req: EditMessageRequest,
    ) -> Result<MessageView, error::SystemError> {
        let body = non_blank(&req.message)?;
        let conversation = self.accessible_conversation(&user_id, &req.conversation_id).await?;

        let updated = self
            .messages
            .modify(&req.message_id, &mut |message| {
                if message.conversation_id != conversation.id {
                    return Err(error::SystemError::bad_request(
                        "Message does not belong to this conversation",
                    ));
                }
                if !message.is_sent_by(&user_id) {
                    return Err(error::SystemError::forbidden("You can only edit your own messages"));
                }
                if message.is_recalled() {
                    return Err(error::SystemError::bad_request("Recalled messages cannot be edited"));
                }

                let now = utils::now();
                message.body = body.clone();
                message.edited_at = Some(now);
                message.modified_at = now;
                Ok(())
            })
            .await?;

        self.refresh_cached_message(&updated).await?;
        self.broadcast_message(&conversation, events::MESSAGE_EDITED, &updated, Some(user_id));

        Ok(MessageView::project(&updated, &user_id))
    }

    pub async fn recall(
        &self,
        user_id: Uuid,
        req: RecallMessageRequest,
    ) -> Result<MessageView, error::SystemError> {
        let recall_type: RecallType = req.recall_type.parse()?;
        let message = self.load_message(&req.message_id).await?;
        let conversation = self.accessible_conversation(&user_id, &message.conversation_id).await?;

        let updated = self
            .messages
            .modify(&message.id, &mut |message| message.recall(recall_type, user_id))
            .await?;

        self.refresh_cached_message(&updated).await?;

        // Thu hồi phía mình: participants khác vẫn thấy nội dung gốc, không cần báo
        if recall_type == RecallType::ForEveryone {
            self.broadcast_message(&conversation, events::MESSAGE_RECALLED, &updated, Some(user_id));
        }

        tracing::info!("Message {} recalled ({:?}) by {}", updated.id, recall_type, user_id);
        Ok(MessageView::project(&updated, &user_id))
    }

    pub async fn set_pinned(
        &self,
        user_id: Uuid,
        req: PinMessageRequest,
    ) -> Result<MessageView, error::SystemError> {
        let message = self.load_message(&req.message_id).await?;
        let conversation = self.load_conversation(&message.conversation_id).await?;
        let actor = Self::require_participant(&conversation, &user_id)?.clone();

        let pin = req.pin;
        let updated = self
            .messages
            .modify(&message.id, &mut |message| {
                match (pin, message.pinned) {
                    (true, true) => {
                        return Err(error::SystemError::bad_request("Message is already pinned"));
                    }
                    (false, false) => {
                        return Err(error::SystemError::bad_request("Message is not pinned"));
                    }
                    _ => {}
                }

                let now = utils::now();
                message.pinned = pin;
                message.pinned_by = pin.then_some(user_id);
                message.pinned_at = pin.then_some(now);
                message.modified_at = now;
                Ok(())
            })
            .await?;

        let verb = if pin { "pinned" } else { "unpinned" };
        let notice = MessageEntity::new(
            conversation.id,
            Some(actor.clone()),
            MessageType::System,
            format!("{} {verb} a message", actor.display_name()),
        );
        let (notice, conversation) = self.post(notice).await?;

        let event = if pin { events::MESSAGE_PINNED } else { events::MESSAGE_UNPINNED };
        self.broadcast_message(&conversation, event, &updated, Some(user_id));
        self.broadcast_message(&conversation, events::MESSAGE, &notice, Some(user_id));

        Ok(MessageView::project(&updated, &user_id))
    }

    pub async fn delete_media(
        &self,
        user_id: Uuid,
        message_id: Uuid,
    ) -> Result<MessageDeleted, error::SystemError> {
        let message = self.load_message(&message_id).await?;
        let conversation = self.accessible_conversation(&user_id, &message.conversation_id).await?;

        if !message.is_sent_by(&user_id) {
            return Err(error::SystemError::forbidden("You can only delete your own messages"));
        }
        if message._type != MessageType::Media || message.media.is_none() {
            return Err(error::SystemError::bad_request("Only media messages can be deleted"));
        }

        if !self.messages.delete(&message.id).await? {
            return Err(error::SystemError::not_found("Message not found"));
        }

        let mut conversation = conversation;
        if conversation.last_message.as_ref().map(|m| m.id) == Some(message.id) {
            let latest = self.messages.find_latest(&conversation.id).await?;
            conversation = self
                .conversations
                .modify(&conversation.id, &mut |conversation| {
                    if conversation.last_message.as_ref().map(|m| m.id) == Some(message.id) {
                        conversation.last_message = latest.clone();
                    }
                    Ok(())
                })
                .await?;
        }

        let deleted = MessageDeleted {
            message_id: message.id,
            conversation_id: conversation.id,
            deleted_by: user_id,
            timestamp: utils::now(),
        };
        self.broadcast(&conversation, Some(user_id), |_| {
            ServerEvent::new(events::MESSAGE_DELETED, &deleted)
        });

        Ok(deleted)
    }

    pub async fn list_messages(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Vec<MessageView>, error::SystemError> {
        let conversation = self.accessible_conversation(&user_id, &conversation_id).await?;
        let messages = self.messages.find_by_conversation(&conversation.id).await?;

        Ok(messages.iter().map(|m| MessageView::project(m, &user_id)).collect())
    }

    async fn unread_of(
        &self,
        conversation: &ConversationEntity,
        viewer_id: &Uuid,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        let anchor = if conversation.is_group() {
            self.conversations.last_added_at(&conversation.id, viewer_id).await?
        } else {
            None
        };

        let candidates =
            self.messages.find_unread_candidates(&conversation.id, viewer_id, anchor).await?;

        Ok(unread::unread_messages(&candidates, viewer_id, conversation._type, anchor)
            .cloned()
            .collect())
    }

    pub async fn unread_count(
        &self,
        conversation: &ConversationEntity,
        viewer_id: &Uuid,
    ) -> Result<usize, error::SystemError> {
        Ok(self.unread_of(conversation, viewer_id).await?.len())
    }

    pub async fn mark_read(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<MessageStatusUpdate, error::SystemError> {
        let conversation = self.accessible_conversation(&user_id, &conversation_id).await?;
        let unread = self.unread_of(&conversation, &user_id).await?;

        let read_at = utils::now();
        let mut message_ids = Vec::with_capacity(unread.len());
        let mut cached = None;

        for message in &unread {
            let updated = self
                .messages
                .modify(&message.id, &mut |message| {
                    message.mark_seen_by(user_id, read_at);
                    Ok(())
                })
                .await?;

            if conversation.last_message.as_ref().map(|m| m.id) == Some(updated.id) {
                cached = Some(updated.clone());
            }
            message_ids.push(updated.id);
        }

        if let Some(updated) = cached {
            self.refresh_cached_message(&updated).await?;
        }

        let update = MessageStatusUpdate {
            conversation_id,
            message_ids,
            reader_id: user_id,
            status: MessageStatus::Seen,
            read_at,
        };

        if !update.message_ids.is_empty() {
            tracing::debug!(
                "User {} read {} messages in {}",
                user_id,
                update.message_ids.len(),
                conversation_id
            );
            self.broadcast(&conversation, Some(user_id), |_| {
                ServerEvent::new(events::MESSAGE_STATUS_UPDATE, &update)
            });
        }

        Ok(update)
    }
}

fn non_blank(content: &str) -> Result<String, error::SystemError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(error::SystemError::bad_request("Message content cannot be empty"));
    }
    Ok(trimmed.to_string())
}
