use futures_util::future::try_join_all;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use crate::{
    api::error,
    clients::{NotificationDispatch, ProfileLookup, RealtimeNotification},
    constants::CHAT_GROUP_ADDED,
    modules::{
        conversation::{
            model::{
                ConversationView, CreateGroupRequest, EditGroupInfoRequest, MemberLeft,
                MembershipUpdate, ParticipantsRequest,
            },
            repository::ConversationRepository,
            schema::{ConversationEntity, ParticipantSnapshot},
        },
        message::{
            schema::{MembershipChange, MessageEntity, MessageType, Reader},
            service::MessageService,
        },
        websocket::message::{self as events, ServerEvent},
    },
    utils::PostCommit,
};

#[derive(Clone)]
pub struct ConversationService {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<MessageService>,
    profiles: Arc<dyn ProfileLookup>,
    notifications: Arc<dyn NotificationDispatch>,
}

impl ConversationService {
    pub fn with_dependencies(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<MessageService>,
        profiles: Arc<dyn ProfileLookup>,
        notifications: Arc<dyn NotificationDispatch>,
    ) -> Self {
        ConversationService { conversations, messages, profiles, notifications }
    }

    /// Lấy profiles đồng thời, một lỗi là fail cả batch
    async fn snapshots(&self, user_ids: &[Uuid]) -> Result<Vec<ParticipantSnapshot>, error::SystemError> {
        let profiles = try_join_all(user_ids.iter().map(|id| self.profiles.get_profile(*id))).await?;
        Ok(profiles.into_iter().map(ParticipantSnapshot::from).collect())
    }

    async fn project(
        &self,
        conversation: &ConversationEntity,
        viewer_id: &Uuid,
    ) -> Result<ConversationView, error::SystemError> {
        let unread = self.messages.unread_count(conversation, viewer_id).await?;
        Ok(ConversationView::project(conversation, viewer_id, unread))
    }

    fn require_group(conversation: &ConversationEntity) -> Result<(), error::SystemError> {
        if !conversation.is_group() {
            return Err(error::SystemError::bad_request("This operation requires a group conversation"));
        }
        Ok(())
    }

    fn group_added_hooks(
        &self,
        conversation: &ConversationEntity,
        actor: &ParticipantSnapshot,
        members: &[ParticipantSnapshot],
    ) -> PostCommit {
        let mut hooks = PostCommit::new();
        let group_name = conversation.group_name_or_default();

        for member in members {
            let notification = group_added_notification(
                member,
                conversation.id,
                &group_name,
                &actor.display_name(),
            );
            let dispatch = self.notifications.clone();
            hooks.add(format!("{CHAT_GROUP_ADDED} -> {}", member.user_id), async move {
                dispatch.send_realtime_notification(notification).await
            });
        }
        hooks
    }

    pub async fn create_direct(
        &self,
        user_id: Uuid,
        participant_id: Uuid,
    ) -> Result<ConversationView, error::SystemError> {
        if user_id == participant_id {
            return Err(error::SystemError::bad_request("Cannot create a conversation with yourself"));
        }

        let mut snapshots = self.snapshots(&[user_id, participant_id]).await?.into_iter();
        let (Some(me), Some(other)) = (snapshots.next(), snapshots.next()) else {
            return Err(error::SystemError::dependent_service("Profile lookup returned no result"));
        };

        let (conversation, created) = self
            .conversations
            .find_or_create_direct(&ConversationEntity::new_direct(me, other))
            .await?;

        if created {
            tracing::info!("Direct conversation {} created by {}", conversation.id, user_id);
        }

        self.project(&conversation, &user_id).await
    }

    pub async fn create_group(
        &self,
        user_id: Uuid,
        req: CreateGroupRequest,
    ) -> Result<ConversationView, error::SystemError> {
        let group_name = req.group_name.trim().to_string();
        if group_name.is_empty() {
            return Err(error::SystemError::bad_request("Group name cannot be empty"));
        }

        let mut member_ids: Vec<Uuid> = Vec::new();
        for id in req.participant_ids {
            if id != user_id && !member_ids.contains(&id) {
                member_ids.push(id);
            }
        }
        if member_ids.is_empty() {
            return Err(error::SystemError::bad_request(
                "A group needs at least one other participant",
            ));
        }

        let ids: Vec<Uuid> = std::iter::once(user_id).chain(member_ids.iter().copied()).collect();
        let participants = self.snapshots(&ids).await?;
        let creator = participants[0].clone();
        let members = participants[1..].to_vec();

        let group_avatar = req.group_avatar.filter(|a| !a.trim().is_empty());
        let conversation = ConversationEntity::new_group(user_id, group_name, group_avatar, participants);
        let conversation = self.conversations.insert(&conversation).await?;

        let (_, conversation) = self.messages.post(MessageEntity::bootstrap(conversation.id)).await?;

        self.messages.broadcast(&conversation, Some(user_id), |viewer| {
            ServerEvent::new(
                events::NEW_GROUP_CONVERSATION,
                ConversationView::project(&conversation, viewer, 0),
            )
        });

        tracing::info!(
            "Group {} created by {} with {} members",
            conversation.id,
            user_id,
            conversation.participants.len()
        );

        self.group_added_hooks(&conversation, &creator, &members).spawn();

        self.project(&conversation, &user_id).await
    }

    pub async fn add_members(
        &self,
        user_id: Uuid,
        req: ParticipantsRequest,
    ) -> Result<ConversationView, error::SystemError> {
        let conversation = self.messages.load_conversation(&req.conversation_id).await?;
        Self::require_group(&conversation)?;
        let actor = MessageService::require_participant(&conversation, &user_id)?.clone();

        let mut candidates: Vec<Uuid> = Vec::new();
        for id in req.participant_ids {
            if !conversation.is_participant(&id) && !candidates.contains(&id) {
                candidates.push(id);
            }
        }
        if candidates.is_empty() {
            return Err(error::SystemError::bad_request(
                "All users are already members of this conversation",
            ));
        }

        // Profiles phải đủ trước khi persist bất cứ thứ gì
        let snapshots = self.snapshots(&candidates).await?;

        // Chỉ những user thực sự được append ở lần replace thành công
        let mut appended: Vec<Uuid> = Vec::new();
        let conversation = self
            .conversations
            .modify(&conversation.id, &mut |conversation| {
                appended.clear();
                for snapshot in &snapshots {
                    if !conversation.is_participant(&snapshot.user_id) {
                        conversation.participants.push(snapshot.clone());
                        appended.push(snapshot.user_id);
                    }
                }
                if appended.is_empty() {
                    return Err(error::SystemError::bad_request(
                        "All users are already members of this conversation",
                    ));
                }
                conversation.refresh_hash();
                conversation.touch();
                Ok(())
            })
            .await?;
        let added: Vec<ParticipantSnapshot> =
            snapshots.into_iter().filter(|s| appended.contains(&s.user_id)).collect();

        let change = MembershipChange {
            actor_id: user_id,
            actor_name: actor.display_name(),
            member_ids: appended.clone(),
            member_names: added.iter().map(ParticipantSnapshot::display_name).collect(),
            group_name: conversation.group_name_or_default(),
        };
        let mut notice =
            MessageEntity::membership(conversation.id, MessageType::SystemAddMembers, &change)?;
        // Actor và members mới không có gì phải đọc ở message này
        for id in std::iter::once(user_id).chain(appended.iter().copied()) {
            if !notice.has_reader(&id) {
                notice.readers.push(Reader { user_id: id, read_at: notice.created_at });
            }
        }

        // Anchor phải có trước message, unread của member mới không bao giờ thấy history cũ
        self.conversations
            .record_members_added(&conversation.id, &appended, notice.created_at)
            .await?;
        let (notice, conversation) = self.messages.post(notice).await?;

        self.messages.broadcast(&conversation, Some(user_id), |viewer| {
            ServerEvent::new(
                events::PARTICIPANTS_ADDED,
                MembershipUpdate {
                    conversation_id: conversation.id,
                    actor_id: user_id,
                    member_ids: appended.clone(),
                    conversation: ConversationView::project(&conversation, viewer, 0),
                },
            )
        });
        self.messages.broadcast_message(&conversation, events::MESSAGE, &notice, Some(user_id));

        tracing::info!(
            "User {} added {} members to group {}",
            user_id,
            appended.len(),
            conversation.id
        );

        self.group_added_hooks(&conversation, &actor, &added).spawn();

        self.project(&conversation, &user_id).await
    }

    pub async fn remove_members(
        &self,
        user_id: Uuid,
        req: ParticipantsRequest,
    ) -> Result<ConversationView, error::SystemError> {
        let conversation = self.messages.load_conversation(&req.conversation_id).await?;
        Self::require_group(&conversation)?;
        let actor = MessageService::require_participant(&conversation, &user_id)?.clone();

        if req.participant_ids.contains(&user_id) {
            return Err(error::SystemError::forbidden(
                "You cannot remove yourself, use leave-group instead",
            ));
        }

        let mut removed: Vec<ParticipantSnapshot> = Vec::new();
        for id in &req.participant_ids {
            if let Some(p) = conversation.participant(id) {
                if !removed.iter().any(|r| &r.user_id == id) {
                    removed.push(p.clone());
                }
            }
        }
        if removed.is_empty() {
            return Err(error::SystemError::bad_request(
                "None of the users are members of this conversation",
            ));
        }

        let removed_ids: Vec<Uuid> = removed.iter().map(|p| p.user_id).collect();
        let conversation = self
            .conversations
            .modify(&conversation.id, &mut |conversation| {
                let remaining = conversation
                    .participants
                    .iter()
                    .filter(|p| !removed_ids.contains(&p.user_id))
                    .count();
                if remaining <= 1 {
                    return Err(error::SystemError::bad_request(
                        "A group must keep at least 2 members",
                    ));
                }

                conversation.participants.retain(|p| !removed_ids.contains(&p.user_id));
                conversation.refresh_hash();
                conversation.touch();
                Ok(())
            })
            .await?;

        let change = MembershipChange {
            actor_id: user_id,
            actor_name: actor.display_name(),
            member_ids: removed_ids.clone(),
            member_names: removed.iter().map(ParticipantSnapshot::display_name).collect(),
            group_name: conversation.group_name_or_default(),
        };
        let notice =
            MessageEntity::membership(conversation.id, MessageType::SystemRemoveMembers, &change)?;
        let (notice, conversation) = self.messages.post(notice).await?;

        let update_for = |viewer: &Uuid| {
            ServerEvent::new(
                events::PARTICIPANTS_REMOVED,
                MembershipUpdate {
                    conversation_id: conversation.id,
                    actor_id: user_id,
                    member_ids: removed_ids.clone(),
                    conversation: ConversationView::project(&conversation, viewer, 0),
                },
            )
        };
        self.messages.broadcast(&conversation, Some(user_id), &update_for);
        for id in &removed_ids {
            self.messages.notify(*id, update_for(id));
        }
        self.messages.broadcast_message(&conversation, events::MESSAGE, &notice, Some(user_id));

        tracing::info!(
            "User {} removed {} members from group {}",
            user_id,
            removed_ids.len(),
            conversation.id
        );

        self.project(&conversation, &user_id).await
    }

    pub async fn leave_group(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<MemberLeft, error::SystemError> {
        let conversation = self.messages.load_conversation(&conversation_id).await?;
        Self::require_group(&conversation)?;
        // Tên phải lấy trước khi user bị xóa khỏi participants
        let leaver = MessageService::require_participant(&conversation, &user_id)?.clone();

        let conversation = self
            .conversations
            .modify(&conversation.id, &mut |conversation| {
                conversation.participants.retain(|p| p.user_id != user_id);
                conversation.refresh_hash();
                conversation.touch();
                Ok(())
            })
            .await?;

        let change = MembershipChange {
            actor_id: user_id,
            actor_name: leaver.display_name(),
            member_ids: vec![user_id],
            member_names: vec![leaver.display_name()],
            group_name: conversation.group_name_or_default(),
        };
        let notice =
            MessageEntity::membership(conversation.id, MessageType::SystemLeaveGroup, &change)?;
        let (notice, conversation) = self.messages.post(notice).await?;

        let left = MemberLeft {
            conversation_id: conversation.id,
            user_id,
            user_name: leaver.display_name(),
        };
        self.messages.broadcast(&conversation, Some(user_id), |_| {
            ServerEvent::new(events::MEMBER_LEFT, &left)
        });
        self.messages.broadcast_message(&conversation, events::MESSAGE, &notice, Some(user_id));

        tracing::info!("User {} left group {}", user_id, conversation.id);
        Ok(left)
    }

    pub async fn edit_group_info(
        &self,
        user_id: Uuid,
        req: EditGroupInfoRequest,
    ) -> Result<ConversationView, error::SystemError> {
        let conversation = self.messages.load_conversation(&req.conversation_id).await?;
        Self::require_group(&conversation)?;
        let editor = MessageService::require_participant(&conversation, &user_id)?.clone();

        let name = req
            .group_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && Some(n) != conversation.group_name.as_ref());
        let avatar = req
            .group_avatar
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty() && Some(a) != conversation.group_avatar.as_ref());

        if name.is_none() && avatar.is_none() {
            return self.project(&conversation, &user_id).await;
        }

        let old_name = conversation.group_name_or_default();
        let conversation = self
            .conversations
            .modify(&conversation.id, &mut |conversation| {
                if let Some(name) = &name {
                    conversation.group_name = Some(name.clone());
                }
                if let Some(avatar) = &avatar {
                    conversation.group_avatar = Some(avatar.clone());
                }
                conversation.touch();
                Ok(())
            })
            .await?;

        let mut notices = Vec::new();
        if let Some(name) = &name {
            notices.push(MessageEntity::system(
                conversation.id,
                MessageType::SystemEditGroupName,
                format!("{} changed group name from \"{old_name}\" to \"{name}\"", editor.display_name()),
            ));
        }
        if avatar.is_some() {
            notices.push(MessageEntity::system(
                conversation.id,
                MessageType::SystemEditGroupAvatar,
                format!("{} changed group avatar", editor.display_name()),
            ));
        }

        let mut conversation = conversation;
        for notice in notices {
            let (notice, updated) = self.messages.post(notice).await?;
            self.messages.broadcast_message(&updated, events::MESSAGE, &notice, Some(user_id));
            conversation = updated;
        }

        self.messages.broadcast(&conversation, Some(user_id), |viewer| {
            ServerEvent::new(
                events::GROUP_INFO_UPDATED,
                ConversationView::project(&conversation, viewer, 0),
            )
        });

        tracing::info!("User {} edited info of group {}", user_id, conversation.id);
        self.project(&conversation, &user_id).await
    }

    pub async fn my_conversations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationView>, error::SystemError> {
        let conversations = self.conversations.find_by_participant(&user_id).await?;

        let mut views = Vec::with_capacity(conversations.len());
        for conversation in &conversations {
            views.push(self.project(conversation, &user_id).await?);
        }
        views.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

        Ok(views)
    }
}

fn group_added_notification(
    member: &ParticipantSnapshot,
    group_id: Uuid,
    group_name: &str,
    added_by: &str,
) -> RealtimeNotification {
    let param = HashMap::from([
        ("groupName".to_string(), serde_json::json!(group_name)),
        ("groupId".to_string(), serde_json::json!(group_id)),
        ("addedBy".to_string(), serde_json::json!(added_by)),
        ("userName".to_string(), serde_json::json!(member.display_name())),
    ]);
    let data = HashMap::from([
        ("type".to_string(), CHAT_GROUP_ADDED.to_string()),
        ("group_id".to_string(), group_id.to_string()),
        ("group_name".to_string(), group_name.to_string()),
        ("action".to_string(), "navigate_to_chat".to_string()),
    ]);

    RealtimeNotification {
        recipient: member.user_id,
        notification_type: CHAT_GROUP_ADDED.to_string(),
        title: "Added to Chat Group".to_string(),
        body: format!("You have been added to the chat group: {group_name}"),
        param,
        data,
    }
}
