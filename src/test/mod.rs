#![allow(dead_code)]
//! In-memory backends và fakes cho service-level tests.
//!
//! Repositories giữ đúng contract của bản Postgres: `replace` kiểm tra `version` và tăng
//! lên 1, `insert_if_absent` tính count theo số user distinct.

mod session;

use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use uuid::Uuid;

use crate::{
    api::error,
    clients::{NotificationDispatch, Profile, ProfileLookup, RealtimeNotification},
    modules::{
        conversation::{
            repository::ConversationRepository,
            schema::{ConversationEntity, ConversationType},
            service::ConversationService,
        },
        message::{repository::MessageRepository, schema::MessageEntity, service::MessageService},
        reaction::{
            repository::ReactionRepository,
            schema::ReactionEntity,
            service::{ReactionLedger, ReactionService},
        },
        websocket::{fanout::Fanout, message::ServerEvent},
    },
    utils,
};

#[derive(Default)]
pub struct InMemoryConversations {
    rows: Mutex<HashMap<Uuid, ConversationEntity>>,
    added_at: Mutex<HashMap<(Uuid, Uuid), DateTime<Utc>>>,
    /// Số lần `replace` kế tiếp sẽ bị từ chối như thể có writer khác
    pending_conflicts: AtomicUsize,
    /// Thay đổi của writer khác, commit ngay trước `replace` kế tiếp
    pending_write: Mutex<Option<Box<dyn FnOnce(&mut ConversationEntity) + Send>>>,
}

impl InMemoryConversations {
    pub fn inject_conflicts(&self, n: usize) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    pub fn inject_write(&self, write: impl FnOnce(&mut ConversationEntity) + Send + 'static) {
        *self.pending_write.lock().unwrap() = Some(Box::new(write));
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversations {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        Ok(self.rows.lock().unwrap().get(conversation_id).cloned())
    }

    async fn find_by_participant(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationEntity>, error::SystemError> {
        Ok(self.rows.lock().unwrap().values().filter(|c| c.is_participant(user_id)).cloned().collect())
    }

    async fn find_or_create_direct(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<(ConversationEntity, bool), error::SystemError> {
        let mut rows = self.rows.lock().unwrap();
        let existing = rows.values().find(|c| {
            c._type == ConversationType::Direct && c.participants_hash == conversation.participants_hash
        });
        if let Some(existing) = existing {
            return Ok((existing.clone(), false));
        }
        rows.insert(conversation.id, conversation.clone());
        Ok((conversation.clone(), true))
    }

    async fn insert(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<ConversationEntity, error::SystemError> {
        self.rows.lock().unwrap().insert(conversation.id, conversation.clone());
        Ok(conversation.clone())
    }

    async fn replace(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<ConversationEntity, error::SystemError> {
        let injected = self
            .pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let write = self.pending_write.lock().unwrap().take();

        let mut rows = self.rows.lock().unwrap();
        let stored = rows
            .get_mut(&conversation.id)
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        if let Some(write) = write {
            write(stored);
            stored.version += 1;
        }
        if injected {
            // Writer khác vừa commit trước
            stored.version += 1;
        }
        if stored.version != conversation.version {
            return Err(error::SystemError::concurrency_conflict("Conversation version mismatch"));
        }

        let mut updated = conversation.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn record_members_added(
        &self,
        conversation_id: &Uuid,
        user_ids: &[Uuid],
        added_at: DateTime<Utc>,
    ) -> Result<(), error::SystemError> {
        let mut events = self.added_at.lock().unwrap();
        for user_id in user_ids {
            let entry = events.entry((*conversation_id, *user_id)).or_insert(added_at);
            *entry = (*entry).max(added_at);
        }
        Ok(())
    }

    async fn last_added_at(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<DateTime<Utc>>, error::SystemError> {
        Ok(self.added_at.lock().unwrap().get(&(*conversation_id, *user_id)).copied())
    }
}

#[derive(Default)]
pub struct InMemoryMessages {
    rows: Mutex<Vec<MessageEntity>>,
}

impl InMemoryMessages {
    pub fn in_conversation(&self, conversation_id: &Uuid) -> Vec<MessageEntity> {
        self.rows.lock().unwrap().iter().filter(|m| &m.conversation_id == conversation_id).cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessages {
    async fn insert(&self, message: &MessageEntity) -> Result<MessageEntity, error::SystemError> {
        self.rows.lock().unwrap().push(message.clone());
        Ok(message.clone())
    }

    async fn find_by_id(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        Ok(self.rows.lock().unwrap().iter().find(|m| &m.id == message_id).cloned())
    }

    async fn find_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        Ok(self.in_conversation(conversation_id))
    }

    async fn find_unread_candidates(
        &self,
        conversation_id: &Uuid,
        viewer_id: &Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        Ok(self
            .in_conversation(conversation_id)
            .into_iter()
            .filter(|m| !m.is_sent_by(viewer_id))
            .filter(|m| since.map_or(true, |since| m.created_at >= since))
            .collect())
    }

    async fn find_latest(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        Ok(self.in_conversation(conversation_id).into_iter().max_by_key(|m| m.created_at))
    }

    async fn replace(&self, message: &MessageEntity) -> Result<MessageEntity, error::SystemError> {
        let mut rows = self.rows.lock().unwrap();
        let stored = rows
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;
        if stored.version != message.version {
            return Err(error::SystemError::concurrency_conflict("Message version mismatch"));
        }

        let mut updated = message.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| &m.id != message_id);
        Ok(rows.len() != before)
    }
}

#[derive(Default)]
pub struct InMemoryReactions {
    rows: Mutex<Vec<ReactionEntity>>,
    /// Số lần `find_by_message` được gọi
    pub lookups: AtomicUsize,
}

#[async_trait::async_trait]
impl ReactionRepository for InMemoryReactions {
    async fn find(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<Option<ReactionEntity>, error::SystemError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| &r.message_id == message_id && &r.user_id == user_id && r.icon == icon)
            .cloned())
    }

    async fn insert_if_absent(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<Option<ReactionEntity>, error::SystemError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| &r.message_id == message_id && &r.user_id == user_id && r.icon == icon) {
            return Ok(None);
        }

        let users = rows.iter().filter(|r| &r.message_id == message_id && r.icon == icon).count();
        let now = utils::now();
        let reaction = ReactionEntity {
            message_id: *message_id,
            user_id: *user_id,
            icon: icon.to_string(),
            count: users as i64 + 1,
            created_at: now,
            modified_at: now,
        };
        rows.push(reaction.clone());
        Ok(Some(reaction))
    }

    async fn count_users(&self, message_id: &Uuid, icon: &str) -> Result<i64, error::SystemError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|r| &r.message_id == message_id && r.icon == icon).count() as i64)
    }

    async fn delete(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<bool, error::SystemError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !(&r.message_id == message_id && &r.user_id == user_id && r.icon == icon));
        Ok(rows.len() != before)
    }

    async fn find_by_message(
        &self,
        message_id: &Uuid,
    ) -> Result<Vec<ReactionEntity>, error::SystemError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().unwrap().iter().filter(|r| &r.message_id == message_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct FakeProfiles {
    profiles: Mutex<HashMap<Uuid, Profile>>,
    pub unavailable: AtomicBool,
}

impl FakeProfiles {
    pub fn register(&self, first_name: &str) -> Uuid {
        let user_id = Uuid::now_v7();
        let profile = Profile {
            user_id,
            username: first_name.to_lowercase(),
            first_name: Some(first_name.to_string()),
            last_name: None,
            avatar: None,
            department: None,
            position: None,
            seniority: None,
            role: None,
        };
        self.profiles.lock().unwrap().insert(user_id, profile);
        user_id
    }
}

#[async_trait::async_trait]
impl ProfileLookup for FakeProfiles {
    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, error::SystemError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(error::SystemError::dependent_service("Profile service unavailable"));
        }
        self.profiles
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| error::SystemError::not_found(format!("User {user_id} not found")))
    }
}

#[derive(Default)]
pub struct RecordingNotifications {
    pub sent: Mutex<Vec<RealtimeNotification>>,
    pub unavailable: AtomicBool,
    /// Ghi nhận rồi treo mãi, như một service không trả lời
    pub stalled: AtomicBool,
}

#[async_trait::async_trait]
impl NotificationDispatch for RecordingNotifications {
    async fn send_realtime_notification(
        &self,
        notification: RealtimeNotification,
    ) -> Result<(), error::SystemError> {
        self.sent.lock().unwrap().push(notification);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(error::SystemError::dependent_service("Notification service unavailable"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingFanout {
    sent: Mutex<Vec<(Uuid, ServerEvent)>>,
    viewers: Mutex<HashMap<Uuid, Vec<Uuid>>>,
}

impl RecordingFanout {
    pub fn set_viewers(&self, conversation_id: Uuid, users: Vec<Uuid>) {
        self.viewers.lock().unwrap().insert(conversation_id, users);
    }

    /// Events `user_id` nhận được có tên `event`
    pub fn received(&self, user_id: &Uuid, event: &str) -> Vec<ServerEvent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, e)| to == user_id && e.event == event)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn recipients_of(&self, event: &str) -> Vec<Uuid> {
        self.sent.lock().unwrap().iter().filter(|(_, e)| e.event == event).map(|(to, _)| *to).collect()
    }

    pub fn total(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl Fanout for RecordingFanout {
    fn send_to_user(&self, user_id: Uuid, event: ServerEvent) {
        self.sent.lock().unwrap().push((user_id, event));
    }

    async fn viewing_users(&self, conversation_id: Uuid) -> Vec<Uuid> {
        self.viewers.lock().unwrap().get(&conversation_id).cloned().unwrap_or_default()
    }
}

/// Toàn bộ service graph trên in-memory backends
pub struct Harness {
    pub conversation_repo: Arc<InMemoryConversations>,
    pub message_repo: Arc<InMemoryMessages>,
    pub reaction_repo: Arc<InMemoryReactions>,
    pub profiles: Arc<FakeProfiles>,
    pub notifications: Arc<RecordingNotifications>,
    pub fanout: Arc<RecordingFanout>,
    pub messages: Arc<MessageService>,
    pub conversations: Arc<ConversationService>,
    pub reactions: Arc<ReactionService>,
}

impl Harness {
    pub fn new() -> Self {
        let conversation_repo = Arc::new(InMemoryConversations::default());
        let message_repo = Arc::new(InMemoryMessages::default());
        let reaction_repo = Arc::new(InMemoryReactions::default());
        let profiles = Arc::new(FakeProfiles::default());
        let notifications = Arc::new(RecordingNotifications::default());
        let fanout = Arc::new(RecordingFanout::default());

        let messages = Arc::new(MessageService::with_dependencies(
            message_repo.clone(),
            conversation_repo.clone(),
            fanout.clone(),
        ));
        let conversations = Arc::new(ConversationService::with_dependencies(
            conversation_repo.clone(),
            messages.clone(),
            profiles.clone(),
            notifications.clone(),
        ));
        let reactions = Arc::new(ReactionService::with_dependencies(
            ReactionLedger::new(reaction_repo.clone()),
            messages.clone(),
        ));

        Harness {
            conversation_repo,
            message_repo,
            reaction_repo,
            profiles,
            notifications,
            fanout,
            messages,
            conversations,
            reactions,
        }
    }

    pub fn user(&self, first_name: &str) -> Uuid {
        self.profiles.register(first_name)
    }

    /// Cho background hooks (notifications) chạy xong
    pub async fn settle(&self) {
        actix_web::rt::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    pub fn notified(&self) -> Vec<Uuid> {
        self.notifications.sent.lock().unwrap().iter().map(|n| n.recipient).collect()
    }

    pub async fn stored(&self, conversation_id: &Uuid) -> ConversationEntity {
        self.conversation_repo.find_by_id(conversation_id).await.unwrap().unwrap()
    }
}
