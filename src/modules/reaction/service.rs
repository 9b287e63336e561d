use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        message::{
            schema::{MessageEntity, MessageType},
            service::MessageService,
        },
        reaction::{
            model::{LedgerOutcome, ReactionAction, ReactionRequest, ReactionSummary, ReactionUpdate},
            repository::ReactionRepository,
        },
        websocket::message::{self as events, ServerEvent},
    },
};

/// Reaction Ledger
///
/// Mỗi (message, user, icon) có tối đa một row. Aggregate của một icon là số user distinct
/// đã react icon đó trên message.
#[derive(Clone)]
pub struct ReactionLedger {
    repo: Arc<dyn ReactionRepository>,
}

impl ReactionLedger {
    pub fn new(repo: Arc<dyn ReactionRepository>) -> Self {
        Self { repo }
    }

    pub async fn add(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<LedgerOutcome, error::SystemError> {
        if self.repo.find(message_id, user_id, icon).await?.is_some() {
            let count = self.repo.count_users(message_id, icon).await?;
            return Ok(LedgerOutcome { count, added: false, changed: false });
        }

        match self.repo.insert_if_absent(message_id, user_id, icon).await? {
            Some(reaction) => Ok(LedgerOutcome { count: reaction.count, added: true, changed: true }),
            // Request song song của cùng user đã insert trước
            None => {
                let count = self.repo.count_users(message_id, icon).await?;
                Ok(LedgerOutcome { count, added: false, changed: false })
            }
        }
    }

    pub async fn remove(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<LedgerOutcome, error::SystemError> {
        let changed = self.repo.delete(message_id, user_id, icon).await?;
        Ok(LedgerOutcome { count: 0, added: false, changed })
    }

    pub async fn toggle(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        icon: &str,
    ) -> Result<LedgerOutcome, error::SystemError> {
        if self.repo.find(message_id, user_id, icon).await?.is_some() {
            self.remove(message_id, user_id, icon).await
        } else {
            self.add(message_id, user_id, icon).await
        }
    }

    /// Nhóm theo icon, icon được react đầu tiên đứng trước. `reacted_by_me` chưa được set,
    /// dùng `ReactionSummary::for_viewer` cho từng viewer.
    pub async fn aggregate(&self, message_id: &Uuid) -> Result<Vec<ReactionSummary>, error::SystemError> {
        let reactions = self.repo.find_by_message(message_id).await?;

        let mut summary: Vec<ReactionSummary> = Vec::new();
        for reaction in reactions {
            let found = summary.iter().position(|s| s.icon == reaction.icon);
            let entry = match found {
                Some(idx) => &mut summary[idx],
                None => {
                    summary.push(ReactionSummary {
                        icon: reaction.icon.clone(),
                        count: 0,
                        user_ids: vec![],
                        reacted_by_me: false,
                    });
                    let last = summary.len() - 1;
                    &mut summary[last]
                }
            };

            if !entry.user_ids.contains(&reaction.user_id) {
                entry.user_ids.push(reaction.user_id);
                entry.count = entry.user_ids.len();
            }
        }

        Ok(summary)
    }

    pub async fn summary(
        &self,
        message_id: &Uuid,
        viewer_id: &Uuid,
    ) -> Result<Vec<ReactionSummary>, error::SystemError> {
        Ok(ReactionSummary::for_viewer(&self.aggregate(message_id).await?, viewer_id))
    }
}

#[derive(Clone)]
pub struct ReactionService {
    ledger: ReactionLedger,
    messages: Arc<MessageService>,
}

impl ReactionService {
    pub fn with_dependencies(ledger: ReactionLedger, messages: Arc<MessageService>) -> Self {
        ReactionService { ledger, messages }
    }

    pub async fn react(
        &self,
        user_id: Uuid,
        req: ReactionRequest,
        action: ReactionAction,
    ) -> Result<ReactionUpdate, error::SystemError> {
        let icon = req.icon.trim();
        if icon.is_empty() {
            return Err(error::SystemError::bad_request("Reaction icon cannot be empty"));
        }

        let message = self.messages.load_message(&req.message_id).await?;
        let conversation = self.messages.load_conversation(&message.conversation_id).await?;
        let actor = MessageService::require_participant(&conversation, &user_id)?.clone();

        let outcome = match action {
            ReactionAction::Add => self.ledger.add(&message.id, &user_id, icon).await?,
            ReactionAction::Remove => self.ledger.remove(&message.id, &user_id, icon).await?,
            ReactionAction::Toggle => self.ledger.toggle(&message.id, &user_id, icon).await?,
        };

        // Một lần đọc ledger cho cả reply lẫn mọi viewer
        let aggregate = self.ledger.aggregate(&message.id).await?;

        if outcome.changed {
            let body = if outcome.added {
                format!("{} reacted {icon}", actor.display_name())
            } else {
                format!("{} removed reaction {icon}", actor.display_name())
            };
            let notice =
                MessageEntity::new(conversation.id, Some(actor), MessageType::SystemReaction, body);
            let (notice, conversation) = self.messages.post(notice).await?;
            self.messages.broadcast_message(&conversation, events::MESSAGE, &notice, Some(user_id));

            let mut updates = HashMap::new();
            for participant in conversation.participants.iter().filter(|p| p.user_id != user_id) {
                updates.insert(
                    participant.user_id,
                    ReactionUpdate {
                        message_id: message.id,
                        conversation_id: conversation.id,
                        icon: icon.to_string(),
                        count: outcome.count,
                        added: outcome.added,
                        reactions: ReactionSummary::for_viewer(&aggregate, &participant.user_id),
                    },
                );
            }
            self.messages.broadcast(&conversation, Some(user_id), |viewer| {
                ServerEvent::new(events::REACTION_UPDATE, updates.get(viewer))
            });
        }

        Ok(ReactionUpdate {
            message_id: message.id,
            conversation_id: conversation.id,
            icon: icon.to_string(),
            count: outcome.count,
            added: outcome.added,
            reactions: ReactionSummary::for_viewer(&aggregate, &user_id),
        })
    }

    pub async fn summary(
        &self,
        user_id: Uuid,
        message_id: Uuid,
    ) -> Result<Vec<ReactionSummary>, error::SystemError> {
        let message = self.messages.load_message(&message_id).await?;
        self.messages.accessible_conversation(&user_id, &message.conversation_id).await?;
        self.ledger.summary(&message_id, &user_id).await
    }
}
