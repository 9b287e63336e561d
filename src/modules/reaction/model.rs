use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    pub message_id: Uuid,
    #[validate(length(min = 1, max = 32))]
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionAction {
    Add,
    Remove,
    Toggle,
}

/// Kết quả thao tác trên ledger: aggregate sau thao tác và có thay đổi hay không
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerOutcome {
    pub count: i64,
    pub added: bool,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSummary {
    pub icon: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
    pub reacted_by_me: bool,
}

impl ReactionSummary {
    pub fn for_viewer(aggregate: &[ReactionSummary], viewer_id: &Uuid) -> Vec<ReactionSummary> {
        aggregate
            .iter()
            .map(|s| ReactionSummary { reacted_by_me: s.user_ids.contains(viewer_id), ..s.clone() })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUpdate {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub icon: String,
    pub count: i64,
    pub added: bool,
    pub reactions: Vec<ReactionSummary>,
}
