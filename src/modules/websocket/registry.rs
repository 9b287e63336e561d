/// Session Registry
///
/// State của Connection Gateway: session nào thuộc user nào, và mỗi session đang xem
/// conversation nào. Chỉ được truy cập bên trong WebSocketServer actor nên không cần lock.
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub struct SessionEntry<R> {
    pub recipient: R,
    pub user_id: Option<Uuid>,
    pub current_conversation_id: Option<Uuid>,
}

/// Kết quả khi xóa session
#[derive(Debug, PartialEq, Eq)]
pub struct Removed {
    pub user_id: Option<Uuid>,
    /// User không còn session nào
    pub last_session: bool,
}

pub struct SessionRegistry<R> {
    sessions: HashMap<Uuid, SessionEntry<R>>,
    /// Map: user_id -> set of session_ids (multi-device)
    users: HashMap<Uuid, HashSet<Uuid>>,
}

impl<R> Default for SessionRegistry<R> {
    fn default() -> Self {
        Self { sessions: HashMap::new(), users: HashMap::new() }
    }
}

impl<R> SessionRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, session_id: Uuid, recipient: R) {
        self.sessions.insert(
            session_id,
            SessionEntry { recipient, user_id: None, current_conversation_id: None },
        );
    }

    pub fn lookup(&self, session_id: &Uuid) -> Option<&SessionEntry<R>> {
        self.sessions.get(session_id)
    }

    /// Gắn user cho session. Trả về `true` nếu đây là session đầu tiên của user.
    pub fn authenticate(&mut self, session_id: Uuid, user_id: Uuid) -> bool {
        let Some(entry) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        entry.user_id = Some(user_id);

        let sessions = self.users.entry(user_id).or_default();
        sessions.insert(session_id);
        sessions.len() == 1
    }

    pub fn delete(&mut self, session_id: &Uuid) -> Option<Removed> {
        let entry = self.sessions.remove(session_id)?;
        let Some(user_id) = entry.user_id else {
            return Some(Removed { user_id: None, last_session: false });
        };

        let last_session = match self.users.get_mut(&user_id) {
            Some(sessions) => {
                sessions.remove(session_id);
                sessions.is_empty()
            }
            None => true,
        };
        if last_session {
            self.users.remove(&user_id);
        }

        Some(Removed { user_id: Some(user_id), last_session })
    }

    pub fn join(&mut self, session_id: &Uuid, conversation_id: Uuid) {
        if let Some(entry) = self.sessions.get_mut(session_id) {
            entry.current_conversation_id = Some(conversation_id);
        }
    }

    /// Chỉ rời nếu session đang xem đúng conversation đó
    pub fn leave(&mut self, session_id: &Uuid, conversation_id: &Uuid) {
        if let Some(entry) = self.sessions.get_mut(session_id) {
            if entry.current_conversation_id.as_ref() == Some(conversation_id) {
                entry.current_conversation_id = None;
            }
        }
    }

    pub fn recipients_of<'a>(&'a self, user_id: &Uuid) -> impl Iterator<Item = &'a R> + 'a {
        self.users
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.sessions.get(id))
            .map(|entry| &entry.recipient)
    }

    pub fn viewers(&self, conversation_id: &Uuid) -> Vec<Uuid> {
        let viewers: HashSet<Uuid> = self
            .sessions
            .values()
            .filter(|e| e.current_conversation_id.as_ref() == Some(conversation_id))
            .filter_map(|e| e.user_id)
            .collect();
        viewers.into_iter().collect()
    }

    pub fn is_online(&self, user_id: &Uuid) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_device_last_session() {
        let mut registry = SessionRegistry::new();
        let user = Uuid::now_v7();
        let (s1, s2) = (Uuid::now_v7(), Uuid::now_v7());

        registry.create(s1, "phone");
        registry.create(s2, "desktop");
        assert!(registry.authenticate(s1, user));
        assert!(!registry.authenticate(s2, user));
        assert_eq!(registry.recipients_of(&user).count(), 2);

        assert_eq!(
            registry.delete(&s1),
            Some(Removed { user_id: Some(user), last_session: false })
        );
        assert!(registry.is_online(&user));
        assert_eq!(registry.delete(&s2), Some(Removed { user_id: Some(user), last_session: true }));
        assert!(!registry.is_online(&user));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_unauthenticated_session_has_no_user() {
        let mut registry = SessionRegistry::new();
        let s = Uuid::now_v7();
        registry.create(s, ());

        assert_eq!(registry.lookup(&s).and_then(|e| e.user_id), None);
        assert_eq!(registry.delete(&s), Some(Removed { user_id: None, last_session: false }));
        assert_eq!(registry.delete(&s), None);
    }

    #[test]
    fn test_viewers_follow_current_conversation() {
        let mut registry = SessionRegistry::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let (sa, sb) = (Uuid::now_v7(), Uuid::now_v7());
        let (c1, c2) = (Uuid::now_v7(), Uuid::now_v7());

        registry.create(sa, ());
        registry.create(sb, ());
        registry.authenticate(sa, a);
        registry.authenticate(sb, b);

        registry.join(&sa, c1);
        registry.join(&sb, c1);
        let mut viewers = registry.viewers(&c1);
        viewers.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(viewers, expected);

        // Join conversation khác thay thế conversation đang xem
        registry.join(&sb, c2);
        assert_eq!(registry.viewers(&c1), vec![a]);

        // Leave sai conversation không có tác dụng
        registry.leave(&sa, &c2);
        assert_eq!(registry.viewers(&c1), vec![a]);
        registry.leave(&sa, &c1);
        assert!(registry.viewers(&c1).is_empty());
    }
}
