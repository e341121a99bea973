//! In-memory conversation store.
//!
//! Each session owns an ordered message history plus a turn lock. The
//! registry lock is only held long enough to find or create a session slot,
//! so distinct sessions never wait on each other.

use crate::error::ChatError;
use crate::message::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
struct SessionSlot {
    history: Mutex<Vec<Message>>,
    turn: Arc<AsyncMutex<()>>,
}

/// Held for the duration of one turn; other turns on the same session wait.
#[derive(Debug)]
pub struct TurnGuard {
    session_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl TurnGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Per-session message histories, kept for the lifetime of the process.
#[derive(Default)]
pub struct ConversationStore {
    sessions: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, session_id: &str) -> Option<Arc<SessionSlot>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    fn slot_or_create(&self, session_id: &str) -> Result<Arc<SessionSlot>, ChatError> {
        validate_session_id(session_id)?;
        if let Some(slot) = self.slot(session_id) {
            return Ok(slot);
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id, "creating session");
                Arc::default()
            })
            .clone())
    }

    /// Append a message to the end of a session, creating the session if needed.
    pub fn append(&self, session_id: &str, message: Message) -> Result<(), ChatError> {
        let slot = self.slot_or_create(session_id)?;
        slot.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }

    /// The last `limit` messages (all when `None`), oldest first.
    ///
    /// Unknown sessions yield an empty history.
    pub fn get_history(&self, session_id: &str, limit: Option<usize>) -> Vec<Message> {
        let Some(slot) = self.slot(session_id) else {
            return Vec::new();
        };
        let history = slot.history.lock().unwrap_or_else(PoisonError::into_inner);
        let start = limit.map_or(0, |n| history.len().saturating_sub(n));
        history[start..].to_vec()
    }

    /// Remove every message from a session. Clearing twice is harmless.
    pub fn clear(&self, session_id: &str) {
        if let Some(slot) = self.slot(session_id) {
            slot.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }

    /// Wait for exclusive use of a session for one turn.
    pub async fn lock_turn(&self, session_id: &str) -> Result<TurnGuard, ChatError> {
        let slot = self.slot_or_create(session_id)?;
        let guard = slot.turn.clone().lock_owned().await;
        Ok(TurnGuard {
            session_id: session_id.to_string(),
            _guard: guard,
        })
    }

    pub fn message_count(&self, session_id: &str) -> usize {
        self.slot(session_id).map_or(0, |slot| {
            slot.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        })
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session, returning how many there were.
    pub fn drain(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let count = sessions.len();
        sessions.clear();
        count
    }
}

pub(crate) fn validate_session_id(session_id: &str) -> Result<(), ChatError> {
    if session_id.is_empty() {
        return Err(ChatError::InvalidSession(
            "session id must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use std::time::Duration;

    #[test]
    fn test_history_preserves_append_order() {
        let store = ConversationStore::new();
        for i in 0..5 {
            store.append("s1", Message::user(format!("q{i}"))).unwrap();
            store.append("s1", Message::assistant(format!("a{i}"))).unwrap();
        }

        let history = store.get_history("s1", None);
        assert_eq!(history.len(), 10);
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[0], "q0");
        assert_eq!(contents[1], "a0");
        assert_eq!(contents[9], "a4");
    }

    #[test]
    fn test_history_limit_returns_most_recent() {
        let store = ConversationStore::new();
        for i in 0..4 {
            store.append("s1", Message::user(format!("m{i}"))).unwrap();
        }

        let last_two = store.get_history("s1", Some(2));
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].content, "m2");
        assert_eq!(last_two[1].content, "m3");

        assert_eq!(store.get_history("s1", Some(10)).len(), 4);
        assert!(store.get_history("s1", Some(0)).is_empty());
    }

    #[test]
    fn test_unknown_session_is_empty() {
        let store = ConversationStore::new();
        assert!(store.get_history("nobody", None).is_empty());
        assert_eq!(store.message_count("nobody"), 0);
    }

    #[test]
    fn test_empty_session_id_rejected() {
        let store = ConversationStore::new();
        let err = store.append("", Message::user("hi")).unwrap_err();
        assert!(matches!(err, ChatError::InvalidSession(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = ConversationStore::new();
        store.append("s1", Message::user("hi")).unwrap();
        store.clear("s1");
        store.clear("s1");
        store.clear("never-created");
        assert!(store.get_history("s1", None).is_empty());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = ConversationStore::new();
        store.append("a", Message::user("for a")).unwrap();
        store.append("b", Message::user("for b")).unwrap();
        store.clear("a");

        assert!(store.get_history("a", None).is_empty());
        let b = store.get_history("b", None);
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].role, Role::User);
        assert_eq!(store.session_ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_turn_lock_is_per_session() {
        let store = ConversationStore::new();
        let _a = store.lock_turn("a").await.unwrap();

        // A different session is not blocked by the held guard.
        let b = tokio::time::timeout(Duration::from_millis(100), store.lock_turn("b")).await;
        assert!(b.is_ok());

        // The same session is.
        let again = tokio::time::timeout(Duration::from_millis(50), store.lock_turn("a")).await;
        assert!(again.is_err());
    }

    #[test]
    fn test_drain_drops_everything() {
        let store = ConversationStore::new();
        store.append("a", Message::user("x")).unwrap();
        store.append("b", Message::user("y")).unwrap();
        assert_eq!(store.drain(), 2);
        assert!(store.is_empty());
    }
}
