//! In-memory conversation history.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use graphchat_types::ChatMessage;

type Log = Arc<Mutex<Vec<ChatMessage>>>;

/// Append-only message logs keyed by conversation id.
///
/// The map lock is held only to find or create a log; appends and reads then
/// lock that one log, so different conversations never wait on each other.
/// Logs live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct ConversationStore {
    logs: RwLock<HashMap<String, Log>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, conversation_id: &str, message: ChatMessage) {
        let log = self.log(conversation_id);
        log.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Messages of `conversation_id` in insertion order; empty when unknown.
    pub fn history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        let log = self
            .logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation_id)
            .cloned();
        match log {
            Some(log) => log.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            None => Vec::new(),
        }
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(conversation_id)
    }

    fn log(&self, conversation_id: &str) -> Log {
        if let Some(log) = self
            .logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation_id)
        {
            return Arc::clone(log);
        }
        let mut logs = self.logs.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(logs.entry(conversation_id.to_owned()).or_default())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_conversation_is_empty() {
        let store = ConversationStore::new();
        assert!(store.history("nope").is_empty());
        assert!(!store.contains("nope"));
    }

    #[test]
    fn preserves_insertion_order() {
        let store = ConversationStore::new();
        store.append("c1", ChatMessage::user("hi"));
        store.append("c1", ChatMessage::assistant("hello"));
        store.append("c1", ChatMessage::user("hi"));

        assert_eq!(
            store.history("c1"),
            vec![
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
                ChatMessage::user("hi"),
            ]
        );
    }

    #[test]
    fn history_is_a_snapshot() {
        let store = ConversationStore::new();
        store.append("c1", ChatMessage::user("one"));
        let snapshot = store.history("c1");
        store.append("c1", ChatMessage::user("two"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.history("c1").len(), 2);
    }

    #[test]
    fn concurrent_conversations_do_not_mix() {
        let store = ConversationStore::new();

        std::thread::scope(|s| {
            for t in 0..8 {
                let store = &store;
                s.spawn(move || {
                    let id = format!("conv-{t}");
                    for i in 0..100 {
                        store.append(&id, ChatMessage::user(format!("{t}:{i}")));
                    }
                });
            }
        });

        for t in 0..8 {
            let history = store.history(&format!("conv-{t}"));
            let expected: Vec<_> = (0..100)
                .map(|i| ChatMessage::user(format!("{t}:{i}")))
                .collect();
            assert_eq!(history, expected);
        }
    }

    #[test]
    fn concurrent_appends_to_one_conversation_are_all_kept() {
        let store = ConversationStore::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        store.append("shared", ChatMessage::user("x"));
                    }
                });
            }
        });
        assert_eq!(store.history("shared").len(), 200);
    }
}
