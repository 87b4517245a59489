//! In-process history store
//!
//! The outer map is only write-locked to create a conversation; appends then serialize on
//! that conversation's own mutex, so unrelated conversations never contend. Eviction never
//! leaves a handler reply at the front without the command it answered.

use super::{HistoryEntry, HistoryRole, HistoryStore, DEFAULT_MAX_ENTRIES};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type Conversation = Arc<Mutex<VecDeque<HistoryEntry>>>;

/// Smallest cap that still holds one exchange
const MIN_ENTRIES: usize = 2;

pub struct InMemoryHistory {
    conversations: RwLock<HashMap<String, Conversation>>,
    max_entries: usize,
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl InMemoryHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(MIN_ENTRIES),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }

    fn evict(&self, entries: &mut VecDeque<HistoryEntry>) {
        if entries.len() <= self.max_entries {
            return;
        }
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
        // A reply whose command was evicted goes with it
        while entries.len() > 1
            && entries
                .front()
                .is_some_and(|e| e.role == HistoryRole::Handler)
        {
            entries.pop_front();
        }
    }

    async fn conversation(&self, key: &str) -> Conversation {
        if let Some(existing) = self.conversations.read().await.get(key) {
            return Arc::clone(existing);
        }

        let mut conversations = self.conversations.write().await;
        Arc::clone(
            conversations
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new()))),
        )
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(&self, key: &str, entry: HistoryEntry) {
        let conversation = self.conversation(key).await;
        let mut entries = conversation.lock().await;
        entries.push_back(entry);
        self.evict(&mut entries);
    }

    async fn append_exchange(&self, key: &str, user: HistoryEntry, handler: HistoryEntry) {
        let conversation = self.conversation(key).await;
        let mut entries = conversation.lock().await;
        entries.push_back(user);
        entries.push_back(handler);
        self.evict(&mut entries);
    }

    async fn recent(&self, key: &str, limit: usize) -> Vec<HistoryEntry> {
        let conversation = match self.conversations.read().await.get(key) {
            Some(conversation) => Arc::clone(conversation),
            None => return Vec::new(),
        };

        let entries = conversation.lock().await;
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_key_is_empty() {
        let history = InMemoryHistory::default();
        assert!(history.recent("nobody", 10).await.is_empty());
        assert_eq!(history.conversation_count().await, 0);
    }

    #[tokio::test]
    async fn test_recent_returns_tail_oldest_first() {
        let history = InMemoryHistory::default();
        for i in 0..5 {
            history.append("c1", HistoryEntry::user(format!("m{i}"))).await;
        }

        let recent: Vec<_> = history
            .recent("c1", 3)
            .await
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(recent, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_cap_evicts_oldest() {
        let history = InMemoryHistory::new(3);
        for i in 0..5 {
            history.append("c1", HistoryEntry::user(format!("m{i}"))).await;
        }

        let all = history.recent("c1", 100).await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].content, "m2");
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let history = InMemoryHistory::default();
        history.append("a", HistoryEntry::user("for a")).await;
        history
            .append("b", HistoryEntry::handler("text-agent", "for b"))
            .await;

        let a = history.recent("a", 10).await;
        let b = history.recent("b", 10).await;
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].role, HistoryRole::User);
        assert_eq!(b[0].handler_id.as_deref(), Some("text-agent"));
    }

    #[tokio::test]
    async fn test_exchange_eviction_keeps_pairs() {
        let history = InMemoryHistory::new(5);
        for i in 0..4 {
            history
                .append_exchange(
                    "c1",
                    HistoryEntry::user(format!("q{i}")),
                    HistoryEntry::handler("text-agent", format!("a{i}")),
                )
                .await;
        }

        let contents: Vec<_> = history
            .recent("c1", 100)
            .await
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(contents, vec!["q2", "a2", "q3", "a3"]);
    }

    #[test]
    fn test_cap_holds_at_least_one_exchange() {
        assert_eq!(InMemoryHistory::new(0).max_entries(), 2);
        assert_eq!(InMemoryHistory::new(1).max_entries(), 2);
    }
}
