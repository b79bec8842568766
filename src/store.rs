//! Observable in-memory state containers
//!
//! Each store wraps a [`tokio::sync::watch`] channel: readers take snapshots,
//! writers notify subscribers. Stores are owned by the composition root and
//! handed out by reference; there is no process-global instance. Writes are
//! not coordinated beyond the channel itself, so the last writer wins.

use tokio::sync::watch;

use crate::models::{EmotionMetrics, Message, MessagePatch, Session, SessionPatch};

/// Generic observable value holder
#[derive(Debug)]
pub struct Store<T> {
    state: watch::Sender<T>,
}

impl<T: Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Store<T> {
    /// Create a store holding `initial`
    pub fn new(initial: T) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Replace the held value and notify subscribers
    pub fn set(&self, value: T) {
        self.state.send_replace(value);
    }

    /// Mutate the held value in place and notify subscribers
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.state.send_modify(f);
    }

    /// Mutate in place; subscribers are notified only when `f` returns true
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.state.send_if_modified(f)
    }

    /// Read the held value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Receive change notifications
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.state.subscribe()
    }
}

impl<T: Clone> Store<T> {
    /// Snapshot of the held value
    pub fn get(&self) -> T {
        self.state.borrow().clone()
    }
}

/// Ordered chat messages of the current conversation
#[derive(Debug, Default)]
pub struct ChatStore {
    inner: Store<Vec<Message>>,
}

impl ChatStore {
    /// Create an empty chat store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all messages in order
    pub fn messages(&self) -> Vec<Message> {
        self.inner.get()
    }

    /// Number of messages held
    pub fn len(&self) -> usize {
        self.inner.with(Vec::len)
    }

    /// True when no messages are held
    pub fn is_empty(&self) -> bool {
        self.inner.with(Vec::is_empty)
    }

    /// Replace the whole sequence
    pub fn set_messages(&self, messages: Vec<Message>) {
        self.inner.set(messages);
    }

    /// Append one message, keeping prior order
    pub fn add_message(&self, message: Message) {
        self.inner.update(|messages| messages.push(message));
    }

    /// Merge `patch` into the first message with `id`.
    ///
    /// Returns false and leaves the sequence untouched when nothing matches.
    pub fn update_message(&self, id: &str, patch: MessagePatch) -> bool {
        self.inner.update_if(|messages| {
            messages.iter_mut().find(|m| m.id == id).is_some_and(|m| {
                m.apply_patch(patch);
                true
            })
        })
    }

    /// Receive change notifications
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.inner.subscribe()
    }
}

/// The single current session, if any
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Store<Option<Session>>,
}

impl SessionStore {
    /// Create a store with no session
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Option<Session> {
        self.inner.get()
    }

    /// Replace or clear the current session
    pub fn set_session(&self, session: Option<Session>) {
        self.inner.set(session);
    }

    /// Merge `patch` into the current session.
    ///
    /// No-op returning false when no session is held.
    pub fn update_session(&self, patch: SessionPatch) -> bool {
        self.inner.update_if(|current| {
            current.as_mut().is_some_and(|session| {
                session.apply_patch(patch);
                true
            })
        })
    }

    /// Receive change notifications
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.subscribe()
    }
}

/// Emotion scores recorded during the current conversation, append-only
#[derive(Debug, Default)]
pub struct EmotionStore {
    inner: Store<Vec<EmotionMetrics>>,
}

impl EmotionStore {
    /// Create an empty emotion store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records in order
    pub fn emotion_metrics(&self) -> Vec<EmotionMetrics> {
        self.inner.get()
    }

    /// Most recently appended record
    pub fn latest(&self) -> Option<EmotionMetrics> {
        self.inner.with(|metrics| metrics.last().cloned())
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.inner.with(Vec::len)
    }

    /// True when no records are held
    pub fn is_empty(&self) -> bool {
        self.inner.with(Vec::is_empty)
    }

    /// Replace the whole sequence
    pub fn set_emotion_metrics(&self, metrics: Vec<EmotionMetrics>) {
        self.inner.set(metrics);
    }

    /// Append one record
    pub fn add_emotion_metric(&self, metric: EmotionMetrics) {
        self.inner.update(|metrics| metrics.push(metric));
    }

    /// Receive change notifications
    pub fn subscribe(&self) -> watch::Receiver<Vec<EmotionMetrics>> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, SessionStatus};
    use chrono::Utc;

    fn message(id: &str, content: &str) -> Message {
        Message {
            id: id.into(),
            session_id: "s1".into(),
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            metadata: None,
        }
    }

    fn session() -> Session {
        let now = Utc::now();
        Session {
            id: "s1".into(),
            user_id: "u1".into(),
            status: SessionStatus::InProgress,
            chat_group_id: None,
            created_at: now,
            updated_at: now,
            ended_at: None,
            error_message: None,
            metadata: None,
        }
    }

    #[test]
    fn test_update_message_first_match_only() {
        let store = ChatStore::new();
        store.set_messages(vec![message("a", "one"), message("a", "two"), message("b", "three")]);

        assert!(store.update_message("a", MessagePatch {
            content: Some("changed".into()),
            ..MessagePatch::default()
        }));

        let contents: Vec<_> = store.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["changed", "two", "three"]);
    }

    #[test]
    fn test_update_message_unknown_id_does_not_notify() {
        let store = ChatStore::new();
        store.add_message(message("a", "one"));
        let rx = store.subscribe();

        assert!(!store.update_message("zzz", MessagePatch::default()));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_add_message_notifies_subscribers() {
        let store = ChatStore::new();
        let mut rx = store.subscribe();
        store.add_message(message("a", "one"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[test]
    fn test_session_store_set_and_clear() {
        let store = SessionStore::new();
        assert!(store.session().is_none());
        store.set_session(Some(session()));
        assert_eq!(store.session().map(|s| s.id), Some("s1".to_string()));
        store.set_session(None);
        assert!(store.session().is_none());
    }

    #[test]
    fn test_update_session_without_session_is_noop() {
        let store = SessionStore::new();
        let updated = store.update_session(SessionPatch {
            status: Some(SessionStatus::Completed),
            ..SessionPatch::default()
        });
        assert!(!updated);
        assert!(store.session().is_none());
    }

    #[test]
    fn test_emotion_store_latest() {
        let store = EmotionStore::new();
        assert!(store.latest().is_none());
        for id in ["e1", "e2"] {
            store.add_emotion_metric(EmotionMetrics {
                id: id.into(),
                session_id: "s1".into(),
                message_id: "m1".into(),
                emotions: std::collections::BTreeMap::new(),
                created_at: Utc::now(),
                metadata: None,
            });
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.latest().map(|m| m.id), Some("e2".to_string()));
    }
}
