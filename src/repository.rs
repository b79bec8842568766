//! Storage seam for sessions, messages and journal data

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    EmotionMetrics, JournalEntry, JournalPage, Message, NewSession, PageRequest, Pagination, Session,
    SessionPatch, VoiceConfig,
};

/// Persistence for sessions and the records attached to them
#[async_trait]
pub trait TalkRepository: Send + Sync {
    /// Insert a session and return the stored row
    async fn create_session(&self, session: &NewSession) -> Result<Session>;
    /// Session by id
    async fn get_session(&self, id: &str) -> Result<Option<Session>>;
    /// Apply `patch`; `None` when the id is unknown
    async fn update_session(&self, id: &str, patch: &SessionPatch) -> Result<Option<Session>>;
    /// A user's sessions, newest first
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>>;
    /// Messages of a session, oldest first
    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>>;
    /// Insert a message
    async fn insert_message(&self, message: &Message) -> Result<()>;
    /// Emotion records of a session, oldest first
    async fn list_emotion_metrics(&self, session_id: &str) -> Result<Vec<EmotionMetrics>>;
    /// Insert an emotion record
    async fn insert_emotion_metrics(&self, metrics: &EmotionMetrics) -> Result<()>;
    /// Most recent voice settings of a user
    async fn get_voice_config(&self, user_id: &str) -> Result<Option<VoiceConfig>>;
    /// One page of journal entries, newest first
    async fn list_journal_entries(&self, user_id: &str, page: PageRequest) -> Result<JournalPage>;
}

#[derive(Default)]
struct Tables {
    sessions: Vec<Session>,
    messages: Vec<Message>,
    emotion_metrics: Vec<EmotionMetrics>,
    voice_configs: HashMap<String, VoiceConfig>,
    journal_entries: HashMap<String, Vec<JournalEntry>>,
}

/// Process-local repository, used for tests and when no database is configured
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Store voice settings for their user
    pub async fn put_voice_config(&self, config: VoiceConfig) {
        self.tables.write().await.voice_configs.insert(config.user_id.clone(), config);
    }

    /// Append a journal entry for `user_id`
    pub async fn add_journal_entry(&self, user_id: &str, entry: JournalEntry) {
        self.tables
            .write()
            .await
            .journal_entries
            .entry(user_id.to_string())
            .or_default()
            .push(entry);
    }
}

#[async_trait]
impl TalkRepository for InMemoryRepository {
    async fn create_session(&self, session: &NewSession) -> Result<Session> {
        let now = Utc::now();
        let created = Session {
            id: Uuid::new_v4().to_string(),
            user_id: session.user_id.clone(),
            status: session.status,
            chat_group_id: session.chat_group_id.clone(),
            created_at: now,
            updated_at: now,
            ended_at: None,
            error_message: None,
            metadata: None,
        };
        self.tables.write().await.sessions.push(created.clone());
        Ok(created)
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.tables.read().await.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn update_session(&self, id: &str, patch: &SessionPatch) -> Result<Option<Session>> {
        let mut tables = self.tables.write().await;
        Ok(tables.sessions.iter_mut().find(|s| s.id == id).map(|session| {
            session.apply_patch(patch.clone());
            session.clone()
        }))
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> =
            tables.sessions.iter().filter(|s| s.user_id == user_id).cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut messages: Vec<Message> =
            tables.messages.iter().filter(|m| m.session_id == session_id).cloned().collect();
        // Stable, so equal timestamps keep insertion order
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn insert_message(&self, message: &Message) -> Result<()> {
        self.tables.write().await.messages.push(message.clone());
        Ok(())
    }

    async fn list_emotion_metrics(&self, session_id: &str) -> Result<Vec<EmotionMetrics>> {
        let tables = self.tables.read().await;
        let mut metrics: Vec<EmotionMetrics> =
            tables.emotion_metrics.iter().filter(|m| m.session_id == session_id).cloned().collect();
        metrics.sort_by_key(|m| m.created_at);
        Ok(metrics)
    }

    async fn insert_emotion_metrics(&self, metrics: &EmotionMetrics) -> Result<()> {
        self.tables.write().await.emotion_metrics.push(metrics.clone());
        Ok(())
    }

    async fn get_voice_config(&self, user_id: &str) -> Result<Option<VoiceConfig>> {
        Ok(self.tables.read().await.voice_configs.get(user_id).cloned())
    }

    async fn list_journal_entries(&self, user_id: &str, page: PageRequest) -> Result<JournalPage> {
        let tables = self.tables.read().await;
        let mut entries = tables.journal_entries.get(user_id).cloned().unwrap_or_default();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = entries.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let entries = entries.into_iter().skip(offset).take(page.limit as usize).collect();

        Ok(JournalPage { entries, pagination: Pagination::new(page.page, page.limit, total) })
    }
}
