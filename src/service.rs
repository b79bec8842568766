//! Chat state wired to persistence

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::context::{ResumptionContext, ResumptionProvider, SessionMessagesContext};
use crate::error::Result;
use crate::models::{
    EmotionMetrics, Message, MessagePatch, NewSession, Session, SessionPatch, SessionStatus,
};
use crate::repository::TalkRepository;
use crate::store::{ChatStore, EmotionStore, SessionStore};
use crate::validation::InputValidator;

/// Composition root for the chat state
///
/// Owns the stores and the resumption flags, and moves data between them and
/// the repository.
pub struct ChatService {
    repository: Arc<dyn TalkRepository>,
    chat: ChatStore,
    sessions: SessionStore,
    emotions: EmotionStore,
    resumption: ResumptionProvider,
}

impl ChatService {
    /// Empty stores over `repository`
    pub fn new(repository: Arc<dyn TalkRepository>) -> Self {
        Self {
            repository,
            chat: ChatStore::new(),
            sessions: SessionStore::new(),
            emotions: EmotionStore::new(),
            resumption: ResumptionProvider::new(),
        }
    }

    /// Conversation store
    pub const fn chat(&self) -> &ChatStore {
        &self.chat
    }

    /// Current-session store
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Emotion store
    pub const fn emotions(&self) -> &EmotionStore {
        &self.emotions
    }

    /// Handle to the resumption flags
    pub fn resumption(&self) -> ResumptionContext {
        self.resumption.context()
    }

    /// Snapshot of the conversation for components that only render it
    pub fn session_messages_context(&self) -> SessionMessagesContext {
        SessionMessagesContext::from_messages(&self.chat.messages())
    }

    /// Persist a new session and make it current with an empty conversation
    pub async fn start_session(&self, user_id: &str, chat_group_id: Option<String>) -> Result<Session> {
        InputValidator::validate_identifier("user", user_id)?;

        let session = self
            .repository
            .create_session(&NewSession {
                user_id: user_id.to_string(),
                status: SessionStatus::InProgress,
                chat_group_id,
            })
            .await?;

        info!(session_id = %session.id, user_id, "Session started");
        self.sessions.set_session(Some(session.clone()));
        self.chat.set_messages(Vec::new());
        self.emotions.set_emotion_metrics(Vec::new());
        Ok(session)
    }

    /// Load a stored session and its records into the stores
    ///
    /// Returns `Ok(None)` without touching the stores when the id is unknown.
    pub async fn resume_session(&self, session_id: &str) -> Result<Option<Session>> {
        InputValidator::validate_identifier("session", session_id)?;

        let resumption = self.resumption.context();
        resumption.set_was_recently_resumed(false);
        resumption.set_is_resuming(true);

        let loaded = self.load_session(session_id).await;
        resumption.set_is_resuming(false);

        let Some((session, messages, emotions)) = loaded? else {
            warn!(session_id, "Session to resume was not found");
            return Ok(None);
        };

        info!(session_id, messages = messages.len(), "Session resumed");
        self.sessions.set_session(Some(session.clone()));
        self.chat.set_messages(messages);
        self.emotions.set_emotion_metrics(emotions);
        resumption.set_was_recently_resumed(true);
        Ok(Some(session))
    }

    async fn load_session(
        &self,
        session_id: &str,
    ) -> Result<Option<(Session, Vec<Message>, Vec<EmotionMetrics>)>> {
        let Some(session) = self.repository.get_session(session_id).await? else {
            return Ok(None);
        };
        let (messages, emotions) = tokio::try_join!(
            self.repository.list_messages(session_id),
            self.repository.list_emotion_metrics(session_id),
        )?;
        Ok(Some((session, messages, emotions)))
    }

    /// Clear the "just resumed" flag once the UI has shown it
    pub fn acknowledge_resumption(&self) {
        self.resumption.context().set_was_recently_resumed(false);
    }

    /// Persist a message and append it to the conversation
    pub async fn record_message(&self, message: Message) -> Result<()> {
        InputValidator::validate_message_content(&message.content)?;
        if let Some(prosody) = message.metadata.as_ref().and_then(|m| m.prosody.as_ref()) {
            InputValidator::validate_emotion_scores(prosody)?;
        }

        self.repository.insert_message(&message).await?;
        self.chat.add_message(message);
        Ok(())
    }

    /// Merge late-arriving fields into a message already on screen
    pub fn annotate_message(&self, id: &str, patch: MessagePatch) -> bool {
        self.chat.update_message(id, patch)
    }

    /// Persist emotion scores and append them
    pub async fn record_emotion_metrics(&self, metrics: EmotionMetrics) -> Result<()> {
        InputValidator::validate_emotion_scores(&metrics.emotions)?;

        self.repository.insert_emotion_metrics(&metrics).await?;
        self.emotions.add_emotion_metric(metrics);
        Ok(())
    }

    /// Mark the current session completed
    pub async fn complete_session(&self) -> Result<Option<Session>> {
        self.finish_session(SessionStatus::Completed, None).await
    }

    /// Mark the current session failed with `reason`
    pub async fn fail_session(&self, reason: &str) -> Result<Option<Session>> {
        self.finish_session(SessionStatus::Error, Some(reason.to_string())).await
    }

    async fn finish_session(
        &self,
        status: SessionStatus,
        error_message: Option<String>,
    ) -> Result<Option<Session>> {
        let now = Utc::now();
        let patch = SessionPatch {
            status: Some(status),
            updated_at: Some(now),
            ended_at: Some(now),
            error_message,
            ..SessionPatch::default()
        };

        let Some(current) = self.sessions.session() else {
            return Ok(None);
        };

        // The store is patched only after the write succeeds
        self.repository.update_session(&current.id, &patch).await?;

        let mut session = current;
        session.apply_patch(patch.clone());
        self.sessions.update_session(patch);
        info!(session_id = %session.id, status = ?status, "Session finished");
        Ok(Some(session))
    }
}
