//! Tests for the chat service composition root

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use talkai::error::{Result, TalkAiError};
use talkai::models::{
    EmotionMetrics, JournalPage, Message, MessageMetadata, MessagePatch, NewSession, PageRequest, Role,
    Session, SessionPatch, SessionStatus, VoiceConfig,
};
use talkai::repository::{InMemoryRepository, TalkRepository};
use talkai::ChatService;

fn message(id: &str, session_id: &str, role: Role, content: &str, offset_secs: i64) -> Message {
    Message {
        id: id.to_string(),
        session_id: session_id.to_string(),
        role,
        content: content.to_string(),
        created_at: Utc::now() + Duration::seconds(offset_secs),
        metadata: None,
    }
}

fn emotions(id: &str, session_id: &str, message_id: &str, scores: &[(&str, f64)]) -> EmotionMetrics {
    EmotionMetrics {
        id: id.to_string(),
        session_id: session_id.to_string(),
        message_id: message_id.to_string(),
        emotions: scores.iter().map(|(k, v)| ((*k).to_string(), *v)).collect::<BTreeMap<_, _>>(),
        created_at: Utc::now(),
        metadata: None,
    }
}

#[tokio::test]
async fn test_start_session_resets_conversation() {
    let repo = Arc::new(InMemoryRepository::new());
    let service = ChatService::new(repo.clone());

    service.chat().add_message(message("stale", "old", Role::User, "left over", 0));
    let session = service.start_session("user-1", Some("group-1".to_string())).await.unwrap();

    assert_eq!(session.status, SessionStatus::InProgress);
    assert_eq!(service.sessions().session(), Some(session.clone()));
    assert!(service.chat().is_empty());
    assert!(service.emotions().is_empty());
    assert_eq!(repo.get_session(&session.id).await.unwrap(), Some(session));
}

#[tokio::test]
async fn test_record_message_persists_and_appends() {
    let repo = Arc::new(InMemoryRepository::new());
    let service = ChatService::new(repo.clone());
    let session = service.start_session("user-1", None).await.unwrap();

    service.record_message(message("m1", &session.id, Role::User, "hello", 0)).await.unwrap();
    service
        .record_message(message("m2", &session.id, Role::Assistant, "hi there", 1))
        .await
        .unwrap();

    assert_eq!(service.chat().len(), 2);
    assert_eq!(repo.list_messages(&session.id).await.unwrap().len(), 2);

    let ctx = service.session_messages_context();
    let roles: Vec<Role> = ctx.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
}

#[tokio::test]
async fn test_record_message_rejects_blank_content() {
    let service = ChatService::new(Arc::new(InMemoryRepository::new()));
    let result = service.record_message(message("m1", "s1", Role::User, "   ", 0)).await;
    assert!(matches!(result, Err(TalkAiError::InvalidInput(_))));
    assert!(service.chat().is_empty());
}

#[tokio::test]
async fn test_annotate_message_merges_prosody() {
    let service = ChatService::new(Arc::new(InMemoryRepository::new()));
    let session = service.start_session("user-1", None).await.unwrap();
    service.record_message(message("m1", &session.id, Role::User, "hello", 0)).await.unwrap();

    let annotated = service.annotate_message(
        "m1",
        MessagePatch {
            metadata: Some(MessageMetadata {
                chat_group_id: None,
                prosody: Some(BTreeMap::from([("Excitement".to_string(), 0.8)])),
            }),
            ..MessagePatch::default()
        },
    );
    assert!(annotated);
    assert!(!service.annotate_message("missing", MessagePatch::default()));
    assert!(service.chat().messages()[0].metadata.is_some());
}

#[tokio::test]
async fn test_record_emotion_metrics_validates_scores() {
    let service = ChatService::new(Arc::new(InMemoryRepository::new()));
    let session = service.start_session("user-1", None).await.unwrap();

    service
        .record_emotion_metrics(emotions("e1", &session.id, "m1", &[("Joy", 0.5)]))
        .await
        .unwrap();
    let bad = service
        .record_emotion_metrics(emotions("e2", &session.id, "m1", &[("Joy", f64::NAN)]))
        .await;

    assert!(bad.is_err());
    assert_eq!(service.emotions().len(), 1);
}

#[tokio::test]
async fn test_resume_session_loads_stores_and_flags() {
    let repo = Arc::new(InMemoryRepository::new());
    let session = repo
        .create_session(&NewSession {
            user_id: "user-1".to_string(),
            status: SessionStatus::InProgress,
            chat_group_id: Some("group-7".to_string()),
        })
        .await
        .unwrap();
    repo.insert_message(&message("m2", &session.id, Role::Assistant, "second", 5)).await.unwrap();
    repo.insert_message(&message("m1", &session.id, Role::User, "first", 0)).await.unwrap();
    repo.insert_emotion_metrics(&emotions("e1", &session.id, "m1", &[("Calmness", 0.3)]))
        .await
        .unwrap();

    let service = ChatService::new(repo);
    let ctx = service.resumption();
    assert!(!ctx.is_resuming());

    let resumed = service.resume_session(&session.id).await.unwrap();
    assert_eq!(resumed.map(|s| s.id), Some(session.id.clone()));

    let contents: Vec<String> = service.chat().messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents, vec!["first", "second"]);
    assert_eq!(service.emotions().len(), 1);
    assert!(!ctx.is_resuming());
    assert!(ctx.was_recently_resumed());

    service.acknowledge_resumption();
    assert!(!ctx.was_recently_resumed());
}

#[tokio::test]
async fn test_resume_unknown_session_leaves_stores() {
    let service = ChatService::new(Arc::new(InMemoryRepository::new()));
    let current = service.start_session("user-1", None).await.unwrap();

    assert!(service.resume_session("does-not-exist").await.unwrap().is_none());
    assert_eq!(service.sessions().session().map(|s| s.id), Some(current.id));
    assert!(!service.resumption().is_resuming());
    assert!(!service.resumption().was_recently_resumed());
}

#[tokio::test]
async fn test_complete_and_fail_session() {
    let repo = Arc::new(InMemoryRepository::new());
    let service = ChatService::new(repo.clone());

    let session = service.start_session("user-1", None).await.unwrap();
    let completed = service.complete_session().await.unwrap().unwrap();
    assert_eq!(completed.status, SessionStatus::Completed);
    assert!(completed.ended_at.is_some());
    assert_eq!(
        repo.get_session(&session.id).await.unwrap().map(|s| s.status),
        Some(SessionStatus::Completed)
    );

    service.start_session("user-1", None).await.unwrap();
    let failed = service.fail_session("socket closed").await.unwrap().unwrap();
    assert_eq!(failed.status, SessionStatus::Error);
    assert_eq!(failed.error_message.as_deref(), Some("socket closed"));
}

/// Repository whose reads always fail
struct BrokenRepository;

#[async_trait]
impl TalkRepository for BrokenRepository {
    async fn create_session(&self, _session: &NewSession) -> Result<Session> {
        Err(TalkAiError::Upstream { status: 500, body: "down".to_string() })
    }
    async fn get_session(&self, _id: &str) -> Result<Option<Session>> {
        Err(TalkAiError::Upstream { status: 500, body: "down".to_string() })
    }
    async fn update_session(&self, _id: &str, _patch: &SessionPatch) -> Result<Option<Session>> {
        Ok(None)
    }
    async fn list_sessions(&self, _user_id: &str) -> Result<Vec<Session>> {
        Ok(Vec::new())
    }
    async fn list_messages(&self, _session_id: &str) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }
    async fn insert_message(&self, _message: &Message) -> Result<()> {
        Err(TalkAiError::Upstream { status: 500, body: "down".to_string() })
    }
    async fn list_emotion_metrics(&self, _session_id: &str) -> Result<Vec<EmotionMetrics>> {
        Ok(Vec::new())
    }
    async fn insert_emotion_metrics(&self, _metrics: &EmotionMetrics) -> Result<()> {
        Ok(())
    }
    async fn get_voice_config(&self, _user_id: &str) -> Result<Option<VoiceConfig>> {
        Ok(None)
    }
    async fn list_journal_entries(&self, _user_id: &str, _page: PageRequest) -> Result<JournalPage> {
        Err(TalkAiError::Upstream { status: 500, body: "down".to_string() })
    }
}

#[tokio::test]
async fn test_resume_failure_clears_resuming_flag() {
    let service = ChatService::new(Arc::new(BrokenRepository));
    assert!(service.resume_session("session-1").await.is_err());
    assert!(!service.resumption().is_resuming());
    assert!(!service.resumption().was_recently_resumed());
}

#[tokio::test]
async fn test_failed_persist_does_not_append() {
    let service = ChatService::new(Arc::new(BrokenRepository));
    assert!(service.record_message(message("m1", "s1", Role::User, "hello", 0)).await.is_err());
    assert!(service.chat().is_empty());
}

/// In-memory repository that refuses session updates
struct RejectingUpdates(InMemoryRepository);

#[async_trait]
impl TalkRepository for RejectingUpdates {
    async fn create_session(&self, session: &NewSession) -> Result<Session> {
        self.0.create_session(session).await
    }
    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.0.get_session(id).await
    }
    async fn update_session(&self, _id: &str, _patch: &SessionPatch) -> Result<Option<Session>> {
        Err(TalkAiError::Upstream { status: 503, body: "unavailable".to_string() })
    }
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        self.0.list_sessions(user_id).await
    }
    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        self.0.list_messages(session_id).await
    }
    async fn insert_message(&self, message: &Message) -> Result<()> {
        self.0.insert_message(message).await
    }
    async fn list_emotion_metrics(&self, session_id: &str) -> Result<Vec<EmotionMetrics>> {
        self.0.list_emotion_metrics(session_id).await
    }
    async fn insert_emotion_metrics(&self, metrics: &EmotionMetrics) -> Result<()> {
        self.0.insert_emotion_metrics(metrics).await
    }
    async fn get_voice_config(&self, user_id: &str) -> Result<Option<VoiceConfig>> {
        self.0.get_voice_config(user_id).await
    }
    async fn list_journal_entries(&self, user_id: &str, page: PageRequest) -> Result<JournalPage> {
        self.0.list_journal_entries(user_id, page).await
    }
}

#[tokio::test]
async fn test_failed_finish_leaves_session_in_progress() {
    let repo = Arc::new(RejectingUpdates(InMemoryRepository::new()));
    let service = ChatService::new(repo.clone());
    let session = service.start_session("u1", None).await.unwrap();

    assert!(service.complete_session().await.is_err());
    assert!(service.fail_session("socket closed").await.is_err());

    assert_eq!(service.sessions().session(), Some(session.clone()));
    assert_eq!(
        repo.get_session(&session.id).await.unwrap().map(|s| s.status),
        Some(SessionStatus::InProgress)
    );
}

#[tokio::test]
async fn test_finish_returns_stored_session() {
    let service = ChatService::new(Arc::new(InMemoryRepository::new()));
    service.start_session("u1", None).await.unwrap();

    let finished = service.complete_session().await.unwrap();
    assert_eq!(finished, service.sessions().session());
}
