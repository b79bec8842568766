//! Data models for chat state and backend records
//!
//! This module contains the records exchanged with the database and held in
//! the client-side stores, the partial-update types used to merge into them,
//! and the outcome types returned by the vendor glue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human speaking to the assistant
    User,
    /// The AI assistant
    Assistant,
    /// System or tool generated content
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        };
        f.write_str(label)
    }
}

/// Optional metadata attached to a message by the voice vendor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Vendor chat group the message belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_group_id: Option<String>,
    /// Prosody scores (label to score) measured on the spoken message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prosody: Option<BTreeMap<String, f64>>,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier (not checked for uniqueness)
    pub id: String,
    /// Session the message belongs to
    pub session_id: String,
    /// Author role
    pub role: Role,
    /// Message text
    pub content: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Vendor metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// Shallow partial update for a [`Message`]; `None` fields are left unchanged.
///
/// Metadata can be replaced but not cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePatch {
    /// New session id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// New author role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// New message text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Replacement metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    /// Merge a patch into this message. The id is never changed.
    pub fn apply_patch(&mut self, patch: MessagePatch) {
        if let Some(session_id) = patch.session_id {
            self.session_id = session_id;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = Some(metadata);
        }
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Conversation is ongoing
    InProgress,
    /// Conversation ended normally
    Completed,
    /// Conversation ended with an error
    Error,
}

/// One continuous interaction episode with the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Lifecycle state
    pub status: SessionStatus,
    /// Vendor chat group used to resume the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_group_id: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// When the session ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Error description for failed sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Shallow partial update for a [`Session`]; `None` fields are left unchanged.
///
/// A patch cannot clear an optional field: `null` and absent both mean "keep".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    /// New owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// New lifecycle state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    /// New chat group id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_group_id: Option<String>,
    /// New creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// New update timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// End timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Error description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Replacement metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Session {
    /// Merge a patch into this session. The id is never changed.
    pub fn apply_patch(&mut self, patch: SessionPatch) {
        if let Some(user_id) = patch.user_id {
            self.user_id = user_id;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(chat_group_id) = patch.chat_group_id {
            self.chat_group_id = Some(chat_group_id);
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
        if let Some(ended_at) = patch.ended_at {
            self.ended_at = Some(ended_at);
        }
        if let Some(error_message) = patch.error_message {
            self.error_message = Some(error_message);
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = Some(metadata);
        }
    }
}

/// Data for creating a new session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    /// Owning user
    pub user_id: String,
    /// Initial lifecycle state
    pub status: SessionStatus,
    /// Vendor chat group, when resuming a vendor conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_group_id: Option<String>,
}

/// Emotion scores inferred for one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionMetrics {
    /// Record identifier
    pub id: String,
    /// Session the scores belong to
    pub session_id: String,
    /// Message the scores were measured on
    pub message_id: String,
    /// Emotion label to score
    pub emotions: BTreeMap<String, f64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl EmotionMetrics {
    /// The `n` highest-scoring emotions, highest first. Ties sort by label.
    #[must_use]
    pub fn top_emotions(&self, n: usize) -> Vec<(&str, f64)> {
        let mut scored: Vec<(&str, f64)> =
            self.emotions.iter().map(|(label, score)| (label.as_str(), *score)).collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        scored.truncate(n);
        scored
    }
}

/// A journal entry with the assistant's reflection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Entry identifier
    pub id: String,
    /// What the user wrote
    pub content: String,
    /// Generated reflection
    pub reflection: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Page position of a paginated response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// One-based page number
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Total number of entries
    pub total: u64,
    /// Total number of pages
    pub total_pages: u64,
}

impl Pagination {
    /// Build pagination info, deriving the page count from `total`
    #[must_use]
    pub const fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit as u64) };
        Self { page, limit, total, total_pages }
    }
}

/// One page of journal entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalPage {
    /// Entries on this page, newest first
    pub entries: Vec<JournalEntry>,
    /// Page position
    pub pagination: Pagination,
}

/// Requested page of a paginated listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// One-based page number
    pub page: u32,
    /// Page size
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl PageRequest {
    /// Number of rows to skip
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.limit as u64
    }
}

/// Per-user voice configuration for the voice vendor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Record identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Vendor configuration id
    pub config_id: String,
    /// Display name of the chosen voice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Lightweight message record handed down the UI tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    /// Author role
    pub role: Role,
    /// Message text
    pub content: String,
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for SessionMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            timestamp: message.created_at,
        }
    }
}

/// Result of an access-token request
///
/// Distinguishes a token that could not be obtained from a request that was
/// never made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    /// A usable token was issued
    Issued(String),
    /// No request was made, e.g. credentials are missing
    NotAttempted {
        /// Why the request was skipped
        reason: String,
    },
    /// The request was made and failed
    Failed {
        /// Why the request failed
        reason: String,
    },
}

impl TokenOutcome {
    /// Borrow the token, if one was issued
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Issued(token) => Some(token),
            _ => None,
        }
    }

    /// Collapse into an optional token
    #[must_use]
    pub fn into_token(self) -> Option<String> {
        match self {
            Self::Issued(token) => Some(token),
            _ => None,
        }
    }

    /// True when a token was issued
    #[must_use]
    pub const fn is_issued(&self) -> bool {
        matches!(self, Self::Issued(_))
    }

    /// Short label used in logs and metrics
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Issued(_) => "issued",
            Self::NotAttempted { .. } => "not_attempted",
            Self::Failed { .. } => "failed",
        }
    }
}
