//! Hosted Postgres access through the Supabase PostgREST API

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{Result, TalkAiError};
use crate::metrics::MetricsCollector;
use crate::models::{
    EmotionMetrics, JournalEntry, JournalPage, Message, NewSession, PageRequest, Pagination, Session,
    SessionPatch, VoiceConfig,
};
use crate::repository::TalkRepository;

const SESSIONS: &str = "sessions";
const MESSAGES: &str = "messages";
const EMOTION_METRICS: &str = "emotion_metrics";
const VOICE_CONFIGS: &str = "voice_configs";
const JOURNAL_ENTRIES: &str = "journal_entries";

const RETURN_REPRESENTATION: &str = "return=representation";
const RETURN_MINIMAL: &str = "return=minimal";

/// Repository backed by Supabase tables
pub struct SupabaseRepository {
    http: reqwest::Client,
    rest_url: String,
    metrics: Arc<MetricsCollector>,
}

impl SupabaseRepository {
    /// Client for the project at `url`
    pub fn new(url: &str, anon_key: &str, metrics: Arc<MetricsCollector>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(anon_key)
            .map_err(|_| TalkAiError::InvalidInput("Supabase key is not a valid header value".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {anon_key}"))
            .map_err(|_| TalkAiError::InvalidInput("Supabase key is not a valid header value".into()))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            metrics,
        })
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    async fn observe<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.metrics.record_repository_operation(operation, start.elapsed(), result.is_ok());
        if let Err(e) = &result {
            warn!(operation, error = %e, "Supabase operation failed");
        }
        result
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TalkAiError::Upstream { status: status.as_u16(), body })
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>> {
        Ok(Self::send(request).await?.json().await?)
    }

    async fn first<T: DeserializeOwned>(request: RequestBuilder) -> Result<Option<T>> {
        Ok(Self::rows(request).await?.into_iter().next())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// Total row count from a `Content-Range` header such as `0-9/42`
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/').and_then(|(_, total)| total.parse().ok())
}

#[async_trait]
impl TalkRepository for SupabaseRepository {
    async fn create_session(&self, session: &NewSession) -> Result<Session> {
        self.observe("create_session", async {
            let request = self
                .http
                .post(self.table(SESSIONS))
                .header("Prefer", RETURN_REPRESENTATION)
                .json(session);
            Self::first(request)
                .await?
                .ok_or_else(|| TalkAiError::Other("Insert returned no session".to_string()))
        })
        .await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.observe("get_session", async {
            let request = self.http.get(self.table(SESSIONS)).query(&[("id", eq(id)), ("select", "*".into())]);
            Self::first(request).await
        })
        .await
    }

    async fn update_session(&self, id: &str, patch: &SessionPatch) -> Result<Option<Session>> {
        self.observe("update_session", async {
            let request = self
                .http
                .patch(self.table(SESSIONS))
                .query(&[("id", eq(id))])
                .header("Prefer", RETURN_REPRESENTATION)
                .json(patch);
            Self::first(request).await
        })
        .await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        self.observe("list_sessions", async {
            let request = self.http.get(self.table(SESSIONS)).query(&[
                ("user_id", eq(user_id)),
                ("select", "*".into()),
                ("order", "created_at.desc".into()),
            ]);
            Self::rows(request).await
        })
        .await
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        self.observe("list_messages", async {
            let request = self.http.get(self.table(MESSAGES)).query(&[
                ("session_id", eq(session_id)),
                ("select", "*".into()),
                ("order", "created_at.asc".into()),
            ]);
            Self::rows(request).await
        })
        .await
    }

    async fn insert_message(&self, message: &Message) -> Result<()> {
        self.observe("insert_message", async {
            let request =
                self.http.post(self.table(MESSAGES)).header("Prefer", RETURN_MINIMAL).json(message);
            Self::send(request).await.map(|_| ())
        })
        .await
    }

    async fn list_emotion_metrics(&self, session_id: &str) -> Result<Vec<EmotionMetrics>> {
        self.observe("list_emotion_metrics", async {
            let request = self.http.get(self.table(EMOTION_METRICS)).query(&[
                ("session_id", eq(session_id)),
                ("select", "*".into()),
                ("order", "created_at.asc".into()),
            ]);
            Self::rows(request).await
        })
        .await
    }

    async fn insert_emotion_metrics(&self, metrics: &EmotionMetrics) -> Result<()> {
        self.observe("insert_emotion_metrics", async {
            let request =
                self.http.post(self.table(EMOTION_METRICS)).header("Prefer", RETURN_MINIMAL).json(metrics);
            Self::send(request).await.map(|_| ())
        })
        .await
    }

    async fn get_voice_config(&self, user_id: &str) -> Result<Option<VoiceConfig>> {
        self.observe("get_voice_config", async {
            let request = self.http.get(self.table(VOICE_CONFIGS)).query(&[
                ("user_id", eq(user_id)),
                ("select", "*".into()),
                ("order", "created_at.desc".into()),
                ("limit", "1".into()),
            ]);
            Self::first(request).await
        })
        .await
    }

    async fn list_journal_entries(&self, user_id: &str, page: PageRequest) -> Result<JournalPage> {
        self.observe("list_journal_entries", async {
            let request = self
                .http
                .get(self.table(JOURNAL_ENTRIES))
                .query(&[
                    ("user_id", eq(user_id)),
                    ("select", "id,content,reflection,created_at".into()),
                    ("order", "created_at.desc".into()),
                    ("offset", page.offset().to_string()),
                    ("limit", page.limit.to_string()),
                ])
                .header("Prefer", "count=exact");

            let response = Self::send(request).await?;
            let total = response
                .headers()
                .get("content-range")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_total);
            let entries: Vec<JournalEntry> = response.json().await?;

            // Without an exact count, fall back to what can be seen from here
            let total = total.unwrap_or_else(|| page.offset() + entries.len() as u64);
            debug!(user_id, total, returned = entries.len(), "Fetched journal entries");

            Ok(JournalPage { entries, pagination: Pagination::new(page.page, page.limit, total) })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-9/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-9/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_rest_url_strips_trailing_slash() {
        let repo = SupabaseRepository::new(
            "https://project.supabase.co/",
            "anon-key",
            Arc::new(MetricsCollector::new()),
        )
        .unwrap();
        assert_eq!(repo.table("sessions"), "https://project.supabase.co/rest/v1/sessions");
    }
}
