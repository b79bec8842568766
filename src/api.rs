//! HTTP routes of the backend-for-frontend
//!
//! - `POST /api/verify-recaptcha`
//! - `GET  /api/access-token`
//! - `GET  /api/health`
//! - `GET  /api/sessions/:id`
//! - `GET  /api/users/:user_id/sessions`
//! - `GET  /api/users/:user_id/voice-config`
//! - `GET  /api/users/:user_id/journal-entries`

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::error::TalkAiError;
use crate::hume::HumeTokenProvider;
use crate::metrics::MetricsCollector;
use crate::models::{JournalPage, Message, PageRequest, Session, TokenOutcome, VoiceConfig};
use crate::recaptcha::{RecaptchaVerifier, VerificationOutcome};
use crate::repository::TalkRepository;
use crate::validation::InputValidator;

/// Shared state of all routes
#[derive(Clone)]
pub struct ApiState {
    /// Token verification
    pub recaptcha: Arc<RecaptchaVerifier>,
    /// Vendor access tokens
    pub hume: Arc<HumeTokenProvider>,
    /// Session and journal storage
    pub repository: Arc<dyn TalkRepository>,
    /// Request counters
    pub metrics: Arc<MetricsCollector>,
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /api/verify-recaptcha`
#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    /// Token produced by the widget
    #[serde(default)]
    pub token: Option<String>,
}

/// Error detail: a single message or the provider's error codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerifyError {
    /// Human-readable reason
    Message(String),
    /// Codes reported by the provider
    Codes(Vec<String>),
}

/// Reply of `POST /api/verify-recaptcha`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the token was accepted
    pub success: bool,
    /// Why it was not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<VerifyError>,
}

impl VerifyResponse {
    fn failure(error: VerifyError) -> Self {
        Self { success: false, error: Some(error) }
    }
}

/// Reply of `GET /api/access-token`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    /// Short-lived vendor token
    pub access_token: String,
}

/// A session with its conversation
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    /// Session record
    pub session: Session,
    /// Messages, oldest first
    pub messages: Vec<Message>,
}

/// Optional `page`/`limit` query parameters
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// One-based page
    pub page: Option<u32>,
    /// Page size
    pub limit: Option<u32>,
}

impl From<PageQuery> for PageRequest {
    fn from(query: PageQuery) -> Self {
        let defaults = Self::default();
        Self {
            page: query.page.unwrap_or(defaults.page),
            limit: query.limit.unwrap_or(defaults.limit),
        }
    }
}

impl IntoResponse for TalkAiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Assemble all routes; an empty origin list allows any origin
pub fn build_router(state: ApiState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/verify-recaptcha", post(verify_recaptcha))
        .route("/api/access-token", get(access_token))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/users/:user_id/sessions", get(list_sessions))
        .route("/api/users/:user_id/voice-config", get(get_voice_config))
        .route("/api/users/:user_id/journal-entries", get(list_journal_entries))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> =
        allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn verify_recaptcha(
    State(state): State<ApiState>,
    body: Option<Json<VerifyRequest>>,
) -> (StatusCode, Json<VerifyResponse>) {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = state.recaptcha.verify(request.token.as_deref()).await;
    state.metrics.record_verification(&outcome);

    match outcome {
        VerificationOutcome::Verified => {
            (StatusCode::OK, Json(VerifyResponse { success: true, error: None }))
        }
        VerificationOutcome::Rejected { error_codes } => {
            (StatusCode::OK, Json(VerifyResponse::failure(VerifyError::Codes(error_codes))))
        }
        VerificationOutcome::MissingToken => (
            StatusCode::BAD_REQUEST,
            Json(VerifyResponse::failure(VerifyError::Message("Missing token".to_string()))),
        ),
        VerificationOutcome::InvalidToken { reason } => {
            (StatusCode::BAD_REQUEST, Json(VerifyResponse::failure(VerifyError::Message(reason))))
        }
        VerificationOutcome::NotConfigured => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(VerifyResponse::failure(VerifyError::Message(
                "Verification is not configured".to_string(),
            ))),
        ),
        VerificationOutcome::Unavailable { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(VerifyResponse::failure(VerifyError::Message("Verification failed".to_string()))),
        ),
    }
}

async fn access_token(State(state): State<ApiState>) -> Response {
    let outcome = state.hume.fetch_access_token().await;
    state.metrics.record_token("hume", &outcome);

    match outcome {
        TokenOutcome::Issued(access_token) => {
            Json(AccessTokenResponse { access_token }).into_response()
        }
        TokenOutcome::NotAttempted { reason } => {
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": reason }))).into_response()
        }
        TokenOutcome::Failed { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to get access token" })),
        )
            .into_response(),
    }
}

async fn get_session(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetail>, TalkAiError> {
    InputValidator::validate_identifier("session", &id)?;

    let session = state
        .repository
        .get_session(&id)
        .await?
        .ok_or_else(|| TalkAiError::NotFound(format!("session {id}")))?;
    let messages = state.repository.list_messages(&id).await?;
    Ok(Json(SessionDetail { session, messages }))
}

async fn list_sessions(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Session>>, TalkAiError> {
    InputValidator::validate_identifier("user", &user_id)?;
    Ok(Json(state.repository.list_sessions(&user_id).await?))
}

async fn get_voice_config(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> Result<Json<VoiceConfig>, TalkAiError> {
    InputValidator::validate_identifier("user", &user_id)?;
    state
        .repository
        .get_voice_config(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| TalkAiError::NotFound(format!("voice config for user {user_id}")))
}

async fn list_journal_entries(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<JournalPage>, TalkAiError> {
    InputValidator::validate_identifier("user", &user_id)?;
    let page = PageRequest::from(query);
    InputValidator::validate_page(&page)?;
    Ok(Json(state.repository.list_journal_entries(&user_id, page).await?))
}
