//! reCAPTCHA token verification
//!
//! [`RecaptchaVerifier`] never returns an error: every failure mode is an
//! explicit [`VerificationOutcome`]. Missing tokens and missing secrets are
//! rejected before any outbound request is made.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, TalkAiError};
use crate::logging::OperationTimer;
use crate::validation::InputValidator;

/// Reply of the siteverify endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SiteVerifyResponse {
    /// Whether the token was accepted
    pub success: bool,
    /// Provider error codes on rejection
    #[serde(rename = "error-codes", default)]
    pub error_codes: Vec<String>,
    /// When the challenge was solved
    #[serde(default)]
    pub challenge_ts: Option<String>,
    /// Site the token was issued for
    #[serde(default)]
    pub hostname: Option<String>,
    /// v3 score
    #[serde(default)]
    pub score: Option<f64>,
    /// v3 action name
    #[serde(default)]
    pub action: Option<String>,
}

/// Outbound verification call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SiteVerifier: Send + Sync {
    /// Ask the provider whether `token` is valid for `secret`
    async fn siteverify(&self, secret: &str, token: &str) -> Result<SiteVerifyResponse>;
}

/// Google siteverify over HTTPS
#[derive(Debug, Clone)]
pub struct GoogleSiteVerifier {
    http: reqwest::Client,
    verify_url: String,
}

impl GoogleSiteVerifier {
    /// Post to `verify_url` with `http`
    pub fn new(http: reqwest::Client, verify_url: impl Into<String>) -> Self {
        Self { http, verify_url: verify_url.into() }
    }
}

#[async_trait]
impl SiteVerifier for GoogleSiteVerifier {
    async fn siteverify(&self, secret: &str, token: &str) -> Result<SiteVerifyResponse> {
        let response = self
            .http
            .post(&self.verify_url)
            .form(&[("secret", secret), ("response", token)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TalkAiError::Upstream { status, body });
        }

        Ok(response.json().await?)
    }
}

/// Result of verifying one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The provider accepted the token
    Verified,
    /// The provider rejected the token
    Rejected {
        /// Codes reported by the provider
        error_codes: Vec<String>,
    },
    /// No token was supplied; nothing was sent
    MissingToken,
    /// The token is malformed; nothing was sent
    InvalidToken {
        /// Why the token was refused
        reason: String,
    },
    /// No secret is configured; nothing was sent
    NotConfigured,
    /// The provider could not be reached or answered garbage
    Unavailable {
        /// Transport or decode error
        reason: String,
    },
}

impl VerificationOutcome {
    /// True only for [`VerificationOutcome::Verified`]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }

    /// Metric label
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Rejected { .. } => "rejected",
            Self::MissingToken => "missing_token",
            Self::InvalidToken { .. } => "invalid_token",
            Self::NotConfigured => "not_configured",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// Verifies tokens with a server-held secret
pub struct RecaptchaVerifier {
    client: Arc<dyn SiteVerifier>,
    secret: Option<String>,
}

impl RecaptchaVerifier {
    /// A blank secret counts as none
    pub fn new(client: Arc<dyn SiteVerifier>, secret: Option<String>) -> Self {
        let secret = secret.filter(|s| !s.trim().is_empty());
        Self { client, secret }
    }

    /// True when a secret is present
    pub const fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Check `token` with the provider
    ///
    /// Blank tokens count as missing. Missing or malformed tokens and a
    /// missing secret are answered locally.
    pub async fn verify(&self, token: Option<&str>) -> VerificationOutcome {
        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            debug!("Rejecting verification without token");
            return VerificationOutcome::MissingToken;
        };

        if let Err(e) = InputValidator::validate_recaptcha_token(token) {
            debug!(error = %e, "Rejecting malformed token");
            return VerificationOutcome::InvalidToken { reason: e.to_string() };
        }

        let Some(secret) = self.secret.as_deref() else {
            warn!("reCAPTCHA secret is not configured");
            return VerificationOutcome::NotConfigured;
        };

        let timer = OperationTimer::new("recaptcha_verify");
        let result = self.client.siteverify(secret, token).await;
        timer.finish();

        match result {
            Ok(reply) if reply.success => {
                debug!(hostname = ?reply.hostname, score = ?reply.score, "reCAPTCHA token verified");
                VerificationOutcome::Verified
            }
            Ok(reply) => {
                debug!(error_codes = ?reply.error_codes, "reCAPTCHA token rejected");
                VerificationOutcome::Rejected { error_codes: reply.error_codes }
            }
            Err(e) => {
                warn!(error = %e, "reCAPTCHA verification failed");
                VerificationOutcome::Unavailable { reason: e.to_string() }
            }
        }
    }
}
