//! Access tokens for the Hume voice/emotion API
//!
//! Tokens are minted with the OAuth2 client-credentials grant. Failures are
//! logged and reported as a [`TokenOutcome`]; callers never see an error.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{Result, TalkAiError};
use crate::logging::OperationTimer;
use crate::models::TokenOutcome;

/// The vendor SDK stringifies a missing token rather than failing
const UNDEFINED_TOKEN: &str = "undefined";

/// API key and secret pair
#[derive(Clone, PartialEq, Eq)]
pub struct HumeCredentials {
    /// Public API key
    pub api_key: String,
    /// Secret key
    pub secret_key: String,
}

impl fmt::Debug for HumeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HumeCredentials")
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Outbound token exchange
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Exchange credentials for an access token
    async fn issue_token(&self, credentials: &HumeCredentials) -> Result<String>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Client-credentials exchange against the Hume token endpoint
#[derive(Debug, Clone)]
pub struct HumeTokenIssuer {
    http: reqwest::Client,
    token_url: String,
}

impl HumeTokenIssuer {
    /// Exchange tokens at `token_url`
    pub fn new(http: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self { http, token_url: token_url.into() }
    }
}

#[async_trait]
impl TokenIssuer for HumeTokenIssuer {
    async fn issue_token(&self, credentials: &HumeCredentials) -> Result<String> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&credentials.api_key, Some(&credentials.secret_key))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TalkAiError::Upstream { status, body });
        }

        let reply: TokenResponse = response.json().await?;
        // Mirror the SDK, which hands back "undefined" for an absent token
        Ok(reply.access_token.unwrap_or_else(|| UNDEFINED_TOKEN.to_string()))
    }
}

/// Mints access tokens when credentials are configured
pub struct HumeTokenProvider {
    issuer: Arc<dyn TokenIssuer>,
    credentials: Option<HumeCredentials>,
}

impl HumeTokenProvider {
    /// Blank credentials count as none
    pub fn new(issuer: Arc<dyn TokenIssuer>, credentials: Option<HumeCredentials>) -> Self {
        let credentials =
            credentials.filter(|c| !c.api_key.trim().is_empty() && !c.secret_key.trim().is_empty());
        Self { issuer, credentials }
    }

    /// True when credentials are present
    pub const fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Mint a token; never returns an error
    pub async fn fetch_access_token(&self) -> TokenOutcome {
        let Some(credentials) = &self.credentials else {
            warn!("Hume credentials are not configured");
            return TokenOutcome::NotAttempted {
                reason: "Hume API key and secret key are not configured".to_string(),
            };
        };

        let timer = OperationTimer::new("hume_access_token");
        let result = self.issuer.issue_token(credentials).await;
        timer.finish();

        match result {
            Ok(token) if token.is_empty() || token == UNDEFINED_TOKEN => {
                error!("Hume returned no access token");
                TokenOutcome::Failed { reason: "Invalid access token".to_string() }
            }
            Ok(token) => {
                info!("Hume access token issued");
                TokenOutcome::Issued(token)
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch Hume access token");
                TokenOutcome::Failed { reason: e.to_string() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> HumeCredentials {
        HumeCredentials { api_key: "key".into(), secret_key: "secret".into() }
    }

    #[tokio::test]
    async fn test_undefined_token_is_failure() {
        let mut issuer = MockTokenIssuer::new();
        issuer.expect_issue_token().times(1).returning(|_| Ok("undefined".to_string()));
        let provider = HumeTokenProvider::new(Arc::new(issuer), Some(credentials()));

        let outcome = provider.fetch_access_token().await;
        assert!(matches!(outcome, TokenOutcome::Failed { .. }));
        assert_eq!(outcome.into_token(), None);
    }

    #[tokio::test]
    async fn test_issuer_error_is_failure() {
        let mut issuer = MockTokenIssuer::new();
        issuer
            .expect_issue_token()
            .times(1)
            .returning(|_| Err(TalkAiError::Upstream { status: 401, body: "unauthorized".into() }));
        let provider = HumeTokenProvider::new(Arc::new(issuer), Some(credentials()));

        assert!(matches!(provider.fetch_access_token().await, TokenOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_missing_credentials_not_attempted() {
        let mut issuer = MockTokenIssuer::new();
        issuer.expect_issue_token().times(0);
        let provider = HumeTokenProvider::new(
            Arc::new(issuer),
            Some(HumeCredentials { api_key: "key".into(), secret_key: " ".into() }),
        );

        assert!(!provider.is_configured());
        assert!(matches!(provider.fetch_access_token().await, TokenOutcome::NotAttempted { .. }));
    }

    #[tokio::test]
    async fn test_token_issued() {
        let mut issuer = MockTokenIssuer::new();
        issuer
            .expect_issue_token()
            .withf(|c| c.api_key == "key" && c.secret_key == "secret")
            .returning(|_| Ok("tok-123".to_string()));
        let provider = HumeTokenProvider::new(Arc::new(issuer), Some(credentials()));

        assert_eq!(provider.fetch_access_token().await, TokenOutcome::Issued("tok-123".into()));
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("\"key\""));
        assert!(!rendered.contains("\"secret\""));
    }
}
