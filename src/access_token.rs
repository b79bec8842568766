//! Same-origin access-token fetch used by the apps before opening a voice socket

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::TokenOutcome;

/// Route the server exposes for minted tokens
pub const ACCESS_TOKEN_PATH: &str = "/api/access-token";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenBody {
    access_token: Option<String>,
}

/// Fetches tokens from the backend-for-frontend's own endpoint
#[derive(Debug, Clone)]
pub struct ClientTokenFetcher {
    http: reqwest::Client,
    endpoint: String,
}

impl ClientTokenFetcher {
    /// Fetch from `base_url` with an existing client
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), ACCESS_TOKEN_PATH);
        Self { http, endpoint }
    }

    /// Build a fetcher with its own client and request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> crate::error::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(http, base_url))
    }

    /// Full URL of the token route
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request a token; failures are logged and reported as `Failed`
    pub async fn fetch(&self) -> TokenOutcome {
        let response = match self.http.get(&self.endpoint).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, endpoint = %self.endpoint, "Access token request failed");
                return TokenOutcome::Failed { reason: e.to_string() };
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Access token endpoint returned an error");
            return TokenOutcome::Failed { reason: format!("HTTP {status}") };
        }

        match response.json::<AccessTokenBody>().await {
            Ok(AccessTokenBody { access_token: Some(token) }) if !token.is_empty() => {
                debug!("Access token received");
                TokenOutcome::Issued(token)
            }
            Ok(_) => TokenOutcome::Failed { reason: "Response carried no access token".to_string() },
            Err(e) => {
                warn!(error = %e, "Access token response could not be parsed");
                TokenOutcome::Failed { reason: e.to_string() }
            }
        }
    }
}
