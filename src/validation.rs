//! Input checks applied before anything reaches storage or a vendor

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Result, TalkAiError};
use crate::models::PageRequest;

static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap()
});

/// Longest accepted reCAPTCHA token
pub const MAX_TOKEN_LENGTH: usize = 4096;
/// Longest accepted message, in characters
pub const MAX_MESSAGE_LENGTH: usize = 10_000;
/// Largest page size
pub const MAX_PAGE_SIZE: u32 = 100;

fn invalid(message: impl Into<String>) -> TalkAiError {
    TalkAiError::InvalidInput(message.into())
}

/// Validation utilities for request input
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a reCAPTCHA response token
    pub fn validate_recaptcha_token(token: &str) -> Result<()> {
        if token.trim().is_empty() {
            return Err(invalid("Token cannot be empty"));
        }

        if token.len() > MAX_TOKEN_LENGTH {
            return Err(invalid(format!("Token too long (max {MAX_TOKEN_LENGTH} characters)")));
        }

        if token.chars().any(char::is_control) {
            return Err(invalid("Token contains invalid characters"));
        }

        Ok(())
    }

    /// Validate a record identifier (session, user, message)
    pub fn validate_identifier(kind: &str, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(invalid(format!("{kind} id cannot be empty")));
        }

        if !IDENTIFIER_PATTERN.is_match(id) {
            return Err(invalid(format!(
                "{kind} id must be 1-128 characters of letters, digits, '-' or '_'"
            )));
        }

        Ok(())
    }

    /// Validate pagination parameters
    pub fn validate_page(page: &PageRequest) -> Result<()> {
        if page.page == 0 {
            return Err(invalid("page must be at least 1"));
        }

        if page.limit == 0 || page.limit > MAX_PAGE_SIZE {
            return Err(invalid(format!("limit must be between 1 and {MAX_PAGE_SIZE}")));
        }

        Ok(())
    }

    /// Validate message text
    pub fn validate_message_content(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(invalid("Message content cannot be empty"));
        }

        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(invalid(format!(
                "Message content too long (max {MAX_MESSAGE_LENGTH} characters)"
            )));
        }

        Ok(())
    }

    /// Validate emotion or prosody scores
    pub fn validate_emotion_scores<'a>(scores: impl IntoIterator<Item = (&'a String, &'a f64)>) -> Result<()> {
        for (label, score) in scores {
            if label.trim().is_empty() {
                return Err(invalid("Emotion label cannot be empty"));
            }
            if !score.is_finite() || *score < 0.0 {
                return Err(invalid(format!("Emotion score for {label} must be a non-negative number")));
            }
        }

        Ok(())
    }
}
