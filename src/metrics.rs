//! Counters for verification, token and repository activity

use metrics::{counter, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::models::TokenOutcome;
use crate::recaptcha::VerificationOutcome;

/// Verifications by outcome
pub const RECAPTCHA_VERIFICATIONS_TOTAL: &str = "talkai_recaptcha_verifications_total";
/// Token requests by source and outcome
pub const ACCESS_TOKEN_REQUESTS_TOTAL: &str = "talkai_access_token_requests_total";
/// Repository calls by operation and status
pub const REPOSITORY_OPERATIONS_TOTAL: &str = "talkai_repository_operations_total";
/// Repository call latency
pub const REPOSITORY_OPERATION_DURATION: &str = "talkai_repository_operation_duration_seconds";
/// Errors by type and operation
pub const ERRORS_TOTAL: &str = "talkai_errors_total";

/// Metrics collection and management
///
/// Counts are kept locally for diagnostics and tests, and every event is also
/// emitted through the `metrics` facade for whichever recorder is installed.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    recaptcha_verifications: AtomicU64,
    recaptcha_rejections: AtomicU64,
    tokens_issued: AtomicU64,
    token_failures: AtomicU64,
    repository_operations: AtomicU64,
    errors: AtomicU64,
}

impl MetricsCollector {
    /// Collector with all counts at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a reCAPTCHA verification
    pub fn record_verification(&self, outcome: &VerificationOutcome) {
        self.recaptcha_verifications.fetch_add(1, Ordering::Relaxed);
        if !outcome.is_verified() {
            self.recaptcha_rejections.fetch_add(1, Ordering::Relaxed);
        }
        counter!(RECAPTCHA_VERIFICATIONS_TOTAL, "outcome" => outcome.label()).increment(1);

        if matches!(outcome, VerificationOutcome::Unavailable { .. }) {
            self.record_error("recaptcha", "verify");
        }
    }

    /// Record the outcome of an access-token request from `source`
    pub fn record_token(&self, source: &'static str, outcome: &TokenOutcome) {
        if outcome.is_issued() {
            self.tokens_issued.fetch_add(1, Ordering::Relaxed);
        } else {
            self.token_failures.fetch_add(1, Ordering::Relaxed);
        }
        counter!(ACCESS_TOKEN_REQUESTS_TOTAL, "source" => source, "outcome" => outcome.label())
            .increment(1);
    }

    /// Record a database operation
    pub fn record_repository_operation(&self, operation: &'static str, duration: Duration, success: bool) {
        self.repository_operations.fetch_add(1, Ordering::Relaxed);
        let status = if success { "success" } else { "error" };

        counter!(REPOSITORY_OPERATIONS_TOTAL, "operation" => operation, "status" => status).increment(1);
        histogram!(REPOSITORY_OPERATION_DURATION, "operation" => operation).record(duration.as_secs_f64());

        if !success {
            self.record_error("repository", operation);
        }
    }

    /// Record error metrics
    pub fn record_error(&self, error_type: &'static str, operation: &'static str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        counter!(ERRORS_TOTAL, "type" => error_type, "operation" => operation).increment(1);
    }

    /// Verifications recorded
    pub fn recaptcha_verifications(&self) -> u64 {
        self.recaptcha_verifications.load(Ordering::Relaxed)
    }

    /// Verifications that did not pass
    pub fn recaptcha_rejections(&self) -> u64 {
        self.recaptcha_rejections.load(Ordering::Relaxed)
    }

    /// Tokens issued
    pub fn tokens_issued(&self) -> u64 {
        self.tokens_issued.load(Ordering::Relaxed)
    }

    /// Token requests that yielded no token
    pub fn token_failures(&self) -> u64 {
        self.token_failures.load(Ordering::Relaxed)
    }

    /// Repository calls recorded
    pub fn repository_operations(&self) -> u64 {
        self.repository_operations.load(Ordering::Relaxed)
    }

    /// Errors of any kind
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}
