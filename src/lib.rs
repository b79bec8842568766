//! talkAI - chat state and backend-for-frontend
//!
//! State containers and vendor glue for the talkAI voice/emotion chat apps,
//! plus the small HTTP server the apps call for secrets-bearing requests.
//!
//! # Features
//!
//! - Observable chat, session and emotion stores
//! - Scoped resumption and session-message contexts
//! - reCAPTCHA verification and Hume access-token minting
//! - Session, message and journal access over Supabase
//! - Axum routes for the web and mobile apps

/// Same-origin access-token fetch
pub mod access_token;
/// HTTP routes
pub mod api;
/// Configuration management
pub mod config;
/// Scoped values handed down the UI tree
pub mod context;
/// Error types
pub mod error;
/// Hume access tokens
pub mod hume;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// reCAPTCHA verification
pub mod recaptcha;
/// Repository pattern for data access
pub mod repository;
/// Composition root for the chat state
pub mod service;
/// Observable state containers
pub mod store;
/// Supabase-backed repository
pub mod supabase;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use error::{Result, TalkAiError};
pub use models::{EmotionMetrics, Message, Session, TokenOutcome};
pub use service::ChatService;
pub use store::{ChatStore, EmotionStore, SessionStore};
