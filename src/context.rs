//! Scoped values handed down the UI tree
//!
//! A provider owns the state; components receive a cheap handle instead of
//! reaching for a global. A handle built with `Default` is detached: it reads
//! defaults and ignores writes until it is replaced by one from a provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::{Message, SessionMessage};

#[derive(Debug, Default)]
struct ResumptionFlags {
    is_resuming: AtomicBool,
    was_recently_resumed: AtomicBool,
}

/// Owner of the resumption flags for one application instance
#[derive(Debug, Default)]
pub struct ResumptionProvider {
    flags: Arc<ResumptionFlags>,
}

impl ResumptionProvider {
    /// Create a provider with both flags cleared
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle bound to this provider
    pub fn context(&self) -> ResumptionContext {
        ResumptionContext { flags: Some(Arc::clone(&self.flags)) }
    }
}

/// Handle to the resumption flags
#[derive(Debug, Clone, Default)]
pub struct ResumptionContext {
    flags: Option<Arc<ResumptionFlags>>,
}

impl ResumptionContext {
    /// True while a previous session is being restored
    pub fn is_resuming(&self) -> bool {
        self.flags.as_ref().is_some_and(|f| f.is_resuming.load(Ordering::Acquire))
    }

    /// True right after a session was restored, until acknowledged
    pub fn was_recently_resumed(&self) -> bool {
        self.flags.as_ref().is_some_and(|f| f.was_recently_resumed.load(Ordering::Acquire))
    }

    /// Set the resuming flag; ignored on a detached handle
    pub fn set_is_resuming(&self, value: bool) {
        if let Some(flags) = &self.flags {
            flags.is_resuming.store(value, Ordering::Release);
        }
    }

    /// Set the recently-resumed flag; ignored on a detached handle
    pub fn set_was_recently_resumed(&self, value: bool) {
        if let Some(flags) = &self.flags {
            flags.was_recently_resumed.store(value, Ordering::Release);
        }
    }

    /// True when bound to a provider
    pub const fn is_attached(&self) -> bool {
        self.flags.is_some()
    }
}

/// Ordered lightweight message records for one subtree
#[derive(Debug, Clone)]
pub struct SessionMessagesContext {
    messages: Arc<[SessionMessage]>,
}

impl Default for SessionMessagesContext {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SessionMessagesContext {
    /// Wrap an ordered list of records
    pub fn new(messages: Vec<SessionMessage>) -> Self {
        Self { messages: messages.into() }
    }

    /// Build from full chat messages, keeping order
    pub fn from_messages(messages: &[Message]) -> Self {
        Self::new(messages.iter().map(SessionMessage::from).collect())
    }

    /// Records in order
    pub fn messages(&self) -> &[SessionMessage] {
        &self.messages
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when there are no records
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
