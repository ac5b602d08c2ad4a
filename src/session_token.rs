//! Browsing-session token provider
//!
//! A [`SessionContext`] is created by the calling environment when a client
//! session begins and ended when it goes away. The token it hands out is
//! stable for the lifetime of the handle and shared by every recorder that
//! borrows it.

use chrono::Utc;
use std::sync::OnceLock;
use uuid::Uuid;

/// Token prefix
pub const SESSION_TOKEN_PREFIX: &str = "session";

const RANDOM_SUFFIX_LEN: usize = 9;

/// Explicit handle owning the token of one client session context
#[derive(Debug, Default)]
pub struct SessionContext {
    token: OnceLock<String>,
}

impl SessionContext {
    /// Start a fresh context with no token yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a context whose token survived a reload
    pub fn resume(token: impl Into<String>) -> Self {
        let context = Self::new();
        let _ = context.token.set(token.into());
        context
    }

    /// Return the existing token or mint one. Never fails.
    pub fn get_or_create_session_token(&self) -> &str {
        self.token.get_or_init(generate_session_token)
    }

    /// Peek at the token without creating one
    pub fn token(&self) -> Option<&str> {
        self.token.get().map(String::as_str)
    }

    /// End the context, returning the token it held (if any)
    pub fn end(self) -> Option<String> {
        self.token.into_inner()
    }
}

/// `session-<unix millis>-<random suffix>`
pub fn generate_session_token() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        SESSION_TOKEN_PREFIX,
        Utc::now().timestamp_millis(),
        &random[..RANDOM_SUFFIX_LEN]
    )
}
