//! Boundaries between the chat engine and the outside world
//!
//! The engine in [`crate::bot`] only talks to these traits. The YouTube
//! implementations live in [`crate::youtube`]; tests use in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::bot::poll::PollSpec;
use crate::bot::types::{ChatBatch, ChatMessage, LiveSession};

/// Failure modes of a chat fetch, as seen by the event loop
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Rate limiting, network hiccups, 5xx: retry with back-off
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Credentials expired; one refresh is attempted
    #[error("authorization expired")]
    AuthExpired,

    /// The live session ended or does not exist
    #[error("live session ended: {0}")]
    SessionEnded(String),
}

/// Failure of an outbound chat action
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("send failed: {0}")]
    Transient(String),

    #[error("send rejected: {0}")]
    Rejected(String),
}

impl SendError {
    /// Rejections (permissions, invalid payload) are not worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Transient(_))
    }
}

/// Failure of the opaque credential refresh
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no stored credentials at {0}; complete the OAuth consent flow first")]
    MissingCredentials(String),

    #[error("credential file is invalid: {0}")]
    InvalidCredentials(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no active live session: {0}")]
    NotFound(String),

    #[error("session lookup failed: {0}")]
    Lookup(String),
}

/// Source of chat messages for one session
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Fetch messages newer than `token` (`None` on the first call)
    async fn fetch_next(&mut self, token: Option<&str>) -> Result<ChatBatch, FetchError>;
}

/// Locates the live session to moderate when none was given explicitly
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn find_active_session(&self) -> Result<LiveSession, SessionError>;
}

/// Outbound chat actions
#[async_trait]
pub trait SendBoundary: Send + Sync {
    async fn post_reply(&self, text: &str) -> Result<(), SendError>;

    async fn create_poll(&self, poll: &PollSpec) -> Result<(), SendError>;
}

/// Opaque credential refresher, invoked only after `FetchError::AuthExpired`
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn refresh(&self) -> Result<(), AuthError>;
}

/// Decides whether a sender may run `/reload` and `/poll`
pub trait PrivilegeOracle: Send + Sync {
    fn is_privileged(&self, message: &ChatMessage) -> bool;
}

/// Trusts the owner/moderator badges attached by the chat source
#[derive(Debug, Default, Clone, Copy)]
pub struct BadgePrivilege;

impl PrivilegeOracle for BadgePrivilege {
    fn is_privileged(&self, message: &ChatMessage) -> bool {
        message.is_owner_or_moderator()
    }
}
