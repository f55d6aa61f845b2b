use thiserror::Error;

use crate::boundary::{FetchError, SendError, SessionError};

#[derive(Error, Debug)]
pub enum YouTubeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Access token is invalid or expired")]
    Unauthorized,

    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Video '{0}' is not live or has no active chat")]
    NotLive(String),

    #[error("No active live broadcast found on channel '{0}'")]
    NoLiveBroadcast(String),

    #[error("Could not detect the authenticated channel; set channel_id in config.json")]
    ChannelNotFound,

    #[error("Live chat not found or disabled")]
    LiveChatNotFound,

    #[error("Live chat has ended")]
    LiveChatEnded,

    #[error("Live chat is disabled for this video")]
    LiveChatDisabled,

    #[error("Invalid page token - resetting pagination")]
    InvalidPageToken,

    #[error("Quota exceeded - please try again tomorrow")]
    QuotaExceeded,

    #[error("Rate limit exceeded - retrying with backoff")]
    RateLimitExceeded,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error: {0}")]
    ServerError(u16),

    #[error("Unexpected API response {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("InnerTube client not initialized: no continuation token on the live chat page")]
    InnerTubeNotInitialized,

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl YouTubeError {
    /// Chat is gone for good; polling again will not help
    pub fn is_session_over(&self) -> bool {
        matches!(
            self,
            YouTubeError::LiveChatEnded
                | YouTubeError::LiveChatNotFound
                | YouTubeError::LiveChatDisabled
                | YouTubeError::VideoNotFound(_)
                | YouTubeError::NotLive(_)
                | YouTubeError::InnerTubeNotInitialized
        )
    }
}

impl From<YouTubeError> for FetchError {
    fn from(err: YouTubeError) -> Self {
        match err {
            YouTubeError::Unauthorized | YouTubeError::Credentials(_) => FetchError::AuthExpired,
            e if e.is_session_over() => FetchError::SessionEnded(e.to_string()),
            e => FetchError::Transient(e.to_string()),
        }
    }
}

impl From<YouTubeError> for SendError {
    fn from(err: YouTubeError) -> Self {
        match err {
            YouTubeError::HttpError(_)
            | YouTubeError::RateLimitExceeded
            | YouTubeError::ServerError(_)
            | YouTubeError::Unauthorized => SendError::Transient(err.to_string()),
            e => SendError::Rejected(e.to_string()),
        }
    }
}

impl From<YouTubeError> for SessionError {
    fn from(err: YouTubeError) -> Self {
        match err {
            YouTubeError::NoLiveBroadcast(_)
            | YouTubeError::ChannelNotFound
            | YouTubeError::NotLive(_)
            | YouTubeError::VideoNotFound(_) => SessionError::NotFound(err.to_string()),
            e => SessionError::Lookup(e.to_string()),
        }
    }
}
