use thiserror::Error;

use crate::boundary::{AuthError, SessionError};
use crate::bot::commands::LoadError;
use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::youtube::YouTubeError;

/// Errors that end the bot
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("authorization failed: {0}")]
    Auth(#[from] AuthError),

    #[error("authorization still rejected after a credential refresh")]
    AuthRejected,

    #[error("failed to load commands: {0}")]
    Commands(#[from] LoadError),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    YouTube(#[from] YouTubeError),

    #[error("gave up after {attempts} failed fetch attempt(s): {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("dashboard server error: {0}")]
    Server(String),
}
