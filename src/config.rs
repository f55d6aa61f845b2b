// =============================================================================
// Settings and shared constants
// =============================================================================
// Secrets come from the environment (.env), everything else from config.json.
// Every config.json field is optional and falls back to the defaults below.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::bot::cooldown::CooldownScope;
use crate::bot::welcome::DEFAULT_WELCOME_MESSAGE;

/// Default timeout for every outbound HTTP request (seconds)
///
/// Used by the Data API, InnerTube and OAuth token clients.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Default timeout for every outbound HTTP request
pub fn http_timeout() -> Duration {
    Duration::from_secs(HTTP_TIMEOUT_SECS)
}

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_DASHBOARD_PORT: u16 = 5000;

/// Environment variables read after `.env` is loaded
pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_CLIENT_SECRET_FILE: &str = "CLIENT_SECRET_FILE";
pub const ENV_TOKEN_FILE: &str = "TOKEN_FILE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSourceKind {
    /// Quota-free internal chat endpoint
    #[default]
    Innertube,
    /// Data API v3 liveChatMessages.list
    Official,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    File,
    Sqlite,
}

/// Contents of `config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Channel to search for a live broadcast; empty means the bot's own channel
    pub channel_id: String,
    /// Fixed broadcast; empty means auto-detect
    pub video_id: String,
    pub bot_prefix: String,
    pub welcome_message: String,
    pub cooldown_seconds: u64,
    pub cooldown_scope: CooldownScope,
    pub data_dir: PathBuf,
    pub commands_file: PathBuf,
    pub chat_source: ChatSourceKind,
    pub storage: StorageKind,
    pub seed_from_history: bool,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub max_retry_attempts: Option<u32>,
    pub dashboard_port: u16,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            video_id: String::new(),
            bot_prefix: "/".to_string(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            cooldown_seconds: 5,
            cooldown_scope: CooldownScope::PerCommand,
            data_dir: PathBuf::from("data"),
            commands_file: PathBuf::from("commands.json"),
            chat_source: ChatSourceKind::Innertube,
            storage: StorageKind::File,
            seed_from_history: true,
            backoff_base_ms: 1000,
            backoff_max_ms: 60_000,
            max_retry_attempts: None,
            dashboard_port: DEFAULT_DASHBOARD_PORT,
        }
    }
}

impl BotConfig {
    /// Load and validate `path`; `Ok(None)` when the file does not exist
    ///
    /// Runs before logging is set up, so callers report the fallback themselves.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let display = path.display().to_string();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: display,
                    source,
                })
            }
        };

        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.validate()?;
        Ok(Some(config))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("bot_prefix must not be empty".to_string()));
        }
        if self.bot_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "bot_prefix must not contain whitespace".to_string(),
            ));
        }
        if self.backoff_base_ms == 0 {
            return Err(ConfigError::Invalid("backoff_base_ms must be positive".to_string()));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::Invalid(
                "backoff_max_ms must be at least backoff_base_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn video_id(&self) -> Option<&str> {
        non_empty(&self.video_id)
    }

    pub fn channel_id(&self) -> Option<&str> {
        non_empty(&self.channel_id)
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("bot.log")
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Secrets from the process environment
#[derive(Clone, Default)]
pub struct Secrets {
    pub api_key: Option<String>,
    pub client_secret_file: PathBuf,
    pub token_file: PathBuf,
}

impl Secrets {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: var(ENV_API_KEY),
            client_secret_file: var(ENV_CLIENT_SECRET_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("client_secret.json")),
            token_file: var(ENV_TOKEN_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("token.json")),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("api_key", &self.api_key.as_deref().map(crate::util::mask_secret))
            .field("client_secret_file", &self.client_secret_file)
            .field("token_file", &self.token_file)
            .finish()
    }
}
