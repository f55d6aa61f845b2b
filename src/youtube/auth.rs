//! OAuth access token for the Data API, backed by `token.json`
//!
//! The file uses Google's authorized-user format. The interactive consent flow
//! is not part of the bot: a missing file is reported with instructions.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::boundary::{AuthError, AuthProvider};
use crate::config::http_timeout;
use crate::util::mask_secret;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Contents of `token.json`; unknown fields are preserved on write-back
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizedUser {
    /// No usable access token, or it expires within the margin
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => true,
            (Some(_), Some(expiry)) => expiry - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) <= now,
            (Some(_), None) => false,
        }
    }
}

impl std::fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("token", &self.token.as_deref().map(mask_secret))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Supplies bearer tokens and refreshes them through the token endpoint
pub struct OAuthTokenProvider {
    path: PathBuf,
    http: Client,
    credentials: RwLock<AuthorizedUser>,
}

impl OAuthTokenProvider {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref().to_path_buf();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::MissingCredentials(path.display().to_string()))
            }
            Err(e) => return Err(AuthError::Io(e)),
        };
        let credentials: AuthorizedUser = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;

        let http = Client::builder()
            .timeout(http_timeout())
            .build()
            .map_err(|e| AuthError::RefreshFailed(format!("Failed to build HTTP client: {}", e)))?;

        log::debug!("Loaded credentials from {:?}: {:?}", path, credentials);
        Ok(Self {
            path,
            http,
            credentials: RwLock::new(credentials),
        })
    }

    /// A valid access token, refreshing first if it is missing or about to expire
    pub async fn access_token(&self) -> Result<String, AuthError> {
        {
            let credentials = self.credentials.read().await;
            if !credentials.needs_refresh(Utc::now()) {
                if let Some(token) = &credentials.token {
                    return Ok(token.clone());
                }
            }
        }

        self.refresh_access_token().await?;
        self.credentials
            .read()
            .await
            .token
            .clone()
            .ok_or_else(|| AuthError::RefreshFailed("no access token after refresh".to_string()))
    }

    async fn refresh_access_token(&self) -> Result<(), AuthError> {
        let mut credentials = self.credentials.write().await;
        let refresh_token = credentials.refresh_token.clone().ok_or_else(|| {
            AuthError::InvalidCredentials("token file has no refresh_token".to_string())
        })?;

        log::info!("🔄 Refreshing expired credentials...");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        let response = self
            .http
            .post(&credentials.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(format!("{}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("invalid token response: {}", e)))?;

        credentials.token = Some(token.access_token);
        credentials.expiry = token
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));
        if let Some(rotated) = token.refresh_token {
            credentials.refresh_token = Some(rotated);
        }

        let bytes = serde_json::to_vec_pretty(&*credentials)
            .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;
        tokio::fs::write(&self.path, bytes).await?;

        log::info!("✅ Credentials saved to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for OAuthTokenProvider {
    async fn refresh(&self) -> Result<(), AuthError> {
        self.refresh_access_token().await
    }
}

impl std::fmt::Debug for OAuthTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenProvider")
            .field("path", &self.path)
            .finish()
    }
}
