use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;

use super::auth::OAuthTokenProvider;
use super::{errors::YouTubeError, types::*};
use crate::boundary::{AuthProvider, SendBoundary, SendError, SessionError, SessionResolver};
use crate::bot::poll::PollSpec;
use crate::bot::types::LiveSession;
use crate::config::http_timeout;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Data API v3 client authenticated with the bot account's OAuth token
pub struct YouTubeClient {
    client: Client,
    base_url: String,
    auth: Arc<OAuthTokenProvider>,
}

/// Owner and title of a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    pub owner_channel_id: Option<String>,
    pub title: String,
}

impl YouTubeClient {
    pub fn new(auth: Arc<OAuthTokenProvider>) -> Result<Self, YouTubeError> {
        Self::with_base_url(auth, API_BASE)
    }

    pub fn with_base_url(
        auth: Arc<OAuthTokenProvider>,
        base_url: impl Into<String>,
    ) -> Result<Self, YouTubeError> {
        let client = Client::builder().timeout(http_timeout()).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn auth(&self) -> &Arc<OAuthTokenProvider> {
        &self.auth
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, YouTubeError> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|e| YouTubeError::Credentials(e.to_string()))?;
        Ok(request.bearer_auth(token))
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, YouTubeError> {
        let url = format!("{}/{}", self.base_url, path);
        let request = self.authorized(self.client.get(&url).query(query)).await?;
        check_status(request.send().await?).await
    }

    /// Channel id of the authenticated account (`channels?mine=true`, quota cost: 1 unit)
    pub async fn my_channel_id(&self) -> Result<String, YouTubeError> {
        let response = self
            .get("channels", &[("part", "id"), ("mine", "true")])
            .await?;
        let data: ChannelListResponse = response.json().await?;

        let channel_id = data
            .items
            .into_iter()
            .next()
            .map(|c| c.id)
            .ok_or(YouTubeError::ChannelNotFound)?;
        log::debug!("Authenticated channel: {}", channel_id);
        Ok(channel_id)
    }

    /// Current live video of a channel (quota cost: 100 units)
    pub async fn find_live_video(
        &self,
        channel_id: &str,
    ) -> Result<(String, Option<String>), YouTubeError> {
        log::info!("🔍 Looking for an active live stream on {}", channel_id);
        let response = self
            .get(
                "search",
                &[
                    ("part", "id,snippet"),
                    ("channelId", channel_id),
                    ("eventType", "live"),
                    ("type", "video"),
                    ("maxResults", "1"),
                ],
            )
            .await?;
        let data: SearchListResponse = response.json().await?;

        data.items
            .into_iter()
            .find_map(|item| {
                let title = item.snippet.and_then(|s| s.title);
                item.id.video_id.map(|id| (id, title))
            })
            .ok_or_else(|| YouTubeError::NoLiveBroadcast(channel_id.to_string()))
    }

    /// `activeLiveChatId` of a video (quota cost: 1 unit)
    pub async fn get_live_chat_id(&self, video_id: &str) -> Result<String, YouTubeError> {
        let response = self
            .get(
                "videos",
                &[("part", "liveStreamingDetails"), ("id", video_id)],
            )
            .await?;
        let data: VideoResponse = response.json().await?;

        let item = data
            .items
            .into_iter()
            .next()
            .ok_or_else(|| YouTubeError::VideoNotFound(video_id.to_string()))?;

        let chat_id = item
            .live_streaming_details
            .and_then(|details| details.active_live_chat_id)
            .ok_or_else(|| YouTubeError::NotLive(video_id.to_string()))?;

        log::info!("Live chat ID retrieved: {}", chat_id);
        Ok(chat_id)
    }

    pub async fn get_video_details(&self, video_id: &str) -> Result<VideoDetails, YouTubeError> {
        let response = self
            .get("videos", &[("part", "snippet"), ("id", video_id)])
            .await?;
        let data: VideoResponse = response.json().await?;

        let snippet = data
            .items
            .into_iter()
            .next()
            .and_then(|item| item.snippet)
            .ok_or_else(|| YouTubeError::VideoNotFound(video_id.to_string()))?;

        Ok(VideoDetails {
            owner_channel_id: snippet.channel_id,
            title: snippet.title.unwrap_or_default(),
        })
    }

    /// One page of `liveChat/messages` (quota cost: ~5 units)
    pub async fn list_chat_messages(
        &self,
        live_chat_id: &str,
        page_token: Option<&str>,
    ) -> Result<LiveChatMessagesResponse, YouTubeError> {
        let mut query = vec![
            ("liveChatId", live_chat_id),
            ("part", "snippet,authorDetails"),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self.get("liveChat/messages", &query).await?;
        let data: LiveChatMessagesResponse = response.json().await?;
        log::debug!(
            "Fetched {} messages (polling interval: {}ms)",
            data.items.len(),
            data.polling_interval_millis
        );
        Ok(data)
    }

    async fn insert_message(&self, body: &InsertMessageRequest) -> Result<(), YouTubeError> {
        let url = format!("{}/liveChat/messages", self.base_url);
        let request = self
            .authorized(self.client.post(&url).query(&[("part", "snippet")]).json(body))
            .await?;
        check_status(request.send().await?).await?;
        Ok(())
    }

    pub async fn insert_text_message(
        &self,
        live_chat_id: &str,
        text: &str,
    ) -> Result<(), YouTubeError> {
        self.insert_message(&InsertMessageRequest::text(live_chat_id, text))
            .await
    }

    pub async fn insert_poll(&self, live_chat_id: &str, poll: &PollSpec) -> Result<(), YouTubeError> {
        self.insert_message(&InsertMessageRequest::poll(live_chat_id, poll))
            .await
    }
}

/// Map a Data API status code (and error reason in the body) onto `YouTubeError`
async fn check_status(response: Response) -> Result<Response, YouTubeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let err = match status {
        StatusCode::BAD_REQUEST if body.contains("pageTokenInvalid") => {
            YouTubeError::InvalidPageToken
        }
        StatusCode::BAD_REQUEST => YouTubeError::BadRequest(body),
        StatusCode::UNAUTHORIZED => YouTubeError::Unauthorized,
        StatusCode::FORBIDDEN => {
            if body.contains("quotaExceeded") {
                YouTubeError::QuotaExceeded
            } else if body.contains("rateLimitExceeded") {
                YouTubeError::RateLimitExceeded
            } else if body.contains("liveChatEnded") {
                YouTubeError::LiveChatEnded
            } else if body.contains("liveChatDisabled") {
                YouTubeError::LiveChatDisabled
            } else {
                YouTubeError::Forbidden(body)
            }
        }
        StatusCode::NOT_FOUND if body.contains("videoNotFound") => {
            YouTubeError::VideoNotFound(body)
        }
        StatusCode::NOT_FOUND => YouTubeError::LiveChatNotFound,
        StatusCode::TOO_MANY_REQUESTS => YouTubeError::RateLimitExceeded,
        s if s.is_server_error() => YouTubeError::ServerError(s.as_u16()),
        s => YouTubeError::ApiError {
            status: s.as_u16(),
            body,
        },
    };

    log::warn!("YouTube API error ({}): {}", status, err);
    Err(err)
}

/// Finds the session to moderate: an explicit video, a configured channel,
/// or the authenticated account's own channel
pub struct BroadcastLocator {
    client: Arc<YouTubeClient>,
    channel_id: Option<String>,
    video_id: Option<String>,
}

impl BroadcastLocator {
    pub fn new(
        client: Arc<YouTubeClient>,
        channel_id: Option<String>,
        video_id: Option<String>,
    ) -> Self {
        Self {
            client,
            channel_id,
            video_id,
        }
    }

    async fn locate(&self) -> Result<LiveSession, YouTubeError> {
        let (video_id, search_title) = match &self.video_id {
            Some(video_id) => (video_id.clone(), None),
            None => {
                let channel_id = match &self.channel_id {
                    Some(id) => id.clone(),
                    None => self.client.my_channel_id().await?,
                };
                self.client.find_live_video(&channel_id).await?
            }
        };

        let live_chat_id = self.client.get_live_chat_id(&video_id).await?;
        let details = self.client.get_video_details(&video_id).await?;
        let title = if details.title.is_empty() {
            search_title
        } else {
            Some(details.title)
        };

        Ok(LiveSession {
            video_id,
            live_chat_id,
            title,
            owner_channel_id: details.owner_channel_id,
        })
    }
}

#[async_trait]
impl SessionResolver for BroadcastLocator {
    async fn find_active_session(&self) -> Result<LiveSession, SessionError> {
        let session = self.locate().await?;
        log::info!(
            "📺 Found live stream: {} ({})",
            session.title.as_deref().unwrap_or("untitled"),
            session.video_id
        );
        Ok(session)
    }
}

/// Posts replies and polls into one live chat
pub struct LiveChatSender {
    client: Arc<YouTubeClient>,
    live_chat_id: String,
}

impl LiveChatSender {
    pub fn new(client: Arc<YouTubeClient>, live_chat_id: impl Into<String>) -> Self {
        Self {
            client,
            live_chat_id: live_chat_id.into(),
        }
    }

    /// Refresh on 401 so the caller's retry goes out with a fresh token
    async fn map_error(&self, err: YouTubeError) -> SendError {
        if matches!(err, YouTubeError::Unauthorized) {
            if let Err(e) = self.client.auth().refresh().await {
                log::error!("Credential refresh after rejected send failed: {}", e);
                return SendError::Rejected(e.to_string());
            }
        }
        SendError::from(err)
    }
}

#[async_trait]
impl SendBoundary for LiveChatSender {
    async fn post_reply(&self, text: &str) -> Result<(), SendError> {
        match self.client.insert_text_message(&self.live_chat_id, text).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.map_error(e).await),
        }
    }

    async fn create_poll(&self, poll: &PollSpec) -> Result<(), SendError> {
        match self.client.insert_poll(&self.live_chat_id, poll).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.map_error(e).await),
        }
    }
}
