//! Chat source backed by the Data API `liveChat/messages` endpoint

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::client::YouTubeClient;
use super::errors::YouTubeError;
use super::types::LiveChatMessagesResponse;
use crate::boundary::{ChatSource, FetchError};
use crate::bot::types::ChatBatch;

/// Used when the API omits `pollingIntervalMillis`
const DEFAULT_POLLING_INTERVAL_MS: u64 = 5000;

/// Never poll faster than this, whatever the API suggests
const MIN_POLLING_INTERVAL_MS: u64 = 1000;

pub struct OfficialChatSource {
    client: Arc<YouTubeClient>,
    live_chat_id: String,
    offline: bool,
}

impl OfficialChatSource {
    pub fn new(client: Arc<YouTubeClient>, live_chat_id: impl Into<String>) -> Self {
        Self {
            client,
            live_chat_id: live_chat_id.into(),
            offline: false,
        }
    }

    async fn list(&self, token: Option<&str>) -> Result<LiveChatMessagesResponse, YouTubeError> {
        match self.client.list_chat_messages(&self.live_chat_id, token).await {
            Err(YouTubeError::InvalidPageToken) if token.is_some() => {
                log::warn!("Page token rejected, restarting pagination");
                self.client.list_chat_messages(&self.live_chat_id, None).await
            }
            other => other,
        }
    }
}

fn polling_delay(interval_ms: u64) -> Duration {
    let ms = if interval_ms == 0 {
        DEFAULT_POLLING_INTERVAL_MS
    } else {
        interval_ms.max(MIN_POLLING_INTERVAL_MS)
    };
    Duration::from_millis(ms)
}

#[async_trait]
impl ChatSource for OfficialChatSource {
    async fn fetch_next(&mut self, token: Option<&str>) -> Result<ChatBatch, FetchError> {
        if self.offline {
            return Err(FetchError::SessionEnded("live chat went offline".to_string()));
        }

        let response = self.list(token).await?;

        if let Some(offline_at) = &response.offline_at {
            log::info!("Live chat went offline at {}", offline_at);
            self.offline = true;
        }

        let recommended_delay = polling_delay(response.polling_interval_millis);
        let messages = response
            .items
            .into_iter()
            .filter_map(|item| item.into_chat_message())
            .collect();

        Ok(ChatBatch {
            messages,
            next_token: response.next_page_token,
            recommended_delay,
        })
    }
}
