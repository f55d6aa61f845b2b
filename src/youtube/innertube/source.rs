use async_trait::async_trait;
use std::time::Duration;

use super::client::InnerTubeClient;
use super::parser::parse_chat_response;
use crate::boundary::{ChatSource, FetchError};
use crate::bot::types::ChatBatch;

/// Consecutive responses without a continuation before the chat is considered over
const MAX_MISSING_CONTINUATIONS: u32 = 3;

/// Delay used when the server gave no continuation to time against
const FALLBACK_DELAY: Duration = Duration::from_secs(5);

/// Quota-free chat source polling the InnerTube endpoint
pub struct InnerTubeChatSource {
    client: InnerTubeClient,
    missing_continuations: u32,
}

impl InnerTubeChatSource {
    pub fn new(client: InnerTubeClient) -> Self {
        Self {
            client,
            missing_continuations: 0,
        }
    }
}

#[async_trait]
impl ChatSource for InnerTubeChatSource {
    async fn fetch_next(&mut self, token: Option<&str>) -> Result<ChatBatch, FetchError> {
        let continuation = match token {
            Some(token) => token.to_string(),
            None => self.client.initialize().await?,
        };

        let response = self.client.get_chat_messages(&continuation).await?;
        let next = response.get_next_continuation();
        let messages = parse_chat_response(response);

        let (next_token, recommended_delay) = match next {
            Some((next_token, timeout_ms, kind)) => {
                self.missing_continuations = 0;
                let delay = Duration::from_millis(kind.effective_timeout_ms(timeout_ms));
                log::debug!("Next continuation ({:?}), polling in {:?}", kind, delay);
                (Some(next_token), delay)
            }
            None => {
                self.missing_continuations += 1;
                log::warn!(
                    "No next continuation in response ({}/{})",
                    self.missing_continuations,
                    MAX_MISSING_CONTINUATIONS
                );
                if self.missing_continuations >= MAX_MISSING_CONTINUATIONS {
                    return Err(FetchError::SessionEnded(
                        "chat stopped returning continuations".to_string(),
                    ));
                }
                (Some(continuation), FALLBACK_DELAY)
            }
        };

        Ok(ChatBatch {
            messages,
            next_token,
            recommended_delay,
        })
    }
}
