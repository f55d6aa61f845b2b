//! Response shapes of the InnerTube `get_live_chat` endpoint
//!
//! Only the fields the bot reads are modelled; paid messages, stickers and
//! membership events deserialize into an empty `ChatItem` and are skipped.

use serde::Deserialize;

/// Which continuation the server handed back; drives the polling interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationType {
    /// `invalidationContinuationData`: the suggested interval may be shortened
    Invalidation,
    /// `timedContinuationData`: the interval must be honoured
    Timed,
    /// `liveChatReplayContinuationData`
    Reload,
}

/// Guard against absurdly long intervals
const MAX_POLLING_INTERVAL_MS: u64 = 30000;

/// Guard against hammering the endpoint
const MIN_POLLING_INTERVAL_MS: u64 = 500;

/// Interval used when the continuation carries no timeout
const DEFAULT_TIMEOUT_MS: u64 = 5000;

impl ContinuationType {
    pub fn effective_timeout_ms(&self, api_timeout: u64) -> u64 {
        match self {
            ContinuationType::Invalidation => 1000,
            ContinuationType::Timed => {
                api_timeout.clamp(MIN_POLLING_INTERVAL_MS, MAX_POLLING_INTERVAL_MS)
            }
            ContinuationType::Reload => 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerTubeChatResponse {
    pub continuation_contents: Option<ContinuationContents>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationContents {
    pub live_chat_continuation: Option<LiveChatContinuation>,
}

#[derive(Debug, Deserialize)]
pub struct LiveChatContinuation {
    pub actions: Option<Vec<ChatAction>>,
    pub continuations: Option<Vec<Continuation>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAction {
    pub add_chat_item_action: Option<AddChatItemAction>,
    pub replay_chat_item_action: Option<ReplayChatItemAction>,
}

#[derive(Debug, Deserialize)]
pub struct AddChatItemAction {
    pub item: ChatItem,
}

#[derive(Debug, Deserialize)]
pub struct ReplayChatItemAction {
    pub actions: Option<Vec<ChatAction>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatItem {
    pub live_chat_text_message_renderer: Option<LiveChatTextMessageRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatTextMessageRenderer {
    pub id: String,
    pub message: Option<MessageContent>,
    pub author_name: Option<SimpleText>,
    pub author_external_channel_id: Option<String>,
    pub timestamp_usec: Option<String>,
    pub author_badges: Option<Vec<AuthorBadge>>,
}

#[derive(Debug, Deserialize)]
pub struct MessageContent {
    pub runs: Option<Vec<RunItem>>,
}

/// One segment of a message: plain text or an emoji
#[derive(Debug, Deserialize)]
pub struct RunItem {
    pub text: Option<String>,
    pub emoji: Option<InnerTubeEmoji>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerTubeEmoji {
    #[serde(default)]
    pub emoji_id: String,
    pub shortcuts: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleText {
    pub simple_text: Option<String>,
    pub runs: Option<Vec<RunItem>>,
}

impl SimpleText {
    pub fn get_text(&self) -> String {
        if let Some(text) = &self.simple_text {
            return text.clone();
        }
        self.runs
            .as_ref()
            .map(|runs| runs.iter().filter_map(|r| r.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Continuation {
    pub invalidation_continuation_data: Option<InvalidationContinuationData>,
    pub timed_continuation_data: Option<TimedContinuationData>,
    pub live_chat_replay_continuation_data: Option<LiveChatReplayContinuationData>,
}

#[derive(Debug, Deserialize)]
pub struct InvalidationContinuationData {
    pub continuation: String,
    #[serde(rename = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedContinuationData {
    pub continuation: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct LiveChatReplayContinuationData {
    pub continuation: String,
    #[serde(rename = "timeUntilLastMessageMsec")]
    pub time_until_last_message_msec: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorBadge {
    pub live_chat_author_badge_renderer: Option<BadgeRenderer>,
}

#[derive(Debug, Deserialize)]
pub struct BadgeRenderer {
    pub icon: Option<BadgeIcon>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeIcon {
    pub icon_type: String,
}

impl InnerTubeChatResponse {
    /// Next continuation token with its raw timeout and kind.
    /// Priority: invalidation > timed > replay
    pub fn get_next_continuation(&self) -> Option<(String, u64, ContinuationType)> {
        let continuation = self
            .continuation_contents
            .as_ref()?
            .live_chat_continuation
            .as_ref()?
            .continuations
            .as_ref()?
            .first()?;

        if let Some(data) = &continuation.invalidation_continuation_data {
            return Some((
                data.continuation.clone(),
                data.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
                ContinuationType::Invalidation,
            ));
        }
        if let Some(data) = &continuation.timed_continuation_data {
            return Some((
                data.continuation.clone(),
                data.timeout_ms,
                ContinuationType::Timed,
            ));
        }
        if let Some(data) = &continuation.live_chat_replay_continuation_data {
            return Some((
                data.continuation.clone(),
                data.time_until_last_message_msec.unwrap_or(DEFAULT_TIMEOUT_MS),
                ContinuationType::Reload,
            ));
        }

        None
    }
}
