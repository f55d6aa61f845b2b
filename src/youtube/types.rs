//! YouTube Data API v3 request/response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bot::poll::PollSpec;
use crate::bot::types::ChatMessage;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessagesResponse {
    #[serde(default)]
    pub polling_interval_millis: u64,
    pub next_page_token: Option<String>,
    /// Set once the chat has gone offline
    pub offline_at: Option<String>,
    #[serde(default)]
    pub items: Vec<LiveChatMessageItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageItem {
    pub id: String,
    pub snippet: MessageSnippet,
    pub author_details: AuthorDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSnippet {
    #[serde(rename = "type")]
    pub message_type: String,
    pub published_at: String,
    #[serde(default)]
    pub display_message: Option<String>,
    #[serde(default)]
    pub text_message_details: Option<TextMessageDetails>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageDetails {
    pub message_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDetails {
    pub channel_id: String,
    pub display_name: String,
    #[serde(default)]
    pub is_chat_owner: bool,
    #[serde(default)]
    pub is_chat_moderator: bool,
}

impl LiveChatMessageItem {
    /// Convert a text message item; other event types yield `None`
    pub fn into_chat_message(self) -> Option<ChatMessage> {
        if self.snippet.message_type != "textMessageEvent" {
            return None;
        }

        let text = self
            .snippet
            .text_message_details
            .map(|d| d.message_text)
            .or(self.snippet.display_message)?;

        let published_at = DateTime::parse_from_rfc3339(&self.snippet.published_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                log::debug!(
                    "Failed to parse publishedAt '{}': {}",
                    self.snippet.published_at,
                    e
                );
                Utc::now()
            });

        Some(ChatMessage {
            id: self.id,
            author_id: self.author_details.channel_id,
            author_display_name: self.author_details.display_name,
            text,
            published_at,
            is_owner: self.author_details.is_chat_owner,
            is_moderator: self.author_details.is_chat_moderator,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VideoResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: Option<String>,
    pub snippet: Option<VideoSnippet>,
    pub live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub channel_id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamingDetails {
    pub active_live_chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelItem {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub id: SearchItemId,
    pub snippet: Option<VideoSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItemId {
    pub video_id: Option<String>,
}

/// Body of `liveChatMessages.insert`
#[derive(Debug, Serialize)]
pub struct InsertMessageRequest {
    pub snippet: InsertSnippet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertSnippet {
    pub live_chat_id: String,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_message_details: Option<TextMessageDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_details: Option<PollDetails>,
}

#[derive(Debug, Serialize)]
pub struct PollDetails {
    pub metadata: PollMetadata,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollMetadata {
    pub question_text: String,
    pub options: Vec<PollOption>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub option_text: String,
}

impl InsertMessageRequest {
    pub fn text(live_chat_id: &str, text: &str) -> Self {
        Self {
            snippet: InsertSnippet {
                live_chat_id: live_chat_id.to_string(),
                message_type: "textMessageEvent",
                text_message_details: Some(TextMessageDetails {
                    message_text: text.to_string(),
                }),
                poll_details: None,
            },
        }
    }

    pub fn poll(live_chat_id: &str, poll: &PollSpec) -> Self {
        Self {
            snippet: InsertSnippet {
                live_chat_id: live_chat_id.to_string(),
                message_type: "pollEvent",
                text_message_details: None,
                poll_details: Some(PollDetails {
                    metadata: PollMetadata {
                        question_text: poll.question.clone(),
                        options: poll
                            .options
                            .iter()
                            .map(|o| PollOption {
                                option_text: o.clone(),
                            })
                            .collect(),
                    },
                    status: "active",
                }),
            },
        }
    }
}
