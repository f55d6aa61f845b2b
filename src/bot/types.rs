use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::poll::PollSpec;

/// A single chat message as delivered by a chat source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique per message, used for dedup
    pub id: String,
    /// Channel id of the author (viewer id)
    pub author_id: String,
    pub author_display_name: String,
    pub text: String,
    pub published_at: DateTime<Utc>,
    pub is_owner: bool,
    pub is_moderator: bool,
}

impl ChatMessage {
    pub fn is_owner_or_moderator(&self) -> bool {
        self.is_owner || self.is_moderator
    }

    /// Role marker used when echoing chat into the log
    pub fn role_marker(&self) -> &'static str {
        if self.is_owner {
            "👑"
        } else if self.is_moderator {
            "🛡️"
        } else {
            "👤"
        }
    }
}

/// One poll cycle's worth of messages plus the cursor for the next cycle
#[derive(Debug, Clone)]
pub struct ChatBatch {
    /// Messages in chronological order, as returned by the source
    pub messages: Vec<ChatMessage>,
    /// Continuation token to resume from
    pub next_token: Option<String>,
    /// Delay recommended by the source before the next fetch
    pub recommended_delay: Duration,
}

/// The live broadcast currently being moderated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSession {
    pub video_id: String,
    /// activeLiveChatId; scopes membership data
    pub live_chat_id: String,
    pub title: Option<String>,
    pub owner_channel_id: Option<String>,
}

impl LiveSession {
    /// Session identifier used to scope persisted membership
    pub fn session_id(&self) -> &str {
        &self.live_chat_id
    }
}

/// Outbound action produced by the welcome tracker or the command router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Post a text message to the chat
    Reply(String),
    /// Create a native poll
    CreatePoll(PollSpec),
    /// Reload the command table from its source
    ReloadCommands,
}

/// Substitute `{username}` in a reply template
pub fn render_template(template: &str, username: &str) -> String {
    template.replace("{username}", username)
}
