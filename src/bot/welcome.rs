use std::collections::HashSet;

use super::membership::MembershipStore;
use super::types::{render_template, Action, ChatMessage};
use crate::storage::StorageError;

pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome to the stream, {username}! 🎉";

/// Greets first-time chatters, once per viewer per session
#[derive(Debug)]
pub struct WelcomeTracker {
    template: String,
    /// Bot and stream owner channels are never greeted
    excluded: HashSet<String>,
}

impl WelcomeTracker {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            excluded: HashSet::new(),
        }
    }

    pub fn exclude(&mut self, channel_id: impl Into<String>) {
        let channel_id = channel_id.into();
        if !channel_id.is_empty() {
            self.excluded.insert(channel_id);
        }
    }

    pub fn is_excluded(&self, channel_id: &str) -> bool {
        self.excluded.contains(channel_id)
    }

    /// Welcome the author if this is their first message in the session
    ///
    /// The membership write is awaited before the welcome is returned; if it
    /// fails no welcome is emitted and the viewer stays unrecorded.
    pub async fn on_message(
        &self,
        message: &ChatMessage,
        membership: &mut MembershipStore,
    ) -> Result<Option<Action>, StorageError> {
        let viewer_id = message.author_id.as_str();
        if viewer_id.is_empty() || self.is_excluded(viewer_id) || membership.contains(viewer_id) {
            return Ok(None);
        }

        if !membership.insert(viewer_id).await? {
            return Ok(None);
        }

        log::info!(
            "👋 Welcomed: {} (total: {})",
            message.author_display_name,
            membership.len()
        );
        Ok(Some(Action::Reply(render_template(
            &self.template,
            &message.author_display_name,
        ))))
    }

    /// Record chatters from the backlog without greeting them
    pub async fn seed_from_history(
        &self,
        messages: &[ChatMessage],
        membership: &mut MembershipStore,
    ) -> Result<usize, StorageError> {
        let added = membership
            .insert_many(
                messages
                    .iter()
                    .map(|m| m.author_id.as_str())
                    .filter(|id| !self.is_excluded(id)),
            )
            .await?;

        if added > 0 {
            log::info!(
                "📜 Seeded {} viewer(s) from chat history (won't be re-welcomed)",
                added
            );
        }
        Ok(added)
    }
}

impl Default for WelcomeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WELCOME_MESSAGE)
    }
}
