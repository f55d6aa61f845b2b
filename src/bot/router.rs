//! Message → action dispatch with cooldowns

use std::sync::Arc;
use std::time::Instant;

use super::commands::{normalize_trigger, CommandTable};
use super::cooldown::{CooldownKey, CooldownScope, CooldownTracker};
use super::poll::{parse_poll, POLL_USAGE};
use super::types::{render_template, Action, ChatMessage};
use crate::boundary::PrivilegeOracle;

/// Reply to an unprivileged `/poll`
pub const POLL_FORBIDDEN: &str = "⚠️ Only the stream owner or moderators can create polls.";

const RELOAD_COMMAND: &str = "reload";
const POLL_COMMAND: &str = "poll";

/// Resolves inbound messages to at most one outbound action
///
/// The router owns no state of its own: the command table is passed in as the
/// snapshot taken for this message and the cooldown map belongs to the loop.
pub struct CommandRouter {
    prefix: String,
    scope: CooldownScope,
    privilege: Arc<dyn PrivilegeOracle>,
}

impl CommandRouter {
    pub fn new(prefix: impl Into<String>, scope: CooldownScope, privilege: Arc<dyn PrivilegeOracle>) -> Self {
        Self {
            prefix: prefix.into(),
            scope,
            privilege,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn route(
        &self,
        message: &ChatMessage,
        table: &CommandTable,
        cooldowns: &mut CooldownTracker,
    ) -> Option<Action> {
        self.route_at(message, table, cooldowns, Instant::now())
    }

    /// [`route`](Self::route) with an explicit clock
    pub fn route_at(
        &self,
        message: &ChatMessage,
        table: &CommandTable,
        cooldowns: &mut CooldownTracker,
        now: Instant,
    ) -> Option<Action> {
        let text = message.text.trim();
        if self.prefix.is_empty() || !text.starts_with(&self.prefix) {
            return None;
        }

        let (token, args) = match text.split_once(char::is_whitespace) {
            Some((token, rest)) => (token, rest),
            None => (text, ""),
        };
        let trigger = normalize_trigger(token);
        let command = trigger.strip_prefix(&self.prefix).unwrap_or_default();

        if command == RELOAD_COMMAND && self.privilege.is_privileged(message) {
            log::info!("🔄 Reload requested by {}", message.author_display_name);
            return Some(Action::ReloadCommands);
        }

        if command == POLL_COMMAND {
            return self.route_poll(message, &trigger, args, cooldowns, now);
        }

        let Some(definition) = table.lookup(&trigger) else {
            log::debug!("Unknown trigger '{}' from {}", trigger, message.author_display_name);
            return None;
        };

        let key = CooldownKey::new(&normalize_trigger(&definition.action), self.scope);
        if !cooldowns.is_eligible(&key, now) {
            log::debug!("⏳ '{}' is on cooldown", definition.action);
            return None;
        }
        if definition.reply.is_empty() {
            log::warn!("⚠️  Command '{}' has an empty reply", definition.action);
            return None;
        }

        cooldowns.mark_fired(key, now);
        log::info!("💬 {} triggered {}", message.author_display_name, definition.action);
        Some(Action::Reply(render_template(
            &definition.reply,
            &message.author_display_name,
        )))
    }

    fn route_poll(
        &self,
        message: &ChatMessage,
        trigger: &str,
        args: &str,
        cooldowns: &mut CooldownTracker,
        now: Instant,
    ) -> Option<Action> {
        if !self.privilege.is_privileged(message) {
            // rejections have their own window, even under a global scope,
            // so they never mute real command replies
            let key = CooldownKey::new(trigger, CooldownScope::PerCommand);
            if !cooldowns.is_eligible(&key, now) {
                return None;
            }
            cooldowns.mark_fired(key, now);
            log::info!(
                "🚫 {} tried to create a poll without permission",
                message.author_display_name
            );
            return Some(Action::Reply(POLL_FORBIDDEN.to_string()));
        }

        match parse_poll(args) {
            Ok(spec) => Some(Action::CreatePoll(spec)),
            Err(e) => {
                log::warn!("⚠️  Invalid /poll from {}: {}", message.author_display_name, e);
                Some(Action::Reply(POLL_USAGE.to_string()))
            }
        }
    }
}
