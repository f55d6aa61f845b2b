use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Prune stale entries once the map grows past this size
const PRUNE_THRESHOLD: usize = 256;

/// Trigger used for the shared key when the scope is global
const GLOBAL_ACTION: &str = "*";

/// How cooldown keys are shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownScope {
    /// Each command has its own window, shared by all senders
    #[default]
    PerCommand,
    /// One window shared by every command and every sender
    Global,
}

/// Composite key: (command action, scope id)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub action: String,
    pub scope_id: &'static str,
}

impl CooldownKey {
    pub fn new(action: &str, scope: CooldownScope) -> Self {
        match scope {
            CooldownScope::PerCommand => Self {
                action: action.to_string(),
                scope_id: "command",
            },
            CooldownScope::Global => Self {
                action: GLOBAL_ACTION.to_string(),
                scope_id: "global",
            },
        }
    }
}

/// Per-key last-fired store
///
/// Not persisted: cooldowns reset when the process restarts.
#[derive(Debug)]
pub struct CooldownTracker {
    window: Duration,
    last_fired: HashMap<CooldownKey, Instant>,
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Eligible iff there is no prior fire for `key` within the window
    pub fn is_eligible(&self, key: &CooldownKey, now: Instant) -> bool {
        match self.last_fired.get(key) {
            Some(fired_at) => now.saturating_duration_since(*fired_at) >= self.window,
            None => true,
        }
    }

    pub fn mark_fired(&mut self, key: CooldownKey, now: Instant) {
        self.last_fired.insert(key, now);
        if self.last_fired.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }
    }

    /// Drop entries whose window has already elapsed
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.last_fired
            .retain(|_, fired_at| now.saturating_duration_since(*fired_at) < window);
    }

    pub fn len(&self) -> usize {
        self.last_fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fired.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_is_eligible() {
        let tracker = CooldownTracker::new(Duration::from_secs(5));
        let key = CooldownKey::new("/discord", CooldownScope::PerCommand);
        assert!(tracker.is_eligible(&key, Instant::now()));
    }

    #[test]
    fn test_window_boundaries() {
        let mut tracker = CooldownTracker::new(Duration::from_secs(5));
        let key = CooldownKey::new("/discord", CooldownScope::PerCommand);
        let t0 = Instant::now();

        tracker.mark_fired(key.clone(), t0);
        assert!(!tracker.is_eligible(&key, t0));
        assert!(!tracker.is_eligible(&key, t0 + Duration::from_millis(4999)));
        // exactly W apart is eligible again
        assert!(tracker.is_eligible(&key, t0 + Duration::from_secs(5)));
        assert!(tracker.is_eligible(&key, t0 + Duration::from_secs(60)));
    }

    #[test]
    fn test_per_command_keys_are_independent() {
        let mut tracker = CooldownTracker::new(Duration::from_secs(5));
        let discord = CooldownKey::new("/discord", CooldownScope::PerCommand);
        let socials = CooldownKey::new("/socials", CooldownScope::PerCommand);
        let t0 = Instant::now();

        tracker.mark_fired(discord.clone(), t0);
        assert!(!tracker.is_eligible(&discord, t0));
        assert!(tracker.is_eligible(&socials, t0));
    }

    #[test]
    fn test_global_scope_shares_one_key() {
        let a = CooldownKey::new("/discord", CooldownScope::Global);
        let b = CooldownKey::new("/socials", CooldownScope::Global);
        assert_eq!(a, b);
    }

    #[test]
    fn test_prune_drops_expired_entries() {
        let mut tracker = CooldownTracker::new(Duration::from_secs(5));
        let t0 = Instant::now();
        tracker.mark_fired(CooldownKey::new("/a", CooldownScope::PerCommand), t0);
        tracker.mark_fired(
            CooldownKey::new("/b", CooldownScope::PerCommand),
            t0 + Duration::from_secs(3),
        );

        tracker.prune(t0 + Duration::from_secs(6));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.is_eligible(
            &CooldownKey::new("/a", CooldownScope::PerCommand),
            t0 + Duration::from_secs(6)
        ));
    }
}
