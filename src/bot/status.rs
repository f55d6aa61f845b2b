use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::LiveSession;

/// Status shared between the event loop and the dashboard
pub type SharedStatus = Arc<RwLock<BotStatus>>;

pub fn create_shared_status() -> SharedStatus {
    Arc::new(RwLock::new(BotStatus::default()))
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub session: Option<LiveSession>,
    pub welcomed_count: usize,
    pub trigger_count: usize,
    pub messages_processed: u64,
    pub replies_sent: u64,
    pub polls_created: u64,
    pub last_error: Option<String>,
}

impl BotStatus {
    pub fn mark_started(&mut self, session: LiveSession, now: DateTime<Utc>) {
        self.running = true;
        self.started_at = Some(now);
        self.session = Some(session);
        self.last_error = None;
    }

    pub fn uptime_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        match (self.running, self.started_at) {
            (true, Some(started)) => Some((now - started).num_seconds().max(0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_uptime_only_while_running() {
        let mut status = BotStatus::default();
        let t0 = Utc::now();
        assert_eq!(status.uptime_secs(t0), None);

        status.mark_started(
            LiveSession {
                video_id: "v".to_string(),
                live_chat_id: "c".to_string(),
                title: None,
                owner_channel_id: None,
            },
            t0,
        );
        assert_eq!(status.uptime_secs(t0 + Duration::seconds(90)), Some(90));

        status.running = false;
        assert_eq!(status.uptime_secs(t0 + Duration::seconds(90)), None);
    }
}
