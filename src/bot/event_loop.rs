//! Chat event loop
//!
//! One fetch in flight at a time. Each batch is deduplicated, then every
//! message goes through the welcome tracker and the command router in source
//! order, and the resulting actions are sent before the next message.
//!
//! ```text
//!            ok                      transient
//!   Polling ───▶ Polling     Polling ─────────▶ Retrying ──ok──▶ Polling
//!      │                        │                  │
//!      │ session ended / stop   │ auth expired     │ retries exhausted
//!      ▼                        ▼ (refresh once)   ▼
//!   Stopped                  Polling / Fatal     Fatal
//! ```

use rand::Rng;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::backoff::ExponentialBackoff;
use super::commands::CommandRegistry;
use super::cooldown::CooldownTracker;
use super::membership::MembershipStore;
use super::router::CommandRouter;
use super::status::{create_shared_status, SharedStatus};
use super::types::{Action, ChatMessage};
use super::welcome::WelcomeTracker;
use crate::boundary::{AuthProvider, ChatSource, FetchError, SendBoundary, SendError};
use crate::error::BotError;

/// Upper bound of remembered message ids (FIFO eviction)
const MAX_SEEN_IDS: usize = 10_000;

const DEFAULT_SEND_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_SEND_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Polling,
    Retrying,
    Stopped,
    Fatal,
}

/// Why [`ChatEventLoop::run`] returned normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The stop signal was raised
    Stopped,
    /// The broadcast ended
    SessionEnded,
}

/// Cloneable stop signal; interrupts the inter-cycle sleep immediately
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`stop`](Self::stop) has been called
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Back-off for transient fetch failures
    pub backoff: ExponentialBackoff,
    /// Record the first batch's authors without welcoming them
    pub seed_from_history: bool,
    /// Attempts per outbound send, including the first
    pub send_retry_attempts: u32,
    pub send_retry_delay: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            backoff: ExponentialBackoff::new().with_jitter(),
            seed_from_history: true,
            send_retry_attempts: DEFAULT_SEND_RETRY_ATTEMPTS,
            send_retry_delay: DEFAULT_SEND_RETRY_DELAY,
        }
    }
}

/// Everything the loop drives, already resolved for one session
pub struct LoopParts {
    pub source: Box<dyn ChatSource>,
    pub sender: Arc<dyn SendBoundary>,
    pub auth: Arc<dyn AuthProvider>,
    pub commands: Arc<CommandRegistry>,
    pub router: CommandRouter,
    pub welcome: WelcomeTracker,
    pub membership: MembershipStore,
    pub cooldown: Duration,
}

/// Message ids already processed, bounded with FIFO eviction
#[derive(Debug, Default)]
struct SeenMessages {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenMessages {
    /// `true` if `id` had not been seen yet
    fn insert(&mut self, id: &str) -> bool {
        if !self.ids.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());

        while self.ids.len() > MAX_SEEN_IDS {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.ids.remove(&oldest);
                }
                None => break,
            }
        }
        true
    }
}

pub struct ChatEventLoop {
    source: Box<dyn ChatSource>,
    sender: Arc<dyn SendBoundary>,
    auth: Arc<dyn AuthProvider>,
    commands: Arc<CommandRegistry>,
    router: CommandRouter,
    welcome: WelcomeTracker,
    membership: MembershipStore,
    cooldowns: CooldownTracker,
    backoff: ExponentialBackoff,
    settings: LoopSettings,
    seen: SeenMessages,
    token: Option<String>,
    seed_pending: bool,
    state: LoopState,
    status: SharedStatus,
    stop: StopHandle,
}

impl ChatEventLoop {
    pub fn new(parts: LoopParts, settings: LoopSettings) -> Self {
        Self {
            source: parts.source,
            sender: parts.sender,
            auth: parts.auth,
            commands: parts.commands,
            router: parts.router,
            welcome: parts.welcome,
            membership: parts.membership,
            cooldowns: CooldownTracker::new(parts.cooldown),
            backoff: settings.backoff.clone(),
            seed_pending: settings.seed_from_history,
            settings,
            seen: SeenMessages::default(),
            token: None,
            state: LoopState::Polling,
            status: create_shared_status(),
            stop: StopHandle::new(),
        }
    }

    pub fn with_status(mut self, status: SharedStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn membership(&self) -> &MembershipStore {
        &self.membership
    }

    /// Poll until the session ends, the stop signal is raised or a fatal error occurs
    pub async fn run(&mut self) -> Result<LoopExit, BotError> {
        {
            let mut status = self.status.write().await;
            status.running = true;
            status.welcomed_count = self.membership.len();
            status.trigger_count = self.commands.snapshot().trigger_count();
        }

        let result = self.drive().await;

        let mut status = self.status.write().await;
        status.running = false;
        status.welcomed_count = self.membership.len();
        if let Err(e) = &result {
            status.last_error = Some(e.to_string());
        }
        result
    }

    async fn drive(&mut self) -> Result<LoopExit, BotError> {
        // set after a refresh, cleared by the next successful fetch
        let mut auth_refreshed = false;

        loop {
            if self.stop.is_stopped() {
                self.state = LoopState::Stopped;
                return Ok(LoopExit::Stopped);
            }

            let delay = match self.source.fetch_next(self.token.as_deref()).await {
                Ok(batch) => {
                    if self.state == LoopState::Retrying {
                        log::info!("✅ Chat connection recovered");
                    }
                    self.state = LoopState::Polling;
                    self.backoff.reset();
                    auth_refreshed = false;

                    if let Some(token) = batch.next_token {
                        self.token = Some(token);
                    }
                    self.process_batch(batch.messages).await;
                    batch.recommended_delay
                }
                Err(FetchError::Transient(reason)) => {
                    if !self.backoff.should_retry() {
                        self.state = LoopState::Fatal;
                        return Err(BotError::RetriesExhausted {
                            attempts: self.backoff.attempt_count(),
                            last_error: reason,
                        });
                    }
                    self.state = LoopState::Retrying;
                    let delay = self.backoff.next_delay();
                    log::warn!(
                        "⚠️  Chat fetch failed: {} (retry #{} in {:?})",
                        reason,
                        self.backoff.attempt_count(),
                        delay
                    );
                    self.record_error(reason).await;
                    delay
                }
                Err(FetchError::AuthExpired) => {
                    if auth_refreshed {
                        self.state = LoopState::Fatal;
                        return Err(BotError::AuthRejected);
                    }
                    log::info!("🔄 Authorization expired, refreshing credentials...");
                    if let Err(e) = self.auth.refresh().await {
                        self.state = LoopState::Fatal;
                        return Err(BotError::Auth(e));
                    }
                    auth_refreshed = true;
                    continue;
                }
                Err(FetchError::SessionEnded(reason)) => {
                    log::info!("🏁 Live session ended: {}", reason);
                    self.state = LoopState::Stopped;
                    return Ok(LoopExit::SessionEnded);
                }
            };

            if !self.sleep_unless_stopped(delay).await {
                self.state = LoopState::Stopped;
                return Ok(LoopExit::Stopped);
            }
        }
    }

    /// `false` if the stop signal cut the sleep short
    async fn sleep_unless_stopped(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.stop.stopped() => false,
        }
    }

    async fn process_batch(&mut self, messages: Vec<ChatMessage>) {
        let fresh: Vec<ChatMessage> = messages
            .into_iter()
            .filter(|m| self.seen.insert(&m.id))
            .collect();

        if self.seed_pending {
            self.seed_pending = false;
            log::debug!("Seeding from {} backlog message(s)", fresh.len());
            if let Err(e) = self
                .welcome
                .seed_from_history(&fresh, &mut self.membership)
                .await
            {
                log::warn!("⚠️  Could not seed viewers from chat history: {}", e);
                self.record_error(e.to_string()).await;
            }
            self.status.write().await.welcomed_count = self.membership.len();
            return;
        }

        if !fresh.is_empty() {
            log::debug!("{} new message(s)", fresh.len());
        }
        for message in &fresh {
            self.process_message(message).await;
        }
    }

    async fn process_message(&mut self, message: &ChatMessage) {
        log::info!(
            "{} {}: {}",
            message.role_marker(),
            message.author_display_name,
            message.text
        );

        // one table for the whole message, even if a reload lands meanwhile
        let table = self.commands.snapshot();

        match self.welcome.on_message(message, &mut self.membership).await {
            Ok(Some(action)) => self.dispatch(action).await,
            Ok(None) => {}
            Err(e) => {
                log::warn!(
                    "⚠️  Could not record {} as welcomed: {} (will retry on their next message)",
                    message.author_display_name,
                    e
                );
                self.record_error(e.to_string()).await;
            }
        }

        if let Some(action) = self.router.route(message, &table, &mut self.cooldowns) {
            self.dispatch(action).await;
        }

        let mut status = self.status.write().await;
        status.messages_processed += 1;
        status.welcomed_count = self.membership.len();
    }

    async fn dispatch(&self, action: Action) {
        match action {
            Action::Reply(text) => {
                self.send_reply(&text).await;
            }
            Action::CreatePoll(poll) => {
                let sender = &self.sender;
                let result = send_with_retry(
                    self.settings.send_retry_attempts,
                    self.settings.send_retry_delay,
                    || sender.create_poll(&poll),
                )
                .await;

                match result {
                    Ok(()) => {
                        log::info!(
                            "📊 Poll created: '{}' with {} options",
                            poll.question,
                            poll.count
                        );
                        self.status.write().await.polls_created += 1;
                        self.send_reply(&format!("📊 Poll started: {}", poll.question))
                            .await;
                    }
                    Err(e) => {
                        log::error!("❌ Failed to create poll: {}", e);
                        self.record_error(e.to_string()).await;
                        self.send_reply("❌ Could not create the poll. Please try again later.")
                            .await;
                    }
                }
            }
            Action::ReloadCommands => match self.commands.reload().await {
                Ok(trigger_count) => {
                    self.status.write().await.trigger_count = trigger_count;
                    self.send_reply(&format!(
                        "✅ Commands reloaded! ({} triggers)",
                        trigger_count
                    ))
                    .await;
                }
                Err(e) => {
                    log::error!("❌ Command reload failed: {}", e);
                    self.record_error(e.to_string()).await;
                    self.send_reply(&format!(
                        "❌ Reload failed, previous commands kept: {}",
                        e
                    ))
                    .await;
                }
            },
        }
    }

    /// Send failures are logged and never abort the cycle
    async fn send_reply(&self, text: &str) -> bool {
        let sender = &self.sender;
        let result = send_with_retry(
            self.settings.send_retry_attempts,
            self.settings.send_retry_delay,
            || sender.post_reply(text),
        )
        .await;

        match result {
            Ok(()) => {
                log::debug!("📤 Sent: {}", text);
                self.status.write().await.replies_sent += 1;
                true
            }
            Err(e) => {
                log::error!("❌ Failed to send message: {}", e);
                self.record_error(e.to_string()).await;
                false
            }
        }
    }

    async fn record_error(&self, error: String) {
        self.status.write().await.last_error = Some(error);
    }
}

/// Short bounded retry for outbound actions; rejections are not retried
async fn send_with_retry<F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<(), SendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), SendError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let jitter_ms = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 2);
                let wait = delay * attempt + Duration::from_millis(jitter_ms);
                log::debug!("Send attempt {} failed ({}), retrying in {:?}", attempt, e, wait);
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{AuthError, BadgePrivilege};
    use crate::bot::commands::{CommandRegistry, CommandSource};
    use crate::bot::cooldown::CooldownScope;
    use crate::bot::membership::test_support::MemoryBackend;
    use crate::bot::poll::PollSpec;
    use crate::bot::router::POLL_FORBIDDEN;
    use crate::bot::types::ChatBatch;
    use crate::storage::PersistenceBackend;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays a script of fetch results; ends the session once exhausted
    struct ScriptedSource {
        script: VecDeque<Result<ChatBatch, FetchError>>,
        fetches: Arc<Mutex<Vec<Instant>>>,
    }

    #[async_trait]
    impl ChatSource for ScriptedSource {
        async fn fetch_next(&mut self, _token: Option<&str>) -> Result<ChatBatch, FetchError> {
            self.fetches.lock().unwrap().push(Instant::now());
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::SessionEnded("script finished".to_string())))
        }
    }

    /// Never ends; every batch asks for a long wait
    struct IdleSource;

    #[async_trait]
    impl ChatSource for IdleSource {
        async fn fetch_next(&mut self, _token: Option<&str>) -> Result<ChatBatch, FetchError> {
            Ok(batch(vec![], Duration::from_secs(3600)))
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        replies: Mutex<Vec<String>>,
        polls: Mutex<Vec<PollSpec>>,
        transient_failures: AtomicUsize,
    }

    impl RecordingSender {
        fn replies(&self) -> Vec<String> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SendBoundary for RecordingSender {
        async fn post_reply(&self, text: &str) -> Result<(), SendError> {
            if self
                .transient_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(SendError::Transient("503".to_string()));
            }
            self.replies.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn create_poll(&self, poll: &PollSpec) -> Result<(), SendError> {
            self.polls.lock().unwrap().push(poll.clone());
            Ok(())
        }
    }

    struct CountingAuth {
        refreshes: AtomicUsize,
        succeed: bool,
    }

    #[async_trait]
    impl AuthProvider for CountingAuth {
        async fn refresh(&self) -> Result<(), AuthError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(())
            } else {
                Err(AuthError::RefreshFailed("invalid_grant".to_string()))
            }
        }
    }

    fn batch(messages: Vec<ChatMessage>, delay: Duration) -> ChatBatch {
        ChatBatch {
            messages,
            next_token: Some("next".to_string()),
            recommended_delay: delay,
        }
    }

    fn msg(id: &str, author: &str, text: &str, moderator: bool) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            author_id: format!("UC_{}", author),
            author_display_name: author.to_string(),
            text: text.to_string(),
            published_at: Utc::now(),
            is_owner: false,
            is_moderator: moderator,
        }
    }

    struct Harness {
        event_loop: ChatEventLoop,
        sender: Arc<RecordingSender>,
        auth: Arc<CountingAuth>,
        fetches: Arc<Mutex<Vec<Instant>>>,
        backend: Arc<MemoryBackend>,
    }

    async fn harness(
        script: Vec<Result<ChatBatch, FetchError>>,
        settings: LoopSettings,
        auth_succeeds: bool,
    ) -> Harness {
        let backend = Arc::new(MemoryBackend::default());
        backend
            .write(
                "commands.json",
                br#"[{"action": "/discord", "aliases": ["/dc"], "reply": "{username}, join our Discord!"}]"#,
            )
            .await
            .unwrap();

        let commands = Arc::new(
            CommandRegistry::load(CommandSource::new(backend.clone(), "commands.json"))
                .await
                .unwrap(),
        );
        let membership = MembershipStore::load("chat", backend.clone()).await.unwrap();
        let sender = Arc::new(RecordingSender::default());
        let auth = Arc::new(CountingAuth {
            refreshes: AtomicUsize::new(0),
            succeed: auth_succeeds,
        });
        let fetches = Arc::new(Mutex::new(Vec::new()));

        let parts = LoopParts {
            source: Box::new(ScriptedSource {
                script: script.into(),
                fetches: fetches.clone(),
            }),
            sender: sender.clone(),
            auth: auth.clone(),
            commands,
            router: CommandRouter::new("/", CooldownScope::PerCommand, Arc::new(BadgePrivilege)),
            welcome: WelcomeTracker::new("Welcome, {username}!"),
            membership,
            cooldown: Duration::from_secs(5),
        };

        Harness {
            event_loop: ChatEventLoop::new(parts, settings),
            sender,
            auth,
            fetches,
            backend,
        }
    }

    /// Parts sharing the harness's sender and backend around another source
    async fn parts_with(
        h: &Harness,
        source: Box<dyn ChatSource>,
        auth: Arc<dyn AuthProvider>,
    ) -> LoopParts {
        LoopParts {
            source,
            sender: h.sender.clone(),
            auth,
            commands: Arc::new(
                CommandRegistry::load(CommandSource::new(h.backend.clone(), "commands.json"))
                    .await
                    .unwrap(),
            ),
            router: CommandRouter::new("/", CooldownScope::PerCommand, Arc::new(BadgePrivilege)),
            welcome: WelcomeTracker::new("Welcome, {username}!"),
            membership: MembershipStore::load("chat", h.backend.clone()).await.unwrap(),
            cooldown: Duration::from_secs(5),
        }
    }

    fn settings(seed_from_history: bool) -> LoopSettings {
        LoopSettings {
            backoff: ExponentialBackoff::with_config(
                Duration::from_millis(100),
                Duration::from_millis(1000),
                None,
            ),
            seed_from_history,
            send_retry_attempts: 3,
            send_retry_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_ended_stops_fetching() {
        let mut h = harness(
            vec![
                Ok(batch(vec![], Duration::from_secs(1))),
                Err(FetchError::SessionEnded("liveChatEnded".to_string())),
                Ok(batch(vec![], Duration::from_secs(1))),
            ],
            settings(false),
            true,
        )
        .await;

        assert_eq!(h.event_loop.run().await.unwrap(), LoopExit::SessionEnded);
        assert_eq!(h.fetches.lock().unwrap().len(), 2);
        assert_eq!(h.event_loop.state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_back_off_strictly_increasing() {
        let transient = || Err(FetchError::Transient("429".to_string()));
        let mut h = harness(
            vec![
                transient(),
                transient(),
                transient(),
                transient(),
                transient(),
                Ok(batch(vec![], Duration::from_millis(50))),
            ],
            settings(false),
            true,
        )
        .await;

        assert_eq!(h.event_loop.run().await.unwrap(), LoopExit::SessionEnded);

        let fetches = h.fetches.lock().unwrap().clone();
        let gaps: Vec<Duration> = fetches.windows(2).map(|w| w[1] - w[0]).collect();
        // 100, 200, 400, 800, then capped at 1000
        assert_eq!(gaps[0], Duration::from_millis(100));
        for pair in gaps[..4].windows(2) {
            assert!(pair[1] > pair[0], "{:?} should exceed {:?}", pair[1], pair[0]);
        }
        assert_eq!(gaps[4], Duration::from_millis(1000));
        // after recovery the source's own delay applies again
        assert_eq!(gaps[5], Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_is_fatal() {
        let mut settings = settings(false);
        settings.backoff =
            ExponentialBackoff::with_config(Duration::from_millis(10), Duration::from_millis(100), Some(2));
        let transient = || Err(FetchError::Transient("503".to_string()));
        let mut h = harness(vec![transient(), transient(), transient()], settings, true).await;

        let result = h.event_loop.run().await;
        assert!(matches!(result, Err(BotError::RetriesExhausted { attempts: 2, .. })));
        assert_eq!(h.event_loop.state(), LoopState::Fatal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_expired_refreshes_once() {
        let mut h = harness(
            vec![
                Err(FetchError::AuthExpired),
                Ok(batch(vec![], Duration::from_secs(1))),
            ],
            settings(false),
            true,
        )
        .await;

        assert_eq!(h.event_loop.run().await.unwrap(), LoopExit::SessionEnded);
        assert_eq!(h.auth.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_expired_twice_is_fatal() {
        let mut h = harness(
            vec![Err(FetchError::AuthExpired), Err(FetchError::AuthExpired)],
            settings(false),
            true,
        )
        .await;

        assert!(matches!(h.event_loop.run().await, Err(BotError::AuthRejected)));
        assert_eq!(h.auth.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_is_fatal() {
        let mut h = harness(vec![Err(FetchError::AuthExpired)], settings(false), false).await;

        assert!(matches!(h.event_loop.run().await, Err(BotError::Auth(_))));
        // no fetch after the failed refresh
        assert_eq!(h.fetches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_ends_run() {
        use crate::youtube::client::test_support::expired_token_provider;
        use crate::youtube::{OfficialChatSource, YouTubeClient};

        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let auth = expired_token_provider(&dir, &format!("{}/token", server.url())).await;
        let client = Arc::new(YouTubeClient::with_base_url(auth.clone(), server.url()).unwrap());

        let mut h = harness(vec![], settings(false), true).await;
        let parts = parts_with(&h, Box::new(OfficialChatSource::new(client, "chat1")), auth).await;
        h.event_loop = ChatEventLoop::new(parts, settings(false));

        assert!(matches!(h.event_loop.run().await, Err(BotError::Auth(_))));
        assert_eq!(h.event_loop.state(), LoopState::Fatal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_welcome_then_command() {
        let first = msg("m1", "Alice", "/discord", false);
        let mut h = harness(
            vec![
                Ok(batch(vec![first.clone()], Duration::from_secs(1))),
                // redelivered message is skipped
                Ok(batch(vec![first], Duration::from_secs(1))),
                Ok(batch(
                    vec![msg("m2", "Alice", "/dc", false)],
                    Duration::from_secs(10),
                )),
            ],
            settings(false),
            true,
        )
        .await;

        h.event_loop.run().await.unwrap();

        assert_eq!(
            h.sender.replies(),
            vec![
                "Welcome, Alice!".to_string(),
                "Alice, join our Discord!".to_string(),
            ]
        );
        assert_eq!(h.event_loop.membership().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_seeding_suppresses_welcomes() {
        let mut h = harness(
            vec![
                Ok(batch(
                    vec![msg("m1", "Bob", "/discord", false)],
                    Duration::from_secs(1),
                )),
                Ok(batch(
                    vec![msg("m2", "Bob", "hi again", false), msg("m3", "Carol", "hello", false)],
                    Duration::from_secs(1),
                )),
            ],
            settings(true),
            true,
        )
        .await;

        h.event_loop.run().await.unwrap();

        // backlog neither welcomed nor routed
        assert_eq!(h.sender.replies(), vec!["Welcome, Carol!".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unprivileged_poll_never_reaches_create_poll() {
        let mut h = harness(
            vec![Ok(batch(
                vec![
                    msg("m1", "Mallory", r#"/poll "Q" "1" "2""#, false),
                    msg("m2", "Mod", r#"/poll "Best snack?" "Chips" "Fruit""#, true),
                ],
                Duration::from_secs(1),
            ))],
            settings(false),
            true,
        )
        .await;

        h.event_loop.run().await.unwrap();

        let polls = h.sender.polls.lock().unwrap().clone();
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0].question, "Best snack?");
        assert!(h.sender.replies().contains(&POLL_FORBIDDEN.to_string()));
        assert!(h
            .sender
            .replies()
            .contains(&"📊 Poll started: Best snack?".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_replies_with_trigger_count() {
        let mut h = harness(
            vec![Ok(batch(
                vec![msg("m1", "Mod", "/reload", true)],
                Duration::from_secs(1),
            ))],
            settings(false),
            true,
        )
        .await;
        h.backend
            .write(
                "commands.json",
                br#"[{"action": "/discord", "aliases": ["/dc", "/chat"], "reply": "x"}, {"action": "/socials", "reply": "y"}]"#,
            )
            .await
            .unwrap();

        h.event_loop.run().await.unwrap();

        assert!(h
            .sender
            .replies()
            .contains(&"✅ Commands reloaded! (4 triggers)".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_send_failure_is_retried() {
        let h = harness(
            vec![Ok(batch(
                vec![msg("m1", "Alice", "hello", false)],
                Duration::from_secs(1),
            ))],
            settings(false),
            true,
        )
        .await;
        h.sender.transient_failures.store(2, Ordering::SeqCst);

        let mut event_loop = h.event_loop;
        event_loop.run().await.unwrap();
        assert_eq!(h.sender.replies(), vec!["Welcome, Alice!".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_does_not_abort_cycle() {
        let h = harness(
            vec![Ok(batch(
                vec![msg("m1", "Alice", "hello", false), msg("m2", "Bob", "hey", false)],
                Duration::from_secs(1),
            ))],
            settings(false),
            true,
        )
        .await;
        // exhausts all three attempts of the first welcome
        h.sender.transient_failures.store(3, Ordering::SeqCst);

        let mut event_loop = h.event_loop;
        assert_eq!(event_loop.run().await.unwrap(), LoopExit::SessionEnded);
        assert_eq!(h.sender.replies(), vec!["Welcome, Bob!".to_string()]);
    }

    #[tokio::test]
    async fn test_stop_signal_interrupts_sleep() {
        let h = harness(vec![], settings(false), true).await;
        let parts = parts_with(&h, Box::new(IdleSource), h.auth.clone()).await;
        let mut event_loop = ChatEventLoop::new(parts, settings(false));
        let stop = event_loop.stop_handle();

        let task = tokio::spawn(async move { event_loop.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();

        let exit = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("loop should stop promptly")
            .unwrap()
            .unwrap();
        assert_eq!(exit, LoopExit::Stopped);
    }

    #[tokio::test]
    async fn test_stop_before_run_fetches_nothing() {
        let mut h = harness(vec![], settings(false), true).await;
        h.event_loop.stop_handle().stop();

        assert_eq!(h.event_loop.run().await.unwrap(), LoopExit::Stopped);
        assert!(h.fetches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_seen_messages_evicts_oldest() {
        let mut seen = SeenMessages::default();
        assert!(seen.insert("a"));
        assert!(!seen.insert("a"));

        for i in 0..MAX_SEEN_IDS {
            seen.insert(&format!("id-{}", i));
        }
        assert_eq!(seen.ids.len(), MAX_SEEN_IDS);
        // "a" was the oldest and has been evicted
        assert!(seen.insert("a"));
    }
}
