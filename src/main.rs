use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use stryker::boundary::{AuthError, BadgePrivilege, ChatSource, SendBoundary, SessionResolver};
use stryker::bot::backoff::ExponentialBackoff;
use stryker::bot::{
    create_shared_status, ChatEventLoop, CommandRegistry, CommandRouter, CommandSource,
    LoopExit, LoopParts, LoopSettings, MembershipStore, StopHandle, WelcomeTracker,
};
use stryker::config::{BotConfig, ChatSourceKind, ConfigError, Secrets, StorageKind};
use stryker::server::{self, DashboardState};
use stryker::storage::{FileStore, PersistenceBackend, SqliteStore};
use stryker::util::short_id;
use stryker::youtube::{
    BroadcastLocator, InnerTubeChatSource, InnerTubeClient, LiveChatSender, OAuthTokenProvider,
    OfficialChatSource, YouTubeClient,
};
use stryker::BotError;

const SQLITE_FILE: &str = "stryker.db";

#[derive(Parser, Debug)]
#[command(name = "stryker", version, about = "YouTube live chat moderator bot")]
struct Cli {
    /// Show debug output on the console
    #[arg(short, long)]
    verbose: bool,

    /// Moderate this video instead of auto-detecting the live stream
    #[arg(long)]
    video: Option<String>,

    /// Path to the settings file
    #[arg(long, default_value = stryker::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Serve the status dashboard
    #[arg(long)]
    web: bool,

    /// Dashboard port (overrides config value)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    // .env is optional; the token path falls back to token.json
    let dotenv = dotenvy::dotenv();

    let (mut config, using_defaults) = match BotConfig::load(&cli.config) {
        Ok(Some(config)) => (config, false),
        Ok(None) => (BotConfig::default(), true),
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(video) = &cli.video {
        config.video_id = video.clone();
    }

    if let Err(e) = stryker::logging::init(cli.verbose, &config.log_file()) {
        eprintln!("❌ Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    if let Ok(path) = dotenv {
        log::debug!("Loaded environment from {:?}", path);
    }
    if using_defaults {
        log::warn!(
            "⚠️  {} not found, using default settings",
            cli.config.display()
        );
    }

    match run(&cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: BotConfig) -> Result<(), BotError> {
    config.validate()?;
    let secrets = Secrets::from_env();
    log::debug!("{:?}", secrets);

    log::info!("🔐 Authenticating...");
    let auth = Arc::new(load_credentials(&secrets).await?);
    let client = Arc::new(YouTubeClient::new(Arc::clone(&auth))?);

    let locator = BroadcastLocator::new(
        Arc::clone(&client),
        config.channel_id().map(str::to_string),
        config.video_id().map(str::to_string),
    );
    let session = locator.find_active_session().await?;
    log::info!("💬 Live chat: {}", short_id(&session.live_chat_id, 20));

    let mut welcome = WelcomeTracker::new(config.welcome_message.clone());
    match client.my_channel_id().await {
        Ok(bot_channel) => welcome.exclude(bot_channel),
        Err(e) => log::warn!("Could not detect the bot's own channel: {}", e),
    }
    if let Some(owner) = &session.owner_channel_id {
        welcome.exclude(owner.clone());
    }

    let backend = open_storage(&config).await?;
    let membership = MembershipStore::load(session.session_id(), backend).await?;
    let commands = Arc::new(CommandRegistry::load(command_source(&config.commands_file)?).await?);

    let source: Box<dyn ChatSource> = match config.chat_source {
        ChatSourceKind::Innertube => {
            log::info!("📡 Chat source: InnerTube");
            let inner = InnerTubeClient::new(&session.video_id)?.with_api_key(secrets.api_key.clone());
            Box::new(InnerTubeChatSource::new(inner))
        }
        ChatSourceKind::Official => {
            log::info!("📡 Chat source: Data API");
            Box::new(OfficialChatSource::new(
                Arc::clone(&client),
                &session.live_chat_id,
            ))
        }
    };

    let sender: Arc<dyn SendBoundary> = Arc::new(LiveChatSender::new(
        Arc::clone(&client),
        &session.live_chat_id,
    ));
    let parts = LoopParts {
        source,
        sender: Arc::clone(&sender),
        auth: auth.clone(),
        commands: Arc::clone(&commands),
        router: CommandRouter::new(
            config.bot_prefix.clone(),
            config.cooldown_scope,
            Arc::new(BadgePrivilege),
        ),
        welcome,
        membership,
        cooldown: config.cooldown(),
    };
    let settings = LoopSettings {
        backoff: ExponentialBackoff::with_config(
            config.backoff_base(),
            config.backoff_max(),
            config.max_retry_attempts,
        )
        .with_jitter(),
        seed_from_history: config.seed_from_history,
        ..LoopSettings::default()
    };

    let status = create_shared_status();
    status.write().await.mark_started(session.clone(), Utc::now());
    let stop = StopHandle::new();

    if cli.web {
        let port = cli.port.unwrap_or(config.dashboard_port);
        let listener = server::bind(port)
            .await
            .map_err(|e| BotError::Server(format!("cannot bind port {}: {}", port, e)))?;
        let state = DashboardState {
            status: status.clone(),
            commands: Arc::clone(&commands),
            sender,
            stop: stop.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = server::serve(listener, state).await {
                log::error!("Dashboard stopped: {}", e);
            }
        });
    }

    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("🛑 Shutting down...");
            ctrl_c_stop.stop();
        }
    });

    let mut event_loop = ChatEventLoop::new(parts, settings)
        .with_status(status)
        .with_stop_handle(stop);

    log::info!("🤖 Bot is running. Press Ctrl+C to stop.");
    let result = event_loop.run().await;
    log::info!(
        "👋 Tracked {} viewer(s) this session",
        event_loop.membership().len()
    );

    match result? {
        LoopExit::SessionEnded => log::info!("📴 The live stream has ended"),
        LoopExit::Stopped => log::info!("Bot stopped"),
    }
    Ok(())
}

async fn load_credentials(secrets: &Secrets) -> Result<OAuthTokenProvider, AuthError> {
    match OAuthTokenProvider::load(&secrets.token_file).await {
        Err(AuthError::MissingCredentials(path)) => {
            log::error!(
                "No OAuth token at {}. Authorize the bot account with the client secrets in {:?} and save the authorized-user JSON there.",
                path,
                secrets.client_secret_file
            );
            Err(AuthError::MissingCredentials(path))
        }
        other => other,
    }
}

async fn open_storage(config: &BotConfig) -> Result<Arc<dyn PersistenceBackend>, BotError> {
    match config.storage {
        StorageKind::File => Ok(Arc::new(FileStore::new(&config.data_dir))),
        StorageKind::Sqlite => {
            tokio::fs::create_dir_all(&config.data_dir)
                .await
                .map_err(|source| ConfigError::Io {
                    path: config.data_dir.display().to_string(),
                    source,
                })?;
            let db_path = config.data_dir.join(SQLITE_FILE);
            log::info!("🗄️  Using SQLite storage at {:?}", db_path);
            Ok(Arc::new(SqliteStore::open(&db_path.to_string_lossy()).await?))
        }
    }
}

/// The commands file is read through a `FileStore` rooted at its directory
fn command_source(commands_file: &Path) -> Result<CommandSource, ConfigError> {
    let key = commands_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ConfigError::Invalid(format!("commands_file {:?} has no file name", commands_file))
        })?;
    let dir = commands_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    Ok(CommandSource::new(Arc::new(FileStore::new(dir)), key))
}
