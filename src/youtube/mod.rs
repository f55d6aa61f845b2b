//! YouTube implementations of the engine boundaries

pub mod auth;
pub mod client;
pub mod errors;
pub mod innertube;
pub mod official;
pub mod types;

pub use auth::OAuthTokenProvider;
pub use client::{BroadcastLocator, LiveChatSender, YouTubeClient};
pub use errors::YouTubeError;
pub use innertube::{InnerTubeChatSource, InnerTubeClient};
pub use official::OfficialChatSource;
