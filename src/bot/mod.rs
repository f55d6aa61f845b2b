//! Chat-processing engine: event loop, command dispatch, welcomes

pub mod backoff;
pub mod commands;
pub mod cooldown;
pub mod event_loop;
pub mod membership;
pub mod poll;
pub mod router;
pub mod status;
pub mod types;
pub mod welcome;

pub use commands::{CommandDefinition, CommandRegistry, CommandSource, CommandTable, LoadError};
pub use cooldown::{CooldownScope, CooldownTracker};
pub use event_loop::{ChatEventLoop, LoopExit, LoopParts, LoopSettings, LoopState, StopHandle};
pub use membership::MembershipStore;
pub use poll::{parse_poll, PollError, PollSpec};
pub use router::CommandRouter;
pub use status::{create_shared_status, BotStatus, SharedStatus};
pub use types::{Action, ChatBatch, ChatMessage, LiveSession};
pub use welcome::WelcomeTracker;
