//! stryker: a moderator bot for YouTube live chat
//!
//! Welcomes first-time chatters, answers configured commands, runs native
//! polls for moderators, and hot-reloads its command table.

pub mod boundary;
pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod storage;
pub mod util; // pub for doctests
pub mod youtube;

pub use error::BotError;
