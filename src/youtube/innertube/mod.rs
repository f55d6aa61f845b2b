//! InnerTube live chat: YouTube's internal endpoint used by the web player
//!
//! Needs no API key and costs no quota, but the format is unofficial and may
//! change without notice.

pub mod client;
pub mod parser;
pub mod source;
pub mod types;

pub use client::InnerTubeClient;
pub use parser::parse_chat_response;
pub use source::InnerTubeChatSource;
