//! # Polyglot Chat
//!
//! Participants in the same process context join ad-hoc rooms and exchange
//! chat messages that every reader sees translated into their own language.
//!
//! ## Components
//! - [`gateway`]: translate / detect-language service contract and the LLM-backed client
//! - [`channel`]: in-process broadcast scoped to a room identifier
//! - [`membership`]: participant set derived from protocol envelopes
//! - [`pipeline`]: placeholder-then-translate message handling and bulk retranslation
//! - [`session`]: join/leave state machine that owns all of the above

pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod languages;
pub mod membership;
pub mod pipeline;
pub mod protocol;
pub mod providers;
pub mod session;
pub mod state;
pub mod transcript;

use std::time::{SystemTime, UNIX_EPOCH};

pub use channel::{ChannelHub, RoomHandle};
pub use error::{ChatError, Result};
pub use gateway::{LlmGateway, TranslationGateway};
pub use protocol::{ProtocolEnvelope, RoomIdentifier, SessionId};
pub use session::{JoinRequest, SessionController, SessionPhase};
pub use transcript::{ChatMessage, MessageKind};

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
