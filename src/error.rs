//! Crate-level error type.

use thiserror::Error;

/// Errors surfaced by the chat core.
///
/// Translation failures never escape the message pipeline as `Err`; they are
/// rendered as sentinel text plus a session-level error string. Only the
/// variants below reach callers of the public API.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The room channel transport cannot be opened. Fatal to starting a session.
    #[error("room channel transport unavailable: {0}")]
    TransportUnavailable(String),

    /// A send was attempted on a handle that has already been closed.
    #[error("room channel handle is closed")]
    ChannelClosed,

    /// Join request rejected before any channel was opened.
    #[error("invalid join request: {0}")]
    InvalidJoin(String),

    /// `join` called while a session is already active.
    #[error("already joined room '{room}'")]
    AlreadyJoined { room: String },

    /// Operation requires an active session.
    #[error("not joined to any room")]
    NotJoined,

    /// The translation gateway failed (transport, HTTP status or body).
    #[error("translation gateway error: {0}")]
    Gateway(String),

    /// Configuration could not be loaded or is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;
