//! Room identifiers and the envelopes exchanged over a room channel.
//!
//! ## Wire form
//! Envelopes are internally tagged by `type` with camelCase fields:
//!
//! ```json
//! {"type":"MESSAGE","senderName":"A","sessionId":"…","text":"Hola"}
//! {"type":"USER_JOINED","senderName":"B","sessionId":"…"}
//! ```
//!
//! Every envelope carries the sender's display name and the per-join
//! [`SessionId`]; only `MESSAGE` carries text.

use serde::{Deserialize, Serialize};

/// Separator placed between the room name and the trimmed password.
pub const ROOM_PASSWORD_SEPARATOR: char = '#';

// ---------------------------------------------------------------------------
// RoomIdentifier
// ---------------------------------------------------------------------------

/// The key a room channel is scoped to.
///
/// Two participants reach the same channel iff they derive the same
/// identifier. Only the password is trimmed; case and inner whitespace are
/// significant everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomIdentifier(String);

impl RoomIdentifier {
    /// Derive the identifier from a room name and an optional password.
    ///
    /// A password that is empty after trimming is treated as absent.
    pub fn derive(room_name: &str, password: Option<&str>) -> Self {
        match password.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => RoomIdentifier(format!("{}{}{}", room_name, ROOM_PASSWORD_SEPARATOR, p)),
            None => RoomIdentifier(room_name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Ephemeral identity generated on every join.
///
/// Distinguishes participants that share a display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ProtocolEnvelope
// ---------------------------------------------------------------------------

/// Discriminant of a [`ProtocolEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Message,
    UserJoined,
    UserLeft,
    PresenceAnnouncement,
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeKind::Message => write!(f, "MESSAGE"),
            EnvelopeKind::UserJoined => write!(f, "USER_JOINED"),
            EnvelopeKind::UserLeft => write!(f, "USER_LEFT"),
            EnvelopeKind::PresenceAnnouncement => write!(f, "PRESENCE_ANNOUNCEMENT"),
        }
    }
}

/// A protocol message in transit on a room channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ProtocolEnvelope {
    Message { sender_name: String, session_id: SessionId, text: String },
    UserJoined { sender_name: String, session_id: SessionId },
    UserLeft { sender_name: String, session_id: SessionId },
    PresenceAnnouncement { sender_name: String, session_id: SessionId },
}

impl ProtocolEnvelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            ProtocolEnvelope::Message { .. } => EnvelopeKind::Message,
            ProtocolEnvelope::UserJoined { .. } => EnvelopeKind::UserJoined,
            ProtocolEnvelope::UserLeft { .. } => EnvelopeKind::UserLeft,
            ProtocolEnvelope::PresenceAnnouncement { .. } => EnvelopeKind::PresenceAnnouncement,
        }
    }

    pub fn sender_name(&self) -> &str {
        match self {
            ProtocolEnvelope::Message { sender_name, .. }
            | ProtocolEnvelope::UserJoined { sender_name, .. }
            | ProtocolEnvelope::UserLeft { sender_name, .. }
            | ProtocolEnvelope::PresenceAnnouncement { sender_name, .. } => sender_name,
        }
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            ProtocolEnvelope::Message { session_id, .. }
            | ProtocolEnvelope::UserJoined { session_id, .. }
            | ProtocolEnvelope::UserLeft { session_id, .. }
            | ProtocolEnvelope::PresenceAnnouncement { session_id, .. } => *session_id,
        }
    }

    /// Message text, present only on `MESSAGE` envelopes.
    pub fn text(&self) -> Option<&str> {
        match self {
            ProtocolEnvelope::Message { text, .. } => Some(text),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
