//! Observable session state.
//!
//! [`SessionState`] is the view model handed to the rendering layer: who is in
//! the room, what has been said, and the last translation error. It is shared
//! between the session controller and in-flight pipeline tasks behind a
//! `std::sync::Mutex`; the lock is never held across an `.await`.

use std::sync::{Arc, Mutex};

use crate::membership::MembershipTracker;
use crate::protocol::{RoomIdentifier, SessionId};
use crate::transcript::{ChatMessage, Transcript};

/// Shared handle to one session's state.
pub type SharedState = Arc<Mutex<SessionState>>;

#[derive(Debug, Clone)]
pub struct SessionState {
    pub local_name: String,
    pub local_session: SessionId,
    /// Room name as typed, for display.
    pub room_name: String,
    pub room_identifier: RoomIdentifier,
    pub target_language: String,
    pub transcript: Transcript,
    pub participants: MembershipTracker,
    /// Most recent error notice. A new error replaces the previous one.
    pub last_error: Option<String>,
    /// Bumped on every target-language change; results computed for an older
    /// generation must not overwrite translations.
    pub generation: u64,
}

impl SessionState {
    /// Fresh state for a just-opened session: the local participant only and
    /// the welcome line.
    pub fn new(
        local_name: &str,
        local_session: SessionId,
        room_name: &str,
        room_identifier: RoomIdentifier,
        target_language: &str,
    ) -> Self {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::system(welcome_text(local_name, room_name)));
        SessionState {
            local_name: local_name.to_string(),
            local_session,
            room_name: room_name.to_string(),
            room_identifier,
            target_language: target_language.to_string(),
            transcript,
            participants: MembershipTracker::seeded(local_session, local_name),
            last_error: None,
            generation: 0,
        }
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Participant names for display, the local one marked `(You)`.
    pub fn participant_labels(&self) -> Vec<String> {
        self.participants
            .participants()
            .iter()
            .map(|p| {
                if p.session_id == self.local_session {
                    format!("{} (You)", p.name)
                } else {
                    p.name.clone()
                }
            })
            .collect()
    }
}

pub fn welcome_text(name: &str, room: &str) -> String {
    format!("Welcome, {}! You have joined room \"{}\".", name, room)
}

pub fn joined_text(name: &str) -> String {
    format!("{} has joined the room.", name)
}

pub fn left_text(name: &str) -> String {
    format!("{} has left the room.", name)
}
