//! Session controller: join/leave lifecycle and inbound protocol handling.
//!
//! ## Lifecycle
//! 1. `join` validates the request, derives the [`RoomIdentifier`], opens a
//!    [`RoomHandle`] on the hub, seeds state and broadcasts `USER_JOINED`
//! 2. Inbound envelopes are pulled with [`SessionController::next_inbound`] or
//!    [`SessionController::drain_inbound`] and folded into state
//! 3. `leave` (or dropping the controller) broadcasts `USER_LEFT`, closes the
//!    handle and discards the session
//!
//! The channel handle and the state live in `ActiveSession`, which is only
//! constructed once the channel is open and announces the departure from its
//! `Drop`, so every exit path releases the channel.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{ChannelHub, RoomHandle};
use crate::error::{ChatError, Result};
use crate::gateway::TranslationGateway;
use crate::languages::DEFAULT_TARGET_LANGUAGE;
use crate::membership::Participant;
use crate::pipeline::MessagePipeline;
use crate::protocol::{ProtocolEnvelope, RoomIdentifier, SessionId};
use crate::state::{joined_text, left_text, SessionState, SharedState};
use crate::transcript::ChatMessage;

// ---------------------------------------------------------------------------
// JoinRequest
// ---------------------------------------------------------------------------

/// Input of the join form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub display_name: String,
    pub room_name: String,
    pub password: Option<String>,
}

impl JoinRequest {
    pub fn new(display_name: impl Into<String>, room_name: impl Into<String>) -> Self {
        JoinRequest { display_name: display_name.into(), room_name: room_name.into(), password: None }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Name and room must be non-empty after trimming. Nothing else is checked.
    pub fn validate(&self) -> Result<()> {
        if self.display_name.trim().is_empty() {
            return Err(ChatError::InvalidJoin("display name must not be empty".to_string()));
        }
        if self.room_name.trim().is_empty() {
            return Err(ChatError::InvalidJoin("room name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn room_identifier(&self) -> RoomIdentifier {
        RoomIdentifier::derive(&self.room_name, self.password.as_deref())
    }
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unjoined,
    Joining,
    Joined,
    Leaving,
}

/// Resources owned for the lifetime of one joined session.
struct ActiveSession {
    handle: RoomHandle,
    state: SharedState,
    pipeline: MessagePipeline,
    local_name: String,
    local_session: SessionId,
}

impl ActiveSession {
    fn presence_envelope(&self) -> ProtocolEnvelope {
        ProtocolEnvelope::PresenceAnnouncement {
            sender_name: self.local_name.clone(),
            session_id: self.local_session,
        }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        if self.handle.is_closed() {
            return;
        }
        // Fire-and-forget: peers that miss this never learn we left.
        let _ = self.handle.send(ProtocolEnvelope::UserLeft {
            sender_name: self.local_name.clone(),
            session_id: self.local_session,
        });
        self.handle.close();
        info!(room = %self.handle.room(), name = %self.local_name, "left room");
    }
}

/// Owns one participant's membership in at most one room.
pub struct SessionController {
    hub: ChannelHub,
    gateway: Arc<dyn TranslationGateway>,
    default_language: String,
    phase: SessionPhase,
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(hub: ChannelHub, gateway: Arc<dyn TranslationGateway>) -> Self {
        SessionController {
            hub,
            gateway,
            default_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            phase: SessionPhase::Unjoined,
            active: None,
        }
    }

    /// Target language new sessions start with.
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_joined(&self) -> bool {
        self.phase == SessionPhase::Joined
    }

    /// Join a room.
    ///
    /// # Errors
    /// - [`ChatError::AlreadyJoined`] if a session is active
    /// - [`ChatError::InvalidJoin`] for blank name or room
    /// - [`ChatError::TransportUnavailable`] if the channel cannot be opened;
    ///   the controller stays `Unjoined`
    pub fn join(&mut self, request: JoinRequest) -> Result<()> {
        if let Some(active) = &self.active {
            let room = active.state.lock().map(|s| s.room_name.clone()).unwrap_or_default();
            return Err(ChatError::AlreadyJoined { room });
        }
        request.validate()?;

        self.phase = SessionPhase::Joining;
        let room_identifier = request.room_identifier();
        let handle = match self.hub.open(&room_identifier) {
            Ok(h) => h,
            Err(e) => {
                self.phase = SessionPhase::Unjoined;
                warn!(room = %room_identifier, error = %e, "join failed");
                return Err(e);
            }
        };

        let local_session = SessionId::new();
        let state = SessionState::new(
            &request.display_name,
            local_session,
            &request.room_name,
            room_identifier.clone(),
            &self.default_language,
        )
        .into_shared();
        let pipeline = MessagePipeline::new(Arc::clone(&self.gateway), Arc::clone(&state));

        let active = ActiveSession {
            handle,
            state,
            pipeline,
            local_name: request.display_name.clone(),
            local_session,
        };
        if let Err(e) = active.handle.send(ProtocolEnvelope::UserJoined {
            sender_name: request.display_name.clone(),
            session_id: local_session,
        }) {
            self.phase = SessionPhase::Unjoined;
            return Err(e);
        }

        self.active = Some(active);
        self.phase = SessionPhase::Joined;
        info!(room = %room_identifier, name = %request.display_name, session = %local_session, "joined room");
        Ok(())
    }

    /// Broadcast a chat message to the other participants.
    ///
    /// Blank text is ignored. The sender does not see its own message in
    /// its transcript; the room channel never delivers to the sender.
    pub fn send_message(&mut self, text: &str) -> Result<()> {
        let active = self.active.as_ref().ok_or(ChatError::NotJoined)?;
        if text.trim().is_empty() {
            return Ok(());
        }
        if let Ok(mut guard) = active.state.lock() {
            guard.last_error = None;
        }
        active.handle.send(ProtocolEnvelope::Message {
            sender_name: active.local_name.clone(),
            session_id: active.local_session,
            text: text.to_string(),
        })
    }

    /// Change the target language and retranslate the transcript.
    ///
    /// The returned handle completes when the batch has been applied.
    pub fn change_language(&mut self, language: &str) -> Result<JoinHandle<()>> {
        let active = self.active.as_ref().ok_or(ChatError::NotJoined)?;
        info!(language, "target language changed");
        Ok(active.pipeline.retranslate_all(language))
    }

    /// Wait for the next inbound envelope. `None` when not joined or closed.
    pub async fn next_inbound(&mut self) -> Option<ProtocolEnvelope> {
        self.active.as_mut()?.handle.recv().await
    }

    /// Handle every envelope already delivered, without waiting.
    ///
    /// Returns the handles of translation tasks started along the way.
    pub fn drain_inbound(&mut self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        loop {
            let envelope = match self.active.as_mut().and_then(|a| a.handle.try_recv()) {
                Some(e) => e,
                None => return tasks,
            };
            tasks.extend(self.handle_inbound(envelope));
        }
    }

    /// Fold one inbound envelope into session state.
    ///
    /// Ignored when not joined or when the envelope carries our own session
    /// id. Returns the translation task for `MESSAGE` envelopes.
    pub fn handle_inbound(&mut self, envelope: ProtocolEnvelope) -> Option<JoinHandle<()>> {
        let active = self.active.as_ref()?;
        if envelope.session_id() == active.local_session {
            return None;
        }
        debug!(kind = %envelope.kind(), sender = envelope.sender_name(), "inbound envelope");

        match &envelope {
            ProtocolEnvelope::Message { .. } => {
                let target_language = active.state.lock().ok()?.target_language.clone();
                active.pipeline.handle(&envelope, &target_language)
            }
            ProtocolEnvelope::UserJoined { sender_name, session_id } => {
                if let Ok(mut guard) = active.state.lock() {
                    guard.participants.observe(*session_id, sender_name);
                    guard.transcript.push(ChatMessage::system(joined_text(sender_name)));
                }
                if let Err(e) = active.handle.send(active.presence_envelope()) {
                    warn!(error = %e, "presence announcement failed");
                }
                None
            }
            ProtocolEnvelope::PresenceAnnouncement { sender_name, session_id } => {
                if let Ok(mut guard) = active.state.lock() {
                    guard.participants.observe(*session_id, sender_name);
                }
                None
            }
            ProtocolEnvelope::UserLeft { sender_name, session_id } => {
                if let Ok(mut guard) = active.state.lock() {
                    guard.participants.remove(*session_id);
                    guard.transcript.push(ChatMessage::system(left_text(sender_name)));
                }
                None
            }
        }
    }

    /// Leave the current room. A no-op when not joined.
    pub fn leave(&mut self) {
        if self.active.is_none() {
            return;
        }
        self.phase = SessionPhase::Leaving;
        self.active = None;
        self.phase = SessionPhase::Unjoined;
    }

    // -- observers -----------------------------------------------------------

    /// Copy of the current session state.
    pub fn snapshot(&self) -> Option<SessionState> {
        let active = self.active.as_ref()?;
        active.state.lock().ok().map(|s| s.clone())
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.snapshot().map(|s| s.transcript.messages().to_vec()).unwrap_or_default()
    }

    pub fn participant_names(&self) -> Vec<String> {
        self.snapshot().map(|s| s.participants.names()).unwrap_or_default()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.snapshot().map(|s| s.participants.participants().to_vec()).unwrap_or_default()
    }

    pub fn last_error(&self) -> Option<String> {
        self.snapshot().and_then(|s| s.last_error)
    }

    /// Clear the error notice.
    pub fn dismiss_error(&mut self) {
        if let Some(active) = &self.active {
            if let Ok(mut guard) = active.state.lock() {
                guard.last_error = None;
            }
        }
    }

    pub fn target_language(&self) -> Option<String> {
        self.snapshot().map(|s| s.target_language)
    }

    pub fn room_identifier(&self) -> Option<RoomIdentifier> {
        self.active.as_ref().map(|a| a.handle.room().clone())
    }

    pub fn local_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.local_session)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NullGateway;

    #[async_trait]
    impl TranslationGateway for NullGateway {
        async fn translate(&self, text: &str, _target_language: &str) -> Result<String> {
            Ok(text.to_string())
        }

        async fn detect_language(&self, _text: &str) -> Result<String> {
            Ok("English".to_string())
        }
    }

    fn controller(hub: &ChannelHub) -> SessionController {
        SessionController::new(hub.clone(), Arc::new(NullGateway))
    }

    #[test]
    fn test_join_request_rejects_blank_name() {
        let err = JoinRequest::new("  ", "lobby").validate().unwrap_err();
        assert!(matches!(err, ChatError::InvalidJoin(_)));
    }

    #[test]
    fn test_join_request_rejects_blank_room() {
        assert!(JoinRequest::new("A", "\t").validate().is_err());
    }

    #[test]
    fn test_join_request_identifier_uses_password() {
        let req = JoinRequest::new("A", "lobby").with_password(" pw ");
        assert_eq!(req.room_identifier().as_str(), "lobby#pw");
    }

    #[test]
    fn test_starts_unjoined() {
        let hub = ChannelHub::new();
        let c = controller(&hub);
        assert_eq!(c.phase(), SessionPhase::Unjoined);
        assert!(c.snapshot().is_none());
        assert!(c.transcript().is_empty());
    }

    #[test]
    fn test_join_transitions_to_joined() {
        let hub = ChannelHub::new();
        let mut c = controller(&hub);
        c.join(JoinRequest::new("A", "lobby")).unwrap();
        assert_eq!(c.phase(), SessionPhase::Joined);
        assert_eq!(c.target_language().as_deref(), Some("English"));
        assert_eq!(c.room_identifier().unwrap().as_str(), "lobby");
    }

    #[test]
    fn test_join_twice_is_rejected() {
        let hub = ChannelHub::new();
        let mut c = controller(&hub);
        c.join(JoinRequest::new("A", "lobby")).unwrap();
        let err = c.join(JoinRequest::new("A", "other")).unwrap_err();
        assert!(matches!(err, ChatError::AlreadyJoined { ref room } if room == "lobby"));
    }

    #[test]
    fn test_join_with_unavailable_transport_stays_unjoined() {
        let hub = ChannelHub::new();
        hub.shutdown();
        let mut c = controller(&hub);
        let err = c.join(JoinRequest::new("A", "lobby")).unwrap_err();
        assert!(matches!(err, ChatError::TransportUnavailable(_)));
        assert_eq!(c.phase(), SessionPhase::Unjoined);
    }

    #[test]
    fn test_send_requires_join() {
        let hub = ChannelHub::new();
        let mut c = controller(&hub);
        assert!(matches!(c.send_message("hi"), Err(ChatError::NotJoined)));
        assert!(matches!(c.change_language("German"), Err(ChatError::NotJoined)));
    }

    #[test]
    fn test_own_session_envelopes_ignored() {
        let hub = ChannelHub::new();
        let mut c = controller(&hub);
        c.join(JoinRequest::new("A", "lobby")).unwrap();
        let me = c.local_session().unwrap();
        c.handle_inbound(ProtocolEnvelope::UserLeft { sender_name: "A".to_string(), session_id: me });
        assert_eq!(c.participant_names(), vec!["A"]);
        assert_eq!(c.transcript().len(), 1);
    }

    #[test]
    fn test_leave_resets_and_releases_channel() {
        let hub = ChannelHub::new();
        let mut c = controller(&hub);
        c.join(JoinRequest::new("A", "lobby")).unwrap();
        assert_eq!(hub.room_count(), 1);
        c.leave();
        assert_eq!(c.phase(), SessionPhase::Unjoined);
        assert!(c.snapshot().is_none());
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn test_can_rejoin_after_leave() {
        let hub = ChannelHub::new();
        let mut c = controller(&hub);
        c.join(JoinRequest::new("A", "lobby")).unwrap();
        c.leave();
        c.join(JoinRequest::new("A", "attic")).unwrap();
        assert_eq!(c.room_identifier().unwrap().as_str(), "attic");
    }

    #[test]
    fn test_dismiss_error_clears_notice() {
        let hub = ChannelHub::new();
        let mut c = controller(&hub);
        c.join(JoinRequest::new("A", "lobby")).unwrap();
        if let Some(active) = &c.active {
            active.state.lock().unwrap().last_error = Some("Error: boom".to_string());
        }
        assert!(c.last_error().is_some());
        c.dismiss_error();
        assert!(c.last_error().is_none());
    }
}
