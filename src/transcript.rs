//! Chat transcript: ordered message log with in-place updates by id.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::now_ms;

/// Placeholder shown while a translation is outstanding.
pub const TRANSLATING_SENTINEL: &str = "Translating...";
/// Placeholder shown while language detection is outstanding.
pub const DETECTING_SENTINEL: &str = "Detecting...";
/// Live-pipeline translation failure text.
pub const TRANSLATION_FAILED: &str = "Translation failed";
/// Detected language when detection failed or was skipped.
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// Bulk retranslation failure text for one message.
pub fn failed_to_translate_to(language: &str) -> String {
    format!("Failed to translate to {}", language)
}

// ---------------------------------------------------------------------------
// MessageId
// ---------------------------------------------------------------------------

/// Millisecond timestamp plus a random tiebreak, so two messages created in
/// the same millisecond still get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    pub timestamp_ms: u64,
    pub tiebreak: u32,
}

impl MessageId {
    pub fn generate() -> Self {
        MessageId { timestamp_ms: now_ms(), tiebreak: rand::thread_rng().gen() }
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:08x}", self.timestamp_ms, self.tiebreak)
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    User,
    System,
}

/// One transcript entry.
///
/// USER entries start pending (sentinel translation and detection) and are
/// resolved in place. SYSTEM entries never carry translation fields or a sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub kind: MessageKind,
    pub original_text: String,
    pub translated_text: Option<String>,
    pub detected_language: Option<String>,
    pub sender_name: Option<String>,
}

impl ChatMessage {
    /// A USER entry awaiting translation and detection.
    pub fn pending(sender_name: impl Into<String>, original_text: impl Into<String>) -> Self {
        ChatMessage {
            id: MessageId::generate(),
            kind: MessageKind::User,
            original_text: original_text.into(),
            translated_text: Some(TRANSLATING_SENTINEL.to_string()),
            detected_language: Some(DETECTING_SENTINEL.to_string()),
            sender_name: Some(sender_name.into()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        ChatMessage {
            id: MessageId::generate(),
            kind: MessageKind::System,
            original_text: text.into(),
            translated_text: None,
            detected_language: None,
            sender_name: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.translated_text.as_deref() == Some(TRANSLATING_SENTINEL)
            || self.detected_language.as_deref() == Some(DETECTING_SENTINEL)
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Append-only message log. Entries are mutated by id, never removed or
/// reordered.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) -> MessageId {
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Apply `f` to the entry with `id`. Returns `false` if no such entry.
    pub fn update<F>(&mut self, id: MessageId, f: F) -> bool
    where
        F: FnOnce(&mut ChatMessage),
    {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                f(m);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// `(id, original_text)` of every USER entry, in transcript order.
    pub fn user_entries(&self) -> Vec<(MessageId, String)> {
        self.messages
            .iter()
            .filter(|m| m.kind == MessageKind::User)
            .map(|m| (m.id, m.original_text.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_entry_has_sentinels() {
        let m = ChatMessage::pending("A", "Hola");
        assert_eq!(m.kind, MessageKind::User);
        assert_eq!(m.translated_text.as_deref(), Some(TRANSLATING_SENTINEL));
        assert_eq!(m.detected_language.as_deref(), Some(DETECTING_SENTINEL));
        assert_eq!(m.sender_name.as_deref(), Some("A"));
        assert!(m.is_pending());
    }

    #[test]
    fn test_system_entry_has_no_sender_or_translation() {
        let m = ChatMessage::system("B has joined the room.");
        assert_eq!(m.kind, MessageKind::System);
        assert!(m.sender_name.is_none());
        assert!(m.translated_text.is_none());
        assert!(!m.is_pending());
    }

    #[test]
    fn test_message_ids_distinct_within_same_millisecond() {
        let ids: std::collections::HashSet<MessageId> = (0..200).map(|_| MessageId::generate()).collect();
        assert!(ids.len() >= 199, "expected near-unique ids, got {}", ids.len());
    }

    #[test]
    fn test_message_id_display() {
        let id = MessageId { timestamp_ms: 42, tiebreak: 0xab };
        assert_eq!(id.to_string(), "42-000000ab");
    }

    #[test]
    fn test_update_preserves_order_and_other_fields() {
        let mut t = Transcript::new();
        t.push(ChatMessage::system("welcome"));
        let id = t.push(ChatMessage::pending("A", "Hola"));
        t.push(ChatMessage::pending("B", "Bonjour"));

        assert!(t.update(id, |m| m.translated_text = Some("Hello".to_string())));

        let msgs = t.messages();
        assert_eq!(msgs[1].id, id);
        assert_eq!(msgs[1].translated_text.as_deref(), Some("Hello"));
        assert_eq!(msgs[1].original_text, "Hola");
        assert_eq!(msgs[1].detected_language.as_deref(), Some(DETECTING_SENTINEL));
        assert_eq!(msgs[2].original_text, "Bonjour");
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut t = Transcript::new();
        t.push(ChatMessage::pending("A", "Hola"));
        let missing = MessageId { timestamp_ms: 0, tiebreak: 0 };
        assert!(!t.update(missing, |m| m.original_text.clear()));
        assert_eq!(t.messages()[0].original_text, "Hola");
    }

    #[test]
    fn test_user_entries_skip_system() {
        let mut t = Transcript::new();
        t.push(ChatMessage::system("welcome"));
        let id = t.push(ChatMessage::pending("A", "Hola"));
        assert_eq!(t.user_entries(), vec![(id, "Hola".to_string())]);
    }

    #[test]
    fn test_failed_to_translate_to_text() {
        assert_eq!(failed_to_translate_to("German"), "Failed to translate to German");
    }
}
