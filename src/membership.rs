//! Participant tracking derived from protocol envelopes.
//!
//! Identity is the per-join [`SessionId`], not the display name: two tabs
//! joined as "Alice" are two entries, and a leave removes exactly the tab
//! that left.

use serde::{Deserialize, Serialize};

use crate::now_ms;
use crate::protocol::SessionId;

/// A participant known to the local session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub session_id: SessionId,
    pub name: String,
    /// When the local session first learned about this participant.
    pub seen_at_ms: u64,
}

/// Participants of the current room, in the order they were first observed.
#[derive(Debug, Clone, Default)]
pub struct MembershipTracker {
    participants: Vec<Participant>,
}

impl MembershipTracker {
    /// A tracker containing only the local participant.
    pub fn seeded(local_session: SessionId, local_name: &str) -> Self {
        let mut tracker = Self::default();
        tracker.observe(local_session, local_name);
        tracker
    }

    /// Record that `session_id` is present under `name`.
    ///
    /// Returns `true` if the participant was not known before. A known
    /// session that reappears under a new name is renamed in place.
    pub fn observe(&mut self, session_id: SessionId, name: &str) -> bool {
        if let Some(p) = self.participants.iter_mut().find(|p| p.session_id == session_id) {
            if p.name != name {
                p.name = name.to_string();
            }
            return false;
        }
        self.participants.push(Participant {
            session_id,
            name: name.to_string(),
            seen_at_ms: now_ms(),
        });
        true
    }

    /// Forget `session_id`. Unknown sessions are a no-op.
    pub fn remove(&mut self, session_id: SessionId) -> Option<Participant> {
        let idx = self.participants.iter().position(|p| p.session_id == session_id)?;
        Some(self.participants.remove(idx))
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.participants.iter().any(|p| p.session_id == session_id)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Display names in observation order. Duplicated names appear once per tab.
    pub fn names(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_contains_local_only() {
        let me = SessionId::new();
        let t = MembershipTracker::seeded(me, "A");
        assert_eq!(t.names(), vec!["A"]);
        assert!(t.contains(me));
    }

    #[test]
    fn test_observe_duplicate_is_noop() {
        let mut t = MembershipTracker::default();
        let b = SessionId::new();
        assert!(t.observe(b, "B"));
        assert!(!t.observe(b, "B"));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_same_name_different_sessions_are_distinct() {
        let mut t = MembershipTracker::default();
        t.observe(SessionId::new(), "Alice");
        t.observe(SessionId::new(), "Alice");
        assert_eq!(t.names(), vec!["Alice", "Alice"]);
    }

    #[test]
    fn test_remove_only_matching_session() {
        let mut t = MembershipTracker::default();
        let first = SessionId::new();
        let second = SessionId::new();
        t.observe(first, "Alice");
        t.observe(second, "Alice");
        let removed = t.remove(first).unwrap();
        assert_eq!(removed.session_id, first);
        assert!(t.contains(second));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let mut t = MembershipTracker::seeded(SessionId::new(), "A");
        assert!(t.remove(SessionId::new()).is_none());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_observe_known_session_with_new_name_renames() {
        let mut t = MembershipTracker::default();
        let s = SessionId::new();
        t.observe(s, "Bob");
        assert!(!t.observe(s, "Robert"));
        assert_eq!(t.names(), vec!["Robert"]);
    }
}
