//! Pending selection for a rule the user just asked to create
//!
//! The create request is fire-and-forget; the rule only shows up once the
//! registry confirms it with an add event. The draft identity recorded here is
//! what lets that event auto-select the new pane.

use tracing::debug;

use crate::rule::RuleId;

#[derive(Debug, Default)]
pub struct PendingSelectionTracker {
    draft: Option<RuleId>,
}

impl PendingSelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record intent to select `draft` once it is added. Replaces any older draft.
    pub fn set_pending(&mut self, draft: RuleId) {
        if let Some(previous) = self.draft.as_ref() {
            debug!(previous = %previous, draft = %draft, "Replacing pending draft");
        }
        self.draft = Some(draft);
    }

    /// Clears and returns true only when `id` is the pending draft
    pub fn consume_if_matches(&mut self, id: &RuleId) -> bool {
        if self.draft.as_ref() == Some(id) {
            self.draft = None;
            true
        } else {
            false
        }
    }

    /// Clears only when `id` is the pending draft. A failure reported for an
    /// older request must not cancel a newer one.
    pub fn clear_if_matches(&mut self, id: &RuleId) -> bool {
        self.consume_if_matches(id)
    }

    pub fn clear(&mut self) {
        self.draft = None;
    }

    pub fn pending(&self) -> Option<&RuleId> {
        self.draft.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_matching_draft() {
        let mut tracker = PendingSelectionTracker::new();
        tracker.set_pending(RuleId::process("a.exe"));

        assert!(tracker.consume_if_matches(&RuleId::process("a.exe")));
        assert_eq!(tracker.pending(), None);
        // Second confirmation of the same identity no longer matches
        assert!(!tracker.consume_if_matches(&RuleId::process("a.exe")));
    }

    #[test]
    fn test_mismatch_leaves_draft() {
        let mut tracker = PendingSelectionTracker::new();
        tracker.set_pending(RuleId::process("a.exe"));

        assert!(!tracker.consume_if_matches(&RuleId::process("b.exe")));
        assert!(!tracker.consume_if_matches(&RuleId::class("a.exe")));
        assert_eq!(tracker.pending(), Some(&RuleId::process("a.exe")));
    }

    #[test]
    fn test_set_pending_overwrites() {
        let mut tracker = PendingSelectionTracker::new();
        tracker.set_pending(RuleId::process("a.exe"));
        tracker.set_pending(RuleId::class("Foo"));

        assert!(!tracker.consume_if_matches(&RuleId::process("a.exe")));
        assert!(tracker.consume_if_matches(&RuleId::class("Foo")));
    }

    #[test]
    fn test_clear_prevents_later_match() {
        let mut tracker = PendingSelectionTracker::new();
        tracker.set_pending(RuleId::process("a.exe"));
        tracker.clear();

        assert!(!tracker.consume_if_matches(&RuleId::process("a.exe")));
    }

    #[test]
    fn test_clear_if_matches_keeps_newer_draft() {
        let mut tracker = PendingSelectionTracker::new();
        tracker.set_pending(RuleId::process("new.exe"));

        assert!(!tracker.clear_if_matches(&RuleId::process("old.exe")));
        assert_eq!(tracker.pending(), Some(&RuleId::process("new.exe")));
        assert!(tracker.clear_if_matches(&RuleId::process("new.exe")));
        assert_eq!(tracker.pending(), None);
    }
}
