//! Session-scoped memory of questions already served to the candidate.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use exam_core::model::QuestionId;
use storage::session_store::SessionStore;

/// Fixed session-store key holding the serialized attempted-id set.
pub const ATTEMPTED_KEY: &str = "exam.session.attempted";

/// Tracks which questions were already served in the current session.
///
/// Single-owner: the engine holds the tracker exclusively, so membership
/// checks and inserts never interleave.
pub trait AttemptTracker: Send {
    /// Ids served so far; empty when nothing is tracked.
    fn attempted(&self) -> HashSet<QuestionId>;

    /// Record one id. Marking an id twice is a no-op.
    fn mark_attempted(&mut self, id: &QuestionId);

    /// Record a batch of ids.
    fn mark_all(&mut self, ids: &[QuestionId]) {
        for id in ids {
            self.mark_attempted(id);
        }
    }

    /// Forget every tracked id.
    fn reset(&mut self);
}

/// Tracker kept entirely in memory; lives as long as the value.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAttemptTracker {
    ids: HashSet<QuestionId>,
}

impl InMemoryAttemptTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttemptTracker for InMemoryAttemptTracker {
    fn attempted(&self) -> HashSet<QuestionId> {
        self.ids.clone()
    }

    fn mark_attempted(&mut self, id: &QuestionId) {
        self.ids.insert(id.clone());
    }

    fn reset(&mut self) {
        self.ids.clear();
    }
}

/// Tracker persisted as a JSON array under [`ATTEMPTED_KEY`] in a session store.
///
/// Survives engine re-creation as long as the same store is reused, and
/// starts empty on a fresh store.
#[derive(Clone)]
pub struct SessionAttemptTracker {
    store: Arc<dyn SessionStore>,
}

impl SessionAttemptTracker {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    fn load(&self) -> BTreeSet<QuestionId> {
        let Some(raw) = self.store.get_item(ATTEMPTED_KEY) else {
            return BTreeSet::new();
        };
        match serde_json::from_str::<Vec<QuestionId>>(&raw) {
            Ok(ids) => ids.into_iter().collect(),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable attempted-question set");
                BTreeSet::new()
            }
        }
    }

    fn save(&self, ids: &BTreeSet<QuestionId>) {
        match serde_json::to_string(ids) {
            Ok(raw) => self.store.set_item(ATTEMPTED_KEY, raw),
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize attempted-question set");
            }
        }
    }
}

impl AttemptTracker for SessionAttemptTracker {
    fn attempted(&self) -> HashSet<QuestionId> {
        self.load().into_iter().collect()
    }

    fn mark_attempted(&mut self, id: &QuestionId) {
        let mut ids = self.load();
        if ids.insert(id.clone()) {
            self.save(&ids);
        }
    }

    fn mark_all(&mut self, ids: &[QuestionId]) {
        let mut current = self.load();
        let before = current.len();
        current.extend(ids.iter().cloned());
        if current.len() != before {
            self.save(&current);
        }
    }

    fn reset(&mut self) {
        self.store.remove_item(ATTEMPTED_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::session_store::InMemorySessionStore;

    fn id(s: &str) -> QuestionId {
        QuestionId::new(s)
    }

    #[test]
    fn in_memory_mark_is_idempotent_and_reset_clears() {
        let mut tracker = InMemoryAttemptTracker::new();
        assert!(tracker.attempted().is_empty());

        tracker.mark_attempted(&id("a"));
        tracker.mark_attempted(&id("a"));
        tracker.mark_all(&[id("b"), id("c")]);
        assert_eq!(tracker.attempted().len(), 3);

        tracker.reset();
        assert!(tracker.attempted().is_empty());
    }

    #[test]
    fn session_tracker_persists_across_instances_sharing_a_store() {
        let store = InMemorySessionStore::new();
        let mut first = SessionAttemptTracker::new(Arc::new(store.clone()));
        first.mark_all(&[id("q1"), id("q2")]);
        first.mark_attempted(&id("q1"));

        let second = SessionAttemptTracker::new(Arc::new(store.clone()));
        let seen = second.attempted();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&id("q1")));
        assert!(seen.contains(&id("q2")));

        let raw = store.get_item(ATTEMPTED_KEY).unwrap();
        assert_eq!(raw, r#"["q1","q2"]"#);
    }

    #[test]
    fn session_tracker_is_empty_on_fresh_store() {
        let tracker = SessionAttemptTracker::new(Arc::new(InMemorySessionStore::new()));
        assert!(tracker.attempted().is_empty());
    }

    #[test]
    fn session_tracker_treats_corrupt_payload_as_empty() {
        let store = InMemorySessionStore::new();
        store.set_item(ATTEMPTED_KEY, "{not json".into());
        let mut tracker = SessionAttemptTracker::new(Arc::new(store.clone()));
        assert!(tracker.attempted().is_empty());

        tracker.mark_attempted(&id("x"));
        assert_eq!(store.get_item(ATTEMPTED_KEY).as_deref(), Some(r#"["x"]"#));
    }

    #[test]
    fn session_tracker_reset_removes_key() {
        let store = InMemorySessionStore::new();
        let mut tracker = SessionAttemptTracker::new(Arc::new(store.clone()));
        tracker.mark_attempted(&id("x"));
        tracker.reset();
        assert_eq!(store.get_item(ATTEMPTED_KEY), None);
        assert!(tracker.attempted().is_empty());
    }
}
