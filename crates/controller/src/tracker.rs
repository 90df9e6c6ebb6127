//! Run bookkeeping for spawned child sessions.

use std::collections::HashMap;

use parking_lot::Mutex;
use sk_keys::EntityType;

/// Everything the lifecycle hooks need to close out one spawned run.
#[derive(Debug, Clone)]
pub struct RunEntry {
    pub parent_session_key: String,
    pub child_session_key: String,
    pub wake_parent_on_end: bool,
    pub entity_type: EntityType,
    pub entity_external_id: String,
    /// Server-side task id + lock owner, present for WORKER runs.
    pub task_id: Option<String>,
    pub lock_owner: Option<String>,
}

/// Process-wide maps `runId → entry` and `child → requester`.
#[derive(Default)]
pub struct RunTracker {
    entries_by_run_id: Mutex<HashMap<String, RunEntry>>,
    requester_by_child: Mutex<HashMap<String, String>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, run_id: &str, entry: RunEntry) {
        self.entries_by_run_id
            .lock()
            .insert(run_id.to_owned(), entry);
    }

    pub fn get(&self, run_id: &str) -> Option<RunEntry> {
        self.entries_by_run_id.lock().get(run_id).cloned()
    }

    /// Find a tracked run by its child session key (fast path for
    /// `agent_end`, which only carries the session key).
    pub fn find_by_child(&self, child_session_key: &str) -> Option<(String, RunEntry)> {
        self.entries_by_run_id
            .lock()
            .iter()
            .find(|(_, e)| e.child_session_key == child_session_key)
            .map(|(run_id, e)| (run_id.clone(), e.clone()))
    }

    /// Remove and return the entry; the single point that makes the
    /// parent wake fire at most once per run id.
    pub fn take(&self, run_id: &str) -> Option<RunEntry> {
        self.entries_by_run_id.lock().remove(run_id)
    }

    pub fn map_requester(&self, child_session_key: &str, requester_session_key: &str) {
        self.requester_by_child
            .lock()
            .insert(child_session_key.to_owned(), requester_session_key.to_owned());
    }

    pub fn requester_of(&self, child_session_key: &str) -> Option<String> {
        self.requester_by_child.lock().get(child_session_key).cloned()
    }

    pub fn forget_requester(&self, child_session_key: &str) {
        self.requester_by_child.lock().remove(child_session_key);
    }

    pub fn len(&self) -> usize {
        self.entries_by_run_id.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries_by_run_id.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(child: &str) -> RunEntry {
        RunEntry {
            parent_session_key: "agent:main".into(),
            child_session_key: child.into(),
            wake_parent_on_end: true,
            entity_type: EntityType::Task,
            entity_external_id: "task:p:w:t".into(),
            task_id: Some("t1".into()),
            lock_owner: Some("agent:main".into()),
        }
    }

    #[test]
    fn take_is_single_shot() {
        let tracker = RunTracker::new();
        tracker.track("r1", entry("agent:child:1"));

        assert!(tracker.take("r1").is_some());
        assert!(tracker.take("r1").is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn find_by_child_key() {
        let tracker = RunTracker::new();
        tracker.track("r1", entry("agent:child:1"));
        tracker.track("r2", entry("agent:child:2"));

        let (run_id, found) = tracker.find_by_child("agent:child:2").unwrap();
        assert_eq!(run_id, "r2");
        assert_eq!(found.child_session_key, "agent:child:2");
        assert!(tracker.find_by_child("agent:child:9").is_none());
    }

    #[test]
    fn requester_mapping() {
        let tracker = RunTracker::new();
        tracker.map_requester("child", "parent");
        assert_eq!(tracker.requester_of("child").as_deref(), Some("parent"));
        tracker.forget_requester("child");
        assert_eq!(tracker.requester_of("child"), None);
    }
}
