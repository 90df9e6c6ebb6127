//! Run-outcome mapping.

use sk_client::{SessionState, TaskStatus};

/// Map an agent-runtime outcome string onto the terminal session state
/// and task status Super-Kanban should record.
///
/// | outcome                  | session   | task      |
/// |--------------------------|-----------|-----------|
/// | ok                       | DONE      | DONE      |
/// | timeout / error          | FAILED    | BLOCKED   |
/// | killed / reset / deleted | CANCELLED | CANCELLED |
/// | anything else            | FAILED    | BLOCKED   |
pub fn map_outcome(outcome: &str) -> (SessionState, TaskStatus) {
    match outcome {
        "ok" => (SessionState::Done, TaskStatus::Done),
        "killed" | "reset" | "deleted" => (SessionState::Cancelled, TaskStatus::Cancelled),
        "timeout" | "error" => (SessionState::Failed, TaskStatus::Blocked),
        _ => (SessionState::Failed, TaskStatus::Blocked),
    }
}
