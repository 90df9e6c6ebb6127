//! Session routing labels.
//!
//! Label templates:
//! - `SK:PROJECT:<externalId>`
//! - `SK:WORK_ITEM:<externalId>`
//! - `SK:TASK:<externalId>`
//! - `SK:TASKH:<sha256(externalId)[0:16]>`  (hashed form for long IDs)

use crate::external_id::EntityType;
use crate::hash::sha256_prefix;

/// Maximum label length the session runtime accepts.
pub const MAX_LABEL_CHARS: usize = 64;

const HASH_LABEL_PREFIX: &str = "SK:TASKH:";
const TASK_HASH_LEN: usize = 16;

/// A parsed `SK:` routing label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingLabel {
    /// Directly embeds the entity identity.
    Direct {
        entity_type: EntityType,
        entity_external_id: String,
    },
    /// Hashed task label; resolved through the label map.
    TaskHash { label: String, hash: String },
}

/// Derive the hashed task label for an external ID.
pub fn make_sk_task_hash_label(external_id: &str) -> String {
    format!(
        "{HASH_LABEL_PREFIX}{}",
        sha256_prefix(external_id, TASK_HASH_LEN)
    )
}

/// Parse a session label into its routing form, if it is one of ours.
pub fn parse_sk_routing_label(label: &str) -> Option<RoutingLabel> {
    let label = label.trim();

    if let Some(hash) = label.strip_prefix(HASH_LABEL_PREFIX) {
        if hash.len() == TASK_HASH_LEN && hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some(RoutingLabel::TaskHash {
                label: label.to_owned(),
                hash: hash.to_owned(),
            });
        }
        return None;
    }

    let direct = |entity_type: EntityType, id: &str| {
        if id.is_empty() {
            None
        } else {
            Some(RoutingLabel::Direct {
                entity_type,
                entity_external_id: id.to_owned(),
            })
        }
    };

    if let Some(id) = label.strip_prefix("SK:PROJECT:") {
        return direct(EntityType::Project, id);
    }
    if let Some(id) = label.strip_prefix("SK:WORK_ITEM:") {
        return direct(EntityType::WorkItem, id);
    }
    if let Some(id) = label.strip_prefix("SK:TASK:") {
        return direct(EntityType::Task, id);
    }
    None
}

/// Clamp a label to [`MAX_LABEL_CHARS`].
///
/// Overlong labels are truncated deterministically: the head fills the
/// budget left over by a `~<sha256(label)[0:10]>` suffix, so two distinct
/// long labels cannot collapse onto the same clamped form.
pub fn clamp_session_label(label: &str) -> String {
    let label = label.trim();
    if label.chars().count() <= MAX_LABEL_CHARS {
        return label.to_owned();
    }

    let suffix = format!("~{}", sha256_prefix(label, 10));
    let head_budget = MAX_LABEL_CHARS - suffix.chars().count();
    let head: String = label.chars().take(head_budget).collect();
    format!("{head}{suffix}")
}
