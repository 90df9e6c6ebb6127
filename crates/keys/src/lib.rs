//! `sk-keys` — deterministic key and label derivation.
//!
//! Everything that turns OpenClaw-side identity (external IDs, session
//! labels, transcript paths) into the stable keys Super-Kanban dedupes on
//! lives here, so the exporter and the reconciler can never disagree.

mod external_id;
mod hash;
mod labels;
mod record_keys;
mod session_file;

pub use external_id::{
    canonicalize_project_external_id, canonicalize_task_external_id,
    canonicalize_work_item_external_id, EntityType,
};
pub use hash::{sha1_hex, sha256_hex, sha256_prefix};
pub use labels::{
    clamp_session_label, make_sk_task_hash_label, parse_sk_routing_label, RoutingLabel,
    MAX_LABEL_CHARS,
};
pub use record_keys::{build_message_key, build_tool_call_key};
pub use session_file::{parse_session_file_context, SessionFileContext};
