//! `sk-spool` — the durable transcript-export pipeline.
//!
//! A tailer follows per-session transcript files by byte offset, a
//! debounced flush appends normalized events to a single-writer spool
//! file, and a sender drains the spool into Super-Kanban one event at a
//! time with crash-safe cursors in `meta.json`. Everything is
//! at-least-once; Super-Kanban dedupes on the deterministic keys.

mod bindings;
mod convert;
mod engine;
mod label_map;
mod meta;
mod sender;
mod spool_file;
mod tailer;

#[cfg(test)]
pub(crate) mod testing;

pub use bindings::{BindingResolver, SessionBinding};
pub use convert::build_spool_events;
pub use engine::{SpoolEngine, SpoolPaths};
pub use label_map::{LabelMap, LabelMapEntry};
pub use meta::{FileCursor, MetaFile};
pub use sender::{backoff_ms, SpoolSender};
pub use spool_file::{append_events, read_event_at, LineAt, SpoolEvent};
pub use tailer::{discover_transcripts, read_new_lines, LineBatch, MAX_LINES_PER_TICK};
