//! `sk-transcript` — transcript line parsing and payload normalization.
//!
//! Turns one OpenClaw transcript JSONL line into exportable message and
//! tool-call records, and applies the configured redaction patterns and
//! per-field truncation caps before anything leaves the process.

mod parser;
mod records;
mod redact;
mod timestamp;

pub use parser::parse_line;
pub use records::{MessageRecord, ParsedLine, Role, ToolCallRecord, ToolCallStatus};
pub use redact::{truncate_chars, Redactor};
pub use timestamp::{parse_timestamp_ms, to_iso_millis};
