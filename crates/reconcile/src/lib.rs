//! `sk-reconcile` — offline idempotent replay of archived transcripts.
//!
//! Walks `<stateDir>/agents/*/sessions/*.jsonl`, resolves bindings the
//! same way the live exporter does (including hashed-label resolution
//! through `label-map.json`), and re-emits the identical attach/message/
//! tool-call posts. `dry-run` only counts; `fix` posts and writes newly
//! discovered label mappings back.

mod report;
mod runner;
mod scan;

pub use report::{ReconcileReport, SessionReport};
pub use runner::{ReconcileMode, ReconcileOptions, Reconciler};
pub use scan::scan_for_external_id;
