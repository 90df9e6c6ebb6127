//! `sk-domain` — shared types for the OpenClaw ⇄ Super-Kanban integration core.
//!
//! Holds the error taxonomy, the structured trace-event enum, and the
//! configuration model used by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod trace;

pub use config::Config;
pub use error::{Error, Result};
pub use trace::TraceEvent;
