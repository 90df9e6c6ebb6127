//! `sk-telegram` — Telegram delivery plumbing.
//!
//! Ambient per-delivery correlation context, the voice-send deduper, and
//! the network adapter with its diagnostic fetch tap.

mod context;
mod dedupe;
mod net;

pub use context::{current, run_with, with_partial, DeliveryContext, PartialContext};
pub use dedupe::{sha256_fingerprint, VoiceDeduper};
pub use net::{DiagnosticFetch, NetAdapter};
