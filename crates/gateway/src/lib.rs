//! `sk-gateway` — the gateway WebSocket core and the `super-kanban`
//! binary.
//!
//! Per-connection handshake (challenge-first), backpressure-guarded
//! sending, close-cause attribution, presence/health broadcast, and the
//! process readiness ladder. The binary wires the transcript exporter
//! and the reconciler CLI around it.

pub mod cli;
pub mod presence;
pub mod readiness;
pub mod sanitize;
pub mod server;
pub mod state;
pub mod ws;
