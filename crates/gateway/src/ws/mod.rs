//! Per-connection WebSocket machinery.

pub mod conn;
pub mod send;

pub use conn::gateway_ws;
pub use send::{ConnScratch, GuardedSender, HandshakeState, LastFrame, Outbound};
