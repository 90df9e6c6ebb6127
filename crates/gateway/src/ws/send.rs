//! Backpressure-guarded outbound path.
//!
//! axum's WebSocket has no `bufferedAmount` getter, so the connection
//! owns a writer queue with an atomic byte counter: the guard reads the
//! counter before serialization, and the writer task decrements it as
//! frames actually reach the socket. Guard checks happen-before every
//! send on the same connection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;

use sk_protocol::{CLOSE_POLICY_VIOLATION, SLOW_CONSUMER_REASON};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection scratchpad
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Pending,
    Connected,
    Failed,
}

/// Last frame seen from the client, for close-attribution logs.
#[derive(Debug, Clone, Default)]
pub struct LastFrame {
    pub frame_type: Option<String>,
    pub method: Option<String>,
    pub id: Option<String>,
}

/// Mutable per-connection state shared between the reader, the guarded
/// sender, and the handshake timer.
#[derive(Debug)]
pub struct ConnScratch {
    pub closed: bool,
    pub handshake_state: HandshakeState,
    pub close_cause: Option<String>,
    pub close_meta: serde_json::Value,
    pub last_frame: LastFrame,
}

impl Default for ConnScratch {
    fn default() -> Self {
        Self {
            closed: false,
            handshake_state: HandshakeState::Pending,
            close_cause: None,
            close_meta: serde_json::Value::Null,
            last_frame: LastFrame::default(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Guarded sender
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the writer task drains toward the socket.
#[derive(Debug)]
pub enum Outbound {
    Frame(String),
    Close { code: u16, reason: String },
}

/// The only way to put bytes on a connection. Every JSON frame goes
/// through the two-phase backpressure guard.
#[derive(Clone)]
pub struct GuardedSender {
    tx: mpsc::UnboundedSender<Outbound>,
    queued_bytes: Arc<AtomicUsize>,
    max_buffered_bytes: usize,
    scratch: Arc<Mutex<ConnScratch>>,
}

impl GuardedSender {
    pub fn new(
        tx: mpsc::UnboundedSender<Outbound>,
        queued_bytes: Arc<AtomicUsize>,
        max_buffered_bytes: usize,
        scratch: Arc<Mutex<ConnScratch>>,
    ) -> Self {
        Self {
            tx,
            queued_bytes,
            max_buffered_bytes,
            scratch,
        }
    }

    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes.load(Ordering::Acquire)
    }

    /// Send one JSON frame. Returns `false` when the frame was not
    /// queued (backpressure close or serialization failure). Send
    /// errors past the guard are swallowed.
    pub fn send_json<T: Serialize>(&self, frame: &T) -> bool {
        let buffered = self.queued_bytes.load(Ordering::Acquire);
        if buffered > self.max_buffered_bytes {
            self.close_backpressure(buffered, None, "pre-stringify");
            return false;
        }

        let Ok(text) = serde_json::to_string(frame) else {
            return false;
        };
        let frame_bytes = text.len();
        if buffered + frame_bytes > self.max_buffered_bytes {
            self.close_backpressure(buffered, Some(frame_bytes), "pre-send");
            return false;
        }

        self.queued_bytes.fetch_add(frame_bytes, Ordering::AcqRel);
        let _ = self.tx.send(Outbound::Frame(text));
        true
    }

    /// Initiate a close, recording the first cause to win.
    pub fn close(&self, code: u16, reason: &str, cause: &str, meta: serde_json::Value) {
        {
            let mut scratch = self.scratch.lock();
            if scratch.closed {
                return;
            }
            scratch.closed = true;
            if scratch.close_cause.is_none() {
                scratch.close_cause = Some(cause.to_owned());
                scratch.close_meta = meta;
            }
        }
        let _ = self.tx.send(Outbound::Close {
            code,
            reason: reason.to_owned(),
        });
    }

    fn close_backpressure(&self, buffered: usize, frame_bytes: Option<usize>, phase: &str) {
        let mut meta = json!({
            "maxBufferedBytes": self.max_buffered_bytes,
            "bufferedAmount": buffered,
            "phase": phase,
        });
        if let Some(bytes) = frame_bytes {
            meta["frameBytes"] = json!(bytes);
        }
        tracing::warn!(
            buffered,
            max = self.max_buffered_bytes,
            phase,
            "closing slow consumer"
        );
        self.close(
            CLOSE_POLICY_VIOLATION,
            SLOW_CONSUMER_REASON,
            "ws-backpressure",
            meta,
        );
    }
}
