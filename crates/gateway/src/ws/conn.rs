//! Connection lifecycle.
//!
//! Flow per socket:
//! 1. allocate a `conn_id` + scratchpad, start the guarded writer
//! 2. push `connect.challenge` (always the first event on the wire)
//! 3. arm the single-shot handshake timer
//! 4. frame loop: `connect` completes the handshake, then RPCs route;
//!    `last_frame` is recorded before dispatch
//! 5. on close: attribute the cause, log with sanitized headers, and
//!    unregister (which drops node-role clients out of routing)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::mpsc;

use sk_domain::TraceEvent;
use sk_protocol::{
    ChallengePayload, ConnectParams, EventFrame, RpcFrame, RpcResponse, CONNECT_CHALLENGE_EVENT,
};

use crate::presence::ClientHandle;
use crate::sanitize::sanitize_header_value;
use crate::state::GatewayState;
use crate::ws::send::{ConnScratch, GuardedSender, HandshakeState, Outbound};

/// Constant-time token comparison via SHA-256 digests; hashing
/// normalizes lengths so `ct_eq` always compares 32 bytes.
fn token_eq(a: &str, b: &str) -> bool {
    let ha = Sha256::digest(a.as_bytes());
    let hb = Sha256::digest(b.as_bytes());
    ha.ct_eq(&hb).into()
}

/// GET /v1/gateway/ws — upgrade to WebSocket.
pub async fn gateway_ws(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, headers))
}

async fn handle_socket(socket: WebSocket, state: GatewayState, headers: HeaderMap) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let connected_at = std::time::Instant::now();
    let scratch = Arc::new(Mutex::new(ConnScratch::default()));

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    let queued_bytes = Arc::new(AtomicUsize::new(0));
    let sender = GuardedSender::new(
        outbound_tx,
        queued_bytes.clone(),
        state.config.max_buffered_bytes,
        scratch.clone(),
    );

    // Writer: drains the guarded queue toward the socket, decrementing
    // the byte counter as frames actually leave.
    let writer = tokio::spawn(async move {
        while let Some(outbound) = outbound_rx.recv().await {
            match outbound {
                Outbound::Frame(text) => {
                    let bytes = text.len();
                    let result = ws_sink.send(Message::Text(text)).await;
                    queued_bytes.fetch_sub(bytes, Ordering::AcqRel);
                    if result.is_err() {
                        break;
                    }
                }
                Outbound::Close { code, reason } => {
                    let _ = ws_sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    // 1. Challenge first, before anything else can be sent.
    let challenge = ChallengePayload::fresh();
    sender.send_json(&EventFrame::new(
        CONNECT_CHALLENGE_EVENT,
        serde_json::to_value(&challenge).unwrap_or_default(),
    ));

    // 2. Single-shot handshake timer.
    let timer = {
        let scratch = scratch.clone();
        let sender = sender.clone();
        let timeout = std::time::Duration::from_millis(state.config.handshake_timeout_ms);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let expired = {
                let mut guard = scratch.lock();
                if guard.handshake_state == HandshakeState::Pending {
                    guard.handshake_state = HandshakeState::Failed;
                    true
                } else {
                    false
                }
            };
            if expired {
                sender.close(1000, "handshake timeout", "handshake-timeout", json!({}));
            }
        })
    };

    // 3. Frame loop.
    while let Some(Ok(message)) = ws_stream.next().await {
        match message {
            Message::Text(text) => {
                let Ok(frame) = serde_json::from_str::<RpcFrame>(&text) else {
                    tracing::debug!(conn_id = %conn_id, "ignoring unparseable frame");
                    continue;
                };
                {
                    let mut guard = scratch.lock();
                    guard.last_frame.frame_type = Some("rpc".into());
                    guard.last_frame.method = Some(frame.method.clone());
                    guard.last_frame.id = Some(frame.id.clone());
                }
                dispatch_frame(&state, &conn_id, &scratch, &sender, frame);
            }
            Message::Ping(_) | Message::Pong(_) => {
                state.registry.touch(&conn_id);
            }
            Message::Close(_) => {
                let mut guard = scratch.lock();
                guard.closed = true;
                if guard.close_cause.is_none() {
                    guard.close_cause = Some("client-close".into());
                }
                break;
            }
            _ => {}
        }
    }

    // 4. Close-out: attribute, log, unregister, broadcast.
    timer.abort();
    let duration_ms = connected_at.elapsed().as_millis() as u64;
    let (cause, last_frame) = {
        let guard = scratch.lock();
        (
            guard
                .close_cause
                .clone()
                .unwrap_or_else(|| "socket-closed".into()),
            guard.last_frame.clone(),
        )
    };

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(sanitize_header_value);
    let origin = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(sanitize_header_value);
    tracing::info!(
        conn_id = %conn_id,
        cause = %cause,
        duration_ms,
        last_frame_method = last_frame.method.as_deref().unwrap_or("-"),
        user_agent = user_agent.as_deref().unwrap_or("-"),
        origin = origin.as_deref().unwrap_or("-"),
        "connection closed"
    );
    TraceEvent::WsClosed {
        conn_id: conn_id.clone(),
        cause,
        duration_ms,
        last_frame_type: last_frame.frame_type,
        last_frame_method: last_frame.method,
    }
    .emit();

    if state.registry.remove(&conn_id).is_some() {
        state.registry.broadcast_presence();
    }
    writer.abort();
}

fn dispatch_frame(
    state: &GatewayState,
    conn_id: &str,
    scratch: &Arc<Mutex<ConnScratch>>,
    sender: &GuardedSender,
    frame: RpcFrame,
) {
    let handshake = scratch.lock().handshake_state;

    if frame.method == "connect" {
        handle_connect(state, conn_id, scratch, sender, frame);
        return;
    }
    if handshake != HandshakeState::Connected {
        sender.send_json(&RpcResponse::err(
            frame.id,
            "not_connected",
            "complete the connect handshake first",
        ));
        return;
    }

    state.registry.touch(conn_id);
    match frame.method.as_str() {
        "ping" => {
            sender.send_json(&RpcResponse::ok(
                frame.id,
                json!({ "pong": Utc::now().timestamp_millis() }),
            ));
        }
        "subscribe" => {
            sender.send_json(&RpcResponse::ok(frame.id, json!({ "subscribed": true })));
        }
        "presence.update" => {
            sender.send_json(&RpcResponse::ok(frame.id, json!({ "ok": true })));
            state.registry.broadcast_presence();
        }
        "health" => {
            let snapshot = state.readiness.snapshot();
            sender.send_json(&RpcResponse::ok(
                frame.id,
                serde_json::to_value(&snapshot).unwrap_or_default(),
            ));
        }
        other => {
            sender.send_json(&RpcResponse::err(
                frame.id,
                "unknown_method",
                format!("no such method: {other}"),
            ));
        }
    }
}

fn handle_connect(
    state: &GatewayState,
    conn_id: &str,
    scratch: &Arc<Mutex<ConnScratch>>,
    sender: &GuardedSender,
    frame: RpcFrame,
) {
    let Ok(params) = serde_json::from_value::<ConnectParams>(frame.params.clone()) else {
        sender.send_json(&RpcResponse::err(
            frame.id,
            "bad_request",
            "malformed connect params",
        ));
        return;
    };

    if let Some(expected) = state.auth_token.as_deref() {
        let provided = params.token.as_deref().unwrap_or("");
        if !token_eq(provided, expected) {
            {
                let mut guard = scratch.lock();
                guard.handshake_state = HandshakeState::Failed;
            }
            sender.send_json(&RpcResponse::err(frame.id, "unauthorized", "bad token"));
            sender.close(1008, "unauthorized", "auth-failed", json!({}));
            return;
        }
    }

    scratch.lock().handshake_state = HandshakeState::Connected;
    state.registry.register(ClientHandle {
        conn_id: conn_id.to_owned(),
        client_id: params.client.id.clone(),
        role: params.client.role.clone(),
        connected_at: Utc::now(),
        last_seen: Utc::now(),
        sender: sender.clone(),
    });

    sender.send_json(&RpcResponse::ok(
        frame.id,
        json!({ "connId": conn_id, "clientId": params.client.id }),
    ));
    state.registry.broadcast_presence();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_eq_constant_time_wrapper() {
        assert!(token_eq("secret", "secret"));
        assert!(!token_eq("secret", "Secret"));
        assert!(!token_eq("secret", "secret2"));
        assert!(token_eq("", ""));
    }
}
