//! Gateway wire protocol: event frames, RPC frames, and close semantics.
//!
//! Clients connect over WebSocket, receive a `connect.challenge` event
//! first, then authenticate via the `connect` RPC and exchange
//! subscribe/presence/agent RPCs. Every RPC is acknowledged with a
//! response carrying the same `id`.

use serde::{Deserialize, Serialize};

/// Close code used for policy-triggered shutdowns (backpressure).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Close reason attached to backpressure closes.
pub const SLOW_CONSUMER_REASON: &str = "slow consumer";

/// The event that must be the first frame on every new socket.
pub const CONNECT_CHALLENGE_EVENT: &str = "connect.challenge";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server → client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pushed event frame: `{ "type": "event", "event": …, "payload": … }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            frame_type: "event".into(),
            event: event.into(),
            payload,
        }
    }
}

/// Payload of the `connect.challenge` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengePayload {
    /// Fresh per connection.
    pub nonce: String,
    /// Server wall clock, epoch milliseconds.
    pub ts: i64,
}

impl ChallengePayload {
    pub fn fresh() -> Self {
        Self {
            nonce: uuid::Uuid::new_v4().to_string(),
            ts: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// RPC acknowledgement: exactly one of `result` / `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(RpcError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client → server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Inbound RPC frame: `{ id, method, params }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcFrame {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Params of the `connect` RPC (handshake completion).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    #[serde(default)]
    pub token: Option<String>,
    pub client: ClientInfo,
    /// Echo of the challenge nonce.
    #[serde(default)]
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub id: String,
    /// `"node"` clients are unsubscribed from routing registries on close.
    pub role: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_frame_wire_shape() {
        let frame = EventFrame::new("presence", json!({"clients": 2}));
        let wire = serde_json::to_value(&frame).unwrap();
        assert_eq!(wire["type"], "event");
        assert_eq!(wire["event"], "presence");
        assert_eq!(wire["payload"]["clients"], 2);
    }

    #[test]
    fn challenge_nonces_are_fresh() {
        assert_ne!(ChallengePayload::fresh().nonce, ChallengePayload::fresh().nonce);
    }

    #[test]
    fn rpc_response_has_exactly_one_arm() {
        let ok = serde_json::to_value(RpcResponse::ok("1", json!(42))).unwrap();
        assert!(ok.get("result").is_some());
        assert!(ok.get("error").is_none());

        let err = serde_json::to_value(RpcResponse::err("2", "bad_request", "nope")).unwrap();
        assert!(err.get("result").is_none());
        assert_eq!(err["error"]["code"], "bad_request");
    }

    #[test]
    fn rpc_frame_parses_with_default_params() {
        let frame: RpcFrame = serde_json::from_str(r#"{"id":"7","method":"ping"}"#).unwrap();
        assert_eq!(frame.method, "ping");
        assert!(frame.params.is_null());
    }
}
