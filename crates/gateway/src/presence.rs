//! Connected-client registry and presence/health fan-out.
//!
//! Presence broadcasts fire on connect, on unregister, and on
//! client-initiated presence changes. The monotonic versions are bumped
//! before fan-out so receivers can discard stale snapshots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::json;

use sk_domain::TraceEvent;
use sk_protocol::EventFrame;

use crate::ws::send::GuardedSender;

/// One registered (handshake-completed) connection.
#[derive(Clone)]
pub struct ClientHandle {
    pub conn_id: String,
    pub client_id: String,
    pub role: String,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub sender: GuardedSender,
}

#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, ClientHandle>>,
    presence_version: AtomicU64,
    health_version: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; replaces a stale entry with the same conn id.
    pub fn register(&self, handle: ClientHandle) {
        tracing::info!(
            conn_id = %handle.conn_id,
            client_id = %handle.client_id,
            role = %handle.role,
            "client registered"
        );
        self.clients.write().insert(handle.conn_id.clone(), handle);
    }

    /// Remove a connection. Node-role clients drop out of routing here.
    pub fn remove(&self, conn_id: &str) -> Option<ClientHandle> {
        let removed = self.clients.write().remove(conn_id);
        if let Some(handle) = &removed {
            tracing::info!(conn_id = %conn_id, role = %handle.role, "client removed");
        }
        removed
    }

    pub fn touch(&self, conn_id: &str) {
        if let Some(handle) = self.clients.write().get_mut(conn_id) {
            handle.last_seen = Utc::now();
        }
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    pub fn presence_version(&self) -> u64 {
        self.presence_version.load(Ordering::Acquire)
    }

    pub fn health_version(&self) -> u64 {
        self.health_version.load(Ordering::Acquire)
    }

    /// Broadcast the presence snapshot to every connected client.
    /// The version increments before any frame is queued.
    pub fn broadcast_presence(&self) {
        let version = self.presence_version.fetch_add(1, Ordering::AcqRel) + 1;
        let clients = self.clients.read();

        let roster: Vec<serde_json::Value> = clients
            .values()
            .map(|c| {
                json!({
                    "id": c.client_id,
                    "role": c.role,
                    "connectedAt": c.connected_at.to_rfc3339(),
                })
            })
            .collect();
        let frame = EventFrame::new(
            "presence",
            json!({ "version": version, "clients": roster }),
        );

        for client in clients.values() {
            client.sender.send_json(&frame);
        }

        TraceEvent::PresenceBroadcast {
            version,
            clients: clients.len(),
        }
        .emit();
    }

    /// Broadcast process health (readiness phase) the same way.
    pub fn broadcast_health(&self, phase: &str) {
        let version = self.health_version.fetch_add(1, Ordering::AcqRel) + 1;
        let clients = self.clients.read();
        let frame = EventFrame::new("health", json!({ "version": version, "phase": phase }));
        for client in clients.values() {
            client.sender.send_json(&frame);
        }
    }

    /// Drop connections unseen for longer than `timeout_secs`.
    pub fn prune_stale(&self, timeout_secs: i64) -> usize {
        let now = Utc::now();
        let mut clients = self.clients.write();
        let before = clients.len();
        clients.retain(|_, c| now.signed_duration_since(c.last_seen).num_seconds() < timeout_secs);
        let pruned = before - clients.len();
        if pruned > 0 {
            tracing::info!(pruned, remaining = clients.len(), "pruned stale connections");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::send::{ConnScratch, Outbound};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn handle(conn_id: &str, role: &str) -> (ClientHandle, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = GuardedSender::new(
            tx,
            Arc::new(AtomicUsize::new(0)),
            1 << 20,
            Arc::new(Mutex::new(ConnScratch::default())),
        );
        (
            ClientHandle {
                conn_id: conn_id.into(),
                client_id: format!("client-{conn_id}"),
                role: role.into(),
                connected_at: Utc::now(),
                last_seen: Utc::now(),
                sender,
            },
            rx,
        )
    }

    #[test]
    fn presence_version_increments_before_fanout() {
        let registry = ClientRegistry::new();
        let (h1, mut rx1) = handle("c1", "ui");
        registry.register(h1);

        assert_eq!(registry.presence_version(), 0);
        registry.broadcast_presence();
        assert_eq!(registry.presence_version(), 1);

        let frame = match rx1.try_recv().unwrap() {
            Outbound::Frame(text) => serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            other => panic!("expected frame, got {other:?}"),
        };
        assert_eq!(frame["type"], "event");
        assert_eq!(frame["event"], "presence");
        assert_eq!(frame["payload"]["version"], 1);
        assert_eq!(frame["payload"]["clients"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn every_client_receives_the_broadcast() {
        let registry = ClientRegistry::new();
        let (h1, mut rx1) = handle("c1", "ui");
        let (h2, mut rx2) = handle("c2", "node");
        registry.register(h1);
        registry.register(h2);

        registry.broadcast_presence();
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn remove_returns_handle_for_unsubscribe() {
        let registry = ClientRegistry::new();
        let (h, _rx) = handle("c1", "node");
        registry.register(h);
        assert_eq!(registry.len(), 1);

        let removed = registry.remove("c1").unwrap();
        assert_eq!(removed.role, "node");
        assert!(registry.is_empty());
        assert!(registry.remove("c1").is_none());
    }

    #[test]
    fn health_version_is_independent() {
        let registry = ClientRegistry::new();
        registry.broadcast_presence();
        registry.broadcast_health("ready");
        registry.broadcast_health("ready");
        assert_eq!(registry.presence_version(), 1);
        assert_eq!(registry.health_version(), 2);
    }

    #[test]
    fn stale_connections_pruned() {
        let registry = ClientRegistry::new();
        let (mut h, _rx) = handle("c1", "ui");
        h.last_seen = Utc::now() - chrono::Duration::seconds(600);
        registry.register(h);

        assert_eq!(registry.prune_stale(120), 1);
        assert!(registry.is_empty());
    }
}
