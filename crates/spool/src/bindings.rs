//! Session → entity bindings.
//!
//! The agent runtime maintains `sessions.json` per agent, mapping session
//! keys to session IDs and optional labels. A transcript line is only
//! exported when its `(agentId, sessionId)` reverse-resolves to a session
//! key whose label routes to a Super-Kanban entity. The index is reloaded
//! whenever its mtime changes and the cached map replaced atomically.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::Deserialize;
use sk_domain::TraceEvent;
use sk_keys::{parse_sk_routing_label, EntityType, RoutingLabel};

use crate::label_map::LabelMap;

/// A session bound to a Super-Kanban entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionBinding {
    pub session_key: String,
    pub label: String,
    pub entity_type: EntityType,
    pub entity_external_id: String,
}

/// On-disk shape of one `sessions.json` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionIndexEntry {
    session_id: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Clone)]
struct ReverseEntry {
    session_key: String,
    label: Option<String>,
}

struct AgentCache {
    mtime: SystemTime,
    by_session_id: HashMap<String, ReverseEntry>,
}

/// Resolves `(agentId, sessionId)` pairs to [`SessionBinding`]s.
pub struct BindingResolver {
    state_dir: PathBuf,
    label_map: Arc<LabelMap>,
    cache: Mutex<HashMap<String, AgentCache>>,
}

impl BindingResolver {
    pub fn new(state_dir: PathBuf, label_map: Arc<LabelMap>) -> Self {
        Self {
            state_dir,
            label_map,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn label_map(&self) -> &Arc<LabelMap> {
        &self.label_map
    }

    /// Resolve a binding; `None` means the line is skipped (cursor still
    /// advances upstream).
    pub fn resolve(&self, agent_id: &str, session_id: &str) -> Option<SessionBinding> {
        let entry = self.lookup(agent_id, session_id)?;
        let label = entry.label?;
        self.binding_from_label(&entry.session_key, &label)
    }

    /// Turn a routing label into a binding, consulting the label map for
    /// hashed task labels.
    pub fn binding_from_label(&self, session_key: &str, label: &str) -> Option<SessionBinding> {
        match parse_sk_routing_label(label)? {
            RoutingLabel::Direct {
                entity_type,
                entity_external_id,
            } => Some(SessionBinding {
                session_key: session_key.to_owned(),
                label: label.trim().to_owned(),
                entity_type,
                entity_external_id,
            }),
            RoutingLabel::TaskHash { label, hash } => {
                let external_id = self.label_map.resolve_hash(&hash)?;
                Some(SessionBinding {
                    session_key: session_key.to_owned(),
                    label,
                    entity_type: EntityType::Task,
                    entity_external_id: external_id,
                })
            }
        }
    }

    /// Raw reverse lookup without label routing (used by the reconciler's
    /// hashed-label scan, which needs the unresolved label too).
    pub fn session_key_and_label(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Option<(String, Option<String>)> {
        self.lookup(agent_id, session_id)
            .map(|e| (e.session_key, e.label))
    }

    fn lookup(&self, agent_id: &str, session_id: &str) -> Option<ReverseEntry> {
        let path = self
            .state_dir
            .join("agents")
            .join(agent_id)
            .join("sessions")
            .join("sessions.json");

        let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;

        let mut cache = self.cache.lock();
        let stale = match cache.get(agent_id) {
            Some(agent_cache) => agent_cache.mtime != mtime,
            None => true,
        };

        if stale {
            let raw = std::fs::read_to_string(&path).ok()?;
            let index: HashMap<String, SessionIndexEntry> = match serde_json::from_str(&raw) {
                Ok(index) => index,
                Err(e) => {
                    tracing::warn!(
                        agent_id,
                        path = %path.display(),
                        error = %e,
                        "unreadable sessions index"
                    );
                    return None;
                }
            };

            let by_session_id: HashMap<String, ReverseEntry> = index
                .into_iter()
                .map(|(session_key, entry)| {
                    (
                        entry.session_id,
                        ReverseEntry {
                            session_key,
                            label: entry.label,
                        },
                    )
                })
                .collect();

            TraceEvent::BindingsReloaded {
                agent_id: agent_id.to_owned(),
                sessions: by_session_id.len(),
            }
            .emit();

            cache.insert(
                agent_id.to_owned(),
                AgentCache {
                    mtime,
                    by_session_id,
                },
            );
        }

        cache
            .get(agent_id)
            .and_then(|c| c.by_session_id.get(session_id))
            .cloned()
    }
}
