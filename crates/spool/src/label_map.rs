//! Persistent hashed-label map.
//!
//! `SK:TASKH:<hash16>` labels carry only a digest of the task external
//! ID; this map records `{externalId, label, hash}` triples discovered by
//! the reconciler so later runs (and the live exporter) can resolve them
//! without rescanning transcripts.

use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sk_domain::error::{Error, Result};
use sk_domain::TraceEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelMapEntry {
    pub external_id: String,
    pub label: String,
    pub hash: String,
}

/// Append-dedup store backed by `label-map.json`.
pub struct LabelMap {
    path: PathBuf,
    entries: Mutex<Vec<LabelMapEntry>>,
}

impl LabelMap {
    /// Default location: `<state_dir>/Exports/label-map.json`, overridable
    /// via `SUPER_KANBAN_LABEL_MAP_PATH` (already folded into config).
    pub fn default_path(state_dir: &std::path::Path) -> PathBuf {
        state_dir.join("Exports").join("label-map.json")
    }

    pub fn load(path: PathBuf) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<LabelMapEntry>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "corrupt label map, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Resolve a 16-hex hash back to its task external ID.
    pub fn resolve_hash(&self, hash: &str) -> Option<String> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.hash == hash)
            .map(|e| e.external_id.clone())
    }

    /// Append an entry unless any of its three fields is already mapped.
    /// Returns whether the entry was new.
    pub fn append_dedup(&self, entry: LabelMapEntry) -> Result<bool> {
        let mut entries = self.entries.lock();
        let duplicate = entries.iter().any(|e| {
            e.external_id == entry.external_id || e.label == entry.label || e.hash == entry.hash
        });
        if duplicate {
            return Ok(false);
        }

        entries.push(entry.clone());
        let snapshot = entries.clone();
        drop(entries);

        self.persist(&snapshot)?;
        TraceEvent::LabelMapAppended {
            external_id: entry.external_id,
            hash: entry.hash,
        }
        .emit();
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn persist(&self, entries: &[LabelMapEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, &self.path).map_err(Error::Io)?;
        Ok(())
    }
}
