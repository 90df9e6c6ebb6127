//! Crash-safe exporter state: `meta.json`.
//!
//! The meta file owns every cursor the pipeline needs to resume after a
//! crash: per-transcript byte offsets, the spool read offset, the set of
//! sessions already attached, and the backoff bookkeeping. Writes are
//! whole-file via write-temp-then-rename; a corrupt or missing file
//! falls back to defaults (the pipeline re-tails from current state
//! rather than refusing to start).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sk_domain::error::{Error, Result};

pub const META_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileCursor {
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaFile {
    pub version: u32,
    /// Byte cursor per absolute transcript path.
    #[serde(default)]
    pub file_cursors: BTreeMap<String, FileCursor>,
    /// Read offset into `spool.jsonl`.
    #[serde(default)]
    pub spool_offset: u64,
    /// Sessions for which an Attach-RUNNING has already succeeded.
    #[serde(default)]
    pub attached_sessions: BTreeMap<String, bool>,
    #[serde(default)]
    pub consecutive_failures: u32,
    /// Earliest wall-clock ms at which the sender may try again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_send_at_ms: Option<u64>,
}

impl Default for MetaFile {
    fn default() -> Self {
        Self {
            version: META_VERSION,
            file_cursors: BTreeMap::new(),
            spool_offset: 0,
            attached_sessions: BTreeMap::new(),
            consecutive_failures: 0,
            next_send_at_ms: None,
        }
    }
}

impl MetaFile {
    /// Load the meta file, tolerating absence and corruption.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<MetaFile>(&raw) {
                Ok(meta) if meta.version == META_VERSION => meta,
                Ok(meta) => {
                    tracing::warn!(
                        version = meta.version,
                        "unsupported meta version, starting from defaults"
                    );
                    MetaFile::default()
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "corrupt meta file, starting from defaults");
                    MetaFile::default()
                }
            },
            Err(_) => MetaFile::default(),
        }
    }

    /// Persist via write-temp-then-rename so a torn write leaves either
    /// the old or the new contents readable.
    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, path).map_err(Error::Io)?;
        Ok(())
    }

    pub fn cursor(&self, path: &str) -> Option<u64> {
        self.file_cursors.get(path).map(|c| c.offset)
    }

    pub fn set_cursor(&mut self, path: &str, offset: u64) {
        self.file_cursors
            .insert(path.to_owned(), FileCursor { offset });
    }

    pub fn is_attached(&self, session_key: &str) -> bool {
        self.attached_sessions
            .get(session_key)
            .copied()
            .unwrap_or(false)
    }

    pub fn mark_attached(&mut self, session_key: &str) {
        self.attached_sessions.insert(session_key.to_owned(), true);
    }
}
