//! Append-only request history, persisted as one JSON array.
//!
//! Entries are written once when a request completes and never edited.
//! Writes are last-writer-wins; there is no cross-process coordination.

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use shared::settings;
use shared::stats::HistoryItem;

/// Two appends of the same query inside this window are treated as a
/// double-fire and collapsed into one entry.
const DUPLICATE_WINDOW_MS: i64 = 1000;

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn open_default() -> Result<Self> {
        let dir = settings::config_dir().ok_or_else(|| anyhow!("no config directory"))?;
        Ok(Self::with_path(dir.join("history.json")))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// All entries, newest first. A missing or corrupt file reads as empty.
    pub fn load(&self) -> Vec<HistoryItem> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str(&contents).unwrap_or_default()
    }

    fn save(&self, items: &[HistoryItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(items)?)?;
        Ok(())
    }

    /// Append one completed request. Returns false when the entry was
    /// dropped as a duplicate.
    pub fn append(&self, item: HistoryItem) -> Result<bool> {
        let mut items = self.load();

        let duplicate = items.iter().any(|existing| {
            existing.query == item.query
                && (item.timestamp_ms - existing.timestamp_ms).abs() <= DUPLICATE_WINDOW_MS
        });
        if duplicate {
            tracing::debug!("dropping duplicate history entry for {:?}", item.action_id);
            return Ok(false);
        }

        items.insert(0, item);
        self.save(&items)?;
        Ok(true)
    }

    /// Delete the entry with this exact timestamp, if present.
    pub fn remove(&self, timestamp_ms: i64) -> Result<()> {
        let mut items = self.load();
        items.retain(|item| item.timestamp_ms != timestamp_ms);
        self.save(&items)
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
