// =============================================================================
// Alert History — injectable suppression store
// =============================================================================
//
// The classifier's deduplication rule needs a find-then-insert capability:
// "was an alert of this kind raised for this symbol within the trailing
// window?". Modelled as a trait so tests run against the in-memory store and
// production appends to a JSONL file that survives restarts.
//
// Records are retained indefinitely; only the trailing window matters to
// classification, so lookups scan newest-first.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::types::{AlertKind, AlertRecord};

/// Query/insert capability over persisted alerts.
pub trait AlertHistory: Send + Sync {
    /// Most recent record for `symbol` with kind in `kinds` and timestamp at
    /// or after `since` (the window is inclusive on both ends — `since` is
    /// `now - window` and records never postdate `now`).
    fn find_recent(
        &self,
        symbol: &str,
        kinds: &[AlertKind],
        since: DateTime<Utc>,
    ) -> Option<AlertRecord>;

    /// Append a new record. The record becomes the suppression anchor for
    /// its (symbol, kind) pair.
    fn insert(&self, record: AlertRecord) -> Result<()>;

    /// The `limit` most recent records, newest first. Used by the command
    /// menu's recent-alerts view.
    fn recent(&self, limit: usize) -> Vec<AlertRecord>;
}

// =============================================================================
// In-memory store (tests, and the cache layer of the file store)
// =============================================================================

/// Volatile alert history. Everything lives in a single Vec ordered by
/// insertion; cycles are serialised so insertion order is timestamp order.
#[derive(Default)]
pub struct InMemoryAlertHistory {
    records: RwLock<Vec<AlertRecord>>,
}

impl InMemoryAlertHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertHistory for InMemoryAlertHistory {
    fn find_recent(
        &self,
        symbol: &str,
        kinds: &[AlertKind],
        since: DateTime<Utc>,
    ) -> Option<AlertRecord> {
        self.records
            .read()
            .iter()
            .rev()
            .find(|r| r.symbol == symbol && kinds.contains(&r.kind) && r.timestamp >= since)
            .cloned()
    }

    fn insert(&self, record: AlertRecord) -> Result<()> {
        self.records.write().push(record);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Vec<AlertRecord> {
        let records = self.records.read();
        records.iter().rev().take(limit).cloned().collect()
    }
}

// =============================================================================
// JSONL-backed store
// =============================================================================

/// Durable alert history: one serde_json document per line, appended on every
/// insert, with a full in-memory mirror for window lookups.
pub struct JsonlAlertHistory {
    path: PathBuf,
    cache: InMemoryAlertHistory,
}

impl JsonlAlertHistory {
    /// Open (or create) the store at `path`, loading any existing records
    /// into the in-memory mirror. Malformed lines are skipped with a warning
    /// rather than poisoning the whole history.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = InMemoryAlertHistory::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read alert history from {}", path.display()))?;
            let mut loaded = 0usize;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<AlertRecord>(line) {
                    Ok(record) => {
                        cache.records.write().push(record);
                        loaded += 1;
                    }
                    Err(e) => warn!(error = %e, "skipping malformed alert history line"),
                }
            }
            info!(path = %path.display(), count = loaded, "alert history loaded");
        } else if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        Ok(Self { path, cache })
    }
}

impl AlertHistory for JsonlAlertHistory {
    fn find_recent(
        &self,
        symbol: &str,
        kinds: &[AlertKind],
        since: DateTime<Utc>,
    ) -> Option<AlertRecord> {
        self.cache.find_recent(symbol, kinds, since)
    }

    fn insert(&self, record: AlertRecord) -> Result<()> {
        let line = serde_json::to_string(&record).context("failed to serialise alert record")?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;

        self.cache.insert(record)
    }

    fn recent(&self, limit: usize) -> Vec<AlertRecord> {
        self.cache.recent(limit)
    }
}
