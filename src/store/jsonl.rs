// =============================================================================
// JSONL-backed stats store
// =============================================================================
//
// One file per record family under the configured data directory, one
// serde_json document per line, append-only. The latest stats and sentiment
// are mirrored in memory so menu queries never touch the filesystem; on open
// the mirrors are rehydrated from the last line of each file.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::store::{SnapshotRecord, StatsStore};
use crate::types::{FundingStats, SentimentRecord};

/// Durable append-only store rooted at a data directory.
pub struct JsonlStatsStore {
    snapshots_path: PathBuf,
    stats_path: PathBuf,
    sentiment_path: PathBuf,
    latest_stats: RwLock<Option<FundingStats>>,
    latest_sentiment: RwLock<Option<SentimentRecord>>,
}

impl JsonlStatsStore {
    /// Open the store under `data_dir`, creating the directory if needed and
    /// rehydrating the latest-record mirrors from disk.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data dir {}", dir.display()))?;

        let store = Self {
            snapshots_path: dir.join("funding_rates.jsonl"),
            stats_path: dir.join("funding_stats.jsonl"),
            sentiment_path: dir.join("market_sentiment.jsonl"),
            latest_stats: RwLock::new(None),
            latest_sentiment: RwLock::new(None),
        };

        *store.latest_stats.write() = read_last_record(&store.stats_path);
        *store.latest_sentiment.write() = read_last_record(&store.sentiment_path);

        info!(
            dir = %dir.display(),
            has_stats = store.latest_stats.read().is_some(),
            has_sentiment = store.latest_sentiment.read().is_some(),
            "stats store opened"
        );
        Ok(store)
    }
}

impl StatsStore for JsonlStatsStore {
    fn insert_snapshot(&self, record: SnapshotRecord) -> Result<()> {
        append_line(&self.snapshots_path, &record)
    }

    fn insert_stats(&self, stats: FundingStats) -> Result<()> {
        append_line(&self.stats_path, &stats)?;
        *self.latest_stats.write() = Some(stats);
        Ok(())
    }

    fn insert_sentiment(&self, record: SentimentRecord) -> Result<()> {
        append_line(&self.sentiment_path, &record)?;
        *self.latest_sentiment.write() = Some(record);
        Ok(())
    }

    fn latest_stats(&self) -> Option<FundingStats> {
        self.latest_stats.read().clone()
    }

    fn latest_sentiment(&self) -> Option<SentimentRecord> {
        self.latest_sentiment.read().clone()
    }
}

/// Append one serialised record plus newline.
fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let line = serde_json::to_string(record).context("failed to serialise record")?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("failed to append to {}", path.display()))?;
    Ok(())
}

/// Parse the last well-formed line of a JSONL file, if the file exists.
fn read_last_record<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = std::fs::read_to_string(path).ok()?;
    for line in content.lines().rev() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => return Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping malformed trailing record")
            }
        }
    }
    None
}
