// =============================================================================
// Statistics Store — append-only persistence for snapshots, stats, sentiment
// =============================================================================
//
// The orchestrator writes three record families per cycle: the raw rate
// snapshot, the derived top-N statistics, and the sentiment reading. The
// command menu reads only the latest stats/sentiment back. Modelled as a
// trait so tests run fully in memory and production appends to JSONL files.

pub mod jsonl;

pub use jsonl::JsonlStatsStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{FundingStats, RateMap, SentimentRecord};

/// A persisted raw snapshot, tagged with its source for forward
/// compatibility with multi-exchange storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub timestamp: DateTime<Utc>,
    pub exchange: String,
    pub interval: String,
    pub rates: RateMap,
}

impl SnapshotRecord {
    pub fn new(timestamp: DateTime<Utc>, rates: RateMap) -> Self {
        Self {
            timestamp,
            exchange: "binance".to_string(),
            interval: "8h".to_string(),
            rates,
        }
    }
}

/// Append/query capability over the cycle's persisted outputs.
pub trait StatsStore: Send + Sync {
    fn insert_snapshot(&self, record: SnapshotRecord) -> Result<()>;
    fn insert_stats(&self, stats: FundingStats) -> Result<()>;
    fn insert_sentiment(&self, record: SentimentRecord) -> Result<()>;

    /// Most recently inserted stats, if any cycle has completed.
    fn latest_stats(&self) -> Option<FundingStats>;

    /// Most recently inserted sentiment reading, if any.
    fn latest_sentiment(&self) -> Option<SentimentRecord>;
}

// =============================================================================
// In-memory store (tests)
// =============================================================================

/// Volatile store keeping full history in Vecs; the tail of each Vec is the
/// latest record.
#[derive(Default)]
pub struct InMemoryStatsStore {
    pub snapshots: RwLock<Vec<SnapshotRecord>>,
    pub stats: RwLock<Vec<FundingStats>>,
    pub sentiment: RwLock<Vec<SentimentRecord>>,
}

impl InMemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsStore for InMemoryStatsStore {
    fn insert_snapshot(&self, record: SnapshotRecord) -> Result<()> {
        self.snapshots.write().push(record);
        Ok(())
    }

    fn insert_stats(&self, stats: FundingStats) -> Result<()> {
        self.stats.write().push(stats);
        Ok(())
    }

    fn insert_sentiment(&self, record: SentimentRecord) -> Result<()> {
        self.sentiment.write().push(record);
        Ok(())
    }

    fn latest_stats(&self) -> Option<FundingStats> {
        self.stats.read().last().cloned()
    }

    fn latest_sentiment(&self) -> Option<SentimentRecord> {
        self.sentiment.read().last().cloned()
    }
}
