// =============================================================================
// Runtime Configuration — monitor thresholds with atomic save
// =============================================================================
//
// Central configuration hub for the Funding Sentinel engine.  Every threshold
// the classifier, ranking engine, and scheduler consume lives here as a named
// field so that boundary values can be exercised in tests and tuned without a
// rebuild.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_extreme_rate() -> f64 {
    0.01
}

fn default_violent_change() -> f64 {
    0.005
}

fn default_rate_threshold() -> f64 {
    0.005
}

fn default_volume_threshold() -> f64 {
    10_000_000.0
}

fn default_top_n() -> usize {
    10
}

fn default_dedup_window_minutes() -> i64 {
    60
}

fn default_market_wide_min_extreme() -> usize {
    10
}

fn default_poll_interval_minutes() -> u64 {
    5
}

fn default_candle_lookback() -> u32 {
    30
}

fn default_price_surge() -> f64 {
    0.01
}

fn default_annotation_timeout_secs() -> u64 {
    5
}

fn default_data_dir() -> String {
    "data".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the Funding Sentinel engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Alert thresholds ----------------------------------------------------

    /// A funding rate strictly above `+extreme_rate` (or below the negative)
    /// raises an extreme alert. Default 0.01 = 1%.
    #[serde(default = "default_extreme_rate")]
    pub extreme_rate: f64,

    /// A period-over-period delta strictly above this magnitude raises a
    /// violent-change alert. Default 0.005 = 0.5 percentage points.
    #[serde(default = "default_violent_change")]
    pub violent_change: f64,

    /// Minimum symbol count with `|rate| > extreme_rate` before the
    /// market-wide advisory line is appended.
    #[serde(default = "default_market_wide_min_extreme")]
    pub market_wide_min_extreme: usize,

    /// Trailing suppression window for repeat alerts of the same kind.
    #[serde(default = "default_dedup_window_minutes")]
    pub dedup_window_minutes: i64,

    // --- Liquidity filter ----------------------------------------------------

    /// Inclusive `|rate|` floor for the hot-contracts ranking.
    #[serde(default = "default_rate_threshold")]
    pub rate_threshold: f64,

    /// Inclusive 24h quote-volume floor for the hot-contracts ranking (USD).
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: f64,

    /// Optional inclusive open-interest floor. `None` disables the OI filter.
    #[serde(default)]
    pub oi_threshold: Option<f64>,

    // --- Rankings & scheduling -----------------------------------------------

    /// Number of entries in each top-N ranking.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Scheduled cycle interval.
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u64,

    // --- Short-squeeze annotation --------------------------------------------

    /// Number of 1-minute candles consulted when annotating extreme-short
    /// alerts.
    #[serde(default = "default_candle_lookback")]
    pub candle_lookback: u32,

    /// Price change over the lookback window above which an extreme-short
    /// alert is annotated as a possible squeeze in progress.
    #[serde(default = "default_price_surge")]
    pub price_surge: f64,

    /// Hard timeout for each auxiliary candle fetch. The classification pass
    /// must never stall on a slow annotation lookup.
    #[serde(default = "default_annotation_timeout_secs")]
    pub annotation_timeout_secs: u64,

    // --- Storage -------------------------------------------------------------

    /// Directory holding the JSONL stores (snapshots, stats, sentiment,
    /// alerts).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            extreme_rate: default_extreme_rate(),
            violent_change: default_violent_change(),
            market_wide_min_extreme: default_market_wide_min_extreme(),
            dedup_window_minutes: default_dedup_window_minutes(),
            rate_threshold: default_rate_threshold(),
            volume_threshold: default_volume_threshold(),
            oi_threshold: None,
            top_n: default_top_n(),
            poll_interval_minutes: default_poll_interval_minutes(),
            candle_lookback: default_candle_lookback(),
            price_surge: default_price_surge(),
            annotation_timeout_secs: default_annotation_timeout_secs(),
            data_dir: default_data_dir(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            extreme_rate = config.extreme_rate,
            violent_change = config.violent_change,
            poll_interval_minutes = config.poll_interval_minutes,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    ///
    /// This prevents corruption if the process crashes mid-write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}
