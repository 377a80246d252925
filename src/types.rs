// =============================================================================
// Shared types used across the Funding Sentinel engine
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time mapping of instrument symbol to funding rate.
///
/// Rates are signed fractions (e.g. `0.0001` = 0.01%). Positive funding means
/// longs pay shorts.
pub type RateMap = HashMap<String, f64>;

/// 24h quote-volume per symbol, supplied by the exchange ticker endpoint.
pub type VolumeMap = HashMap<String, f64>;

/// Sort direction for rate rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Descending,
    Ascending,
}

/// Which side of the period-over-period delta a change query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDirection {
    Increasing,
    Decreasing,
}

/// A (symbol, rate) pair produced by the ranking engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub symbol: String,
    pub rate: f64,
}

/// A (symbol, delta) pair produced by the change detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateDelta {
    pub symbol: String,
    pub change: f64,
}

/// One row of the liquidity-weighted "hot contracts" ranking: funding rate
/// and 24h volume both above threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityEntry {
    pub symbol: String,
    pub funding_rate: f64,
    pub volume_24h: f64,
    /// Present only when an open-interest threshold was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_interest: Option<f64>,
}

/// Alert category. Extreme-long and extreme-short share the `Extreme` key so
/// that an instrument flapping between the two stays suppressed by a single
/// deduplication record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Extreme,
    Change,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extreme => write!(f, "extreme"),
            Self::Change => write!(f, "change"),
        }
    }
}

/// A persisted alert. Created once by the classifier, never mutated, and
/// consulted afterwards only as a suppression anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl AlertRecord {
    /// Build a new record with a fresh id.
    pub fn new(
        symbol: impl Into<String>,
        kind: AlertKind,
        rate: f64,
        change: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            kind,
            rate,
            change,
            timestamp,
        }
    }
}

/// One market-sentiment reading per cycle. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub timestamp: DateTime<Utc>,
    pub avg_rate: f64,
    pub std_rate: f64,
    /// Logistic score in [0, 100]; >50 leans greed, <50 leans fear.
    pub score: f64,
}

/// Per-cycle ranking statistics, persisted and served to the command menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingStats {
    pub timestamp: DateTime<Utc>,
    pub top_highest: Vec<RankedEntry>,
    pub top_lowest: Vec<RankedEntry>,
    pub top_increases: Vec<RateDelta>,
    pub top_decreases: Vec<RateDelta>,
}

/// A single OHLCV candle from the futures kline endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Fractional price change over an ordered candle window:
/// `(last close - first open) / first open`.
///
/// Returns `None` for windows with fewer than two candles or a zero first
/// open (nothing meaningful to compare).
pub fn window_price_change(candles: &[Candle]) -> Option<f64> {
    if candles.len() < 2 {
        return None;
    }
    let open = candles.first()?.open;
    let close = candles.last()?.close;
    if open == 0.0 {
        return None;
    }
    Some((close - open) / open)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, close: f64) -> Candle {
        Candle::new(0, open, open.max(close), open.min(close), close, 1.0, 0)
    }

    #[test]
    fn alert_kind_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&AlertKind::Extreme).unwrap(), "\"extreme\"");
        assert_eq!(serde_json::to_string(&AlertKind::Change).unwrap(), "\"change\"");
    }

    #[test]
    fn alert_record_round_trips_with_type_field() {
        let rec = AlertRecord::new("BTCUSDT", AlertKind::Change, 0.002, Some(0.006), Utc::now());
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"type\":\"change\""));
        let back: AlertRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.symbol, "BTCUSDT");
        assert_eq!(back.kind, AlertKind::Change);
        assert_eq!(back.change, Some(0.006));
    }

    #[test]
    fn window_price_change_basic() {
        let candles = vec![candle(100.0, 101.0), candle(101.0, 103.0)];
        let change = window_price_change(&candles).unwrap();
        assert!((change - 0.03).abs() < 1e-12);
    }

    #[test]
    fn window_price_change_needs_two_candles() {
        assert!(window_price_change(&[]).is_none());
        assert!(window_price_change(&[candle(100.0, 110.0)]).is_none());
    }

    #[test]
    fn window_price_change_zero_open_is_none() {
        let candles = vec![candle(0.0, 1.0), candle(1.0, 2.0)];
        assert!(window_price_change(&candles).is_none());
    }
}
