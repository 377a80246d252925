pub mod client;

pub use client::BinanceFuturesClient;

use anyhow::Result;

use crate::types::{Candle, RateMap, VolumeMap};

/// Market data source consumed by the cycle orchestrator.
///
/// The production implementation polls the Binance futures REST API; tests
/// supply synthetic snapshots. An error (or empty map) from
/// `fetch_funding_rates` makes the orchestrator abort the cycle; every other
/// method degrades gracefully.
pub trait MarketData: Send + Sync {
    /// Funding rates for all tracked perpetuals. Symbol -> signed fraction.
    async fn fetch_funding_rates(&self) -> Result<RateMap>;

    /// 24h quote volume per symbol.
    async fn fetch_volumes(&self) -> Result<VolumeMap>;

    /// Current open interest for one symbol.
    async fn fetch_open_interest(&self, symbol: &str) -> Result<f64>;

    /// The most recent `limit` candles at `interval_minutes` granularity,
    /// oldest first.
    async fn fetch_recent_candles(
        &self,
        symbol: &str,
        interval_minutes: u32,
        limit: u32,
    ) -> Result<Vec<Candle>>;
}
