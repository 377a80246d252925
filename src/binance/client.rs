// =============================================================================
// Binance Futures REST Client — public USDⓈ-M market data endpoints
// =============================================================================
//
// Only unsigned public endpoints are used: premiumIndex for funding rates,
// ticker/24hr for volumes, openInterest, klines, and exchangeInfo for the
// perpetual symbol universe. Transient failures are retried a bounded number
// of times with a fixed backoff before the error propagates to the caller.
// =============================================================================

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::binance::MarketData;
use crate::types::{Candle, RateMap, VolumeMap};

/// Retries per request before giving up.
const MAX_ATTEMPTS: u32 = 3;
/// Fixed pause between attempts.
const RETRY_BACKOFF_MS: u64 = 500;

/// Binance USDⓈ-M futures REST client.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceFuturesClient {
    /// Create a new client with a default HTTP client (10 s timeout).
    pub fn new() -> Self {
        Self::with_base_url("https://fapi.binance.com")
    }

    /// Create a client against a custom base URL (used by tests against a
    /// local stub server).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("failed to build reqwest client"),
        }
    }

    /// GET `url` and parse the JSON body, retrying transient failures.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_get_json(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!(url, attempt, max = MAX_ATTEMPTS, error = %e, "futures API request failed");
                    last_err = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_millis(RETRY_BACKOFF_MS)).await;
                    }
                }
            }
        }

        Err(last_err.expect("at least one attempt was made"))
    }

    async fn try_get_json(&self, url: &str) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} request failed"))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse response body from {url}"))?;

        if !status.is_success() {
            anyhow::bail!("futures API returned {status}: {body}");
        }
        Ok(body)
    }

    /// All USDT-quoted perpetual symbols currently trading.
    ///
    /// GET /fapi/v1/exchangeInfo, filtered to `status == TRADING`,
    /// `contractType == PERPETUAL`, symbol ending in USDT.
    #[instrument(skip(self), name = "binance::perpetual_symbols")]
    pub async fn fetch_perpetual_symbols(&self) -> Result<Vec<String>> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.base_url);
        let body = self.get_json(&url).await?;

        let entries = body["symbols"]
            .as_array()
            .context("exchangeInfo response missing 'symbols' array")?;

        let symbols: Vec<String> = entries
            .iter()
            .filter(|s| {
                s["symbol"].as_str().is_some_and(|sym| sym.ends_with("USDT"))
                    && s["status"].as_str() == Some("TRADING")
                    && s["contractType"].as_str() == Some("PERPETUAL")
            })
            .filter_map(|s| s["symbol"].as_str().map(str::to_string))
            .collect();

        debug!(count = symbols.len(), "perpetual symbols fetched");
        Ok(symbols)
    }
}

impl Default for BinanceFuturesClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketData for BinanceFuturesClient {
    /// GET /fapi/v1/premiumIndex — `lastFundingRate` per USDT-quoted symbol.
    #[instrument(skip(self), name = "binance::funding_rates")]
    async fn fetch_funding_rates(&self) -> Result<RateMap> {
        let url = format!("{}/fapi/v1/premiumIndex", self.base_url);
        let body = self.get_json(&url).await?;

        let entries = body
            .as_array()
            .context("premiumIndex response is not an array")?;

        let mut rates = RateMap::new();
        for entry in entries {
            let Some(symbol) = entry["symbol"].as_str() else {
                continue;
            };
            if !symbol.ends_with("USDT") {
                continue;
            }
            let rate: f64 = entry["lastFundingRate"]
                .as_str()
                .unwrap_or("0")
                .parse()
                .unwrap_or(0.0);
            rates.insert(symbol.to_string(), rate);
        }

        debug!(count = rates.len(), "funding rates fetched");
        Ok(rates)
    }

    /// GET /fapi/v1/ticker/24hr — `quoteVolume` per symbol.
    #[instrument(skip(self), name = "binance::volumes")]
    async fn fetch_volumes(&self) -> Result<VolumeMap> {
        let url = format!("{}/fapi/v1/ticker/24hr", self.base_url);
        let body = self.get_json(&url).await?;

        let entries = body
            .as_array()
            .context("ticker/24hr response is not an array")?;

        let mut volumes = VolumeMap::new();
        for entry in entries {
            let Some(symbol) = entry["symbol"].as_str() else {
                continue;
            };
            let volume: f64 = entry["quoteVolume"]
                .as_str()
                .unwrap_or("0")
                .parse()
                .unwrap_or(0.0);
            volumes.insert(symbol.to_string(), volume);
        }

        debug!(count = volumes.len(), "24h volumes fetched");
        Ok(volumes)
    }

    /// GET /fapi/v1/openInterest for one symbol.
    #[instrument(skip(self), name = "binance::open_interest")]
    async fn fetch_open_interest(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/fapi/v1/openInterest?symbol={symbol}", self.base_url);
        let body = self.get_json(&url).await?;

        let oi: f64 = body["openInterest"]
            .as_str()
            .context("openInterest response missing 'openInterest' field")?
            .parse()
            .with_context(|| format!("failed to parse open interest for {symbol}"))?;

        debug!(symbol, open_interest = oi, "open interest fetched");
        Ok(oi)
    }

    /// GET /fapi/v1/klines — array-of-arrays, oldest first.
    ///
    /// Array indices:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime
    #[instrument(skip(self), name = "binance::klines")]
    async fn fetch_recent_candles(
        &self,
        symbol: &str,
        interval_minutes: u32,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/fapi/v1/klines?symbol={}&interval={}m&limit={}",
            self.base_url, symbol, interval_minutes, limit
        );
        let body = self.get_json(&url).await?;

        let raw = body.as_array().context("klines response is not an array")?;

        let mut candles = Vec::with_capacity(raw.len());
        for entry in raw {
            let arr = entry.as_array().context("kline entry is not an array")?;
            if arr.len() < 7 {
                warn!("skipping malformed kline entry with {} elements", arr.len());
                continue;
            }

            let open_time = arr[0].as_i64().unwrap_or(0);
            let open = parse_str_f64(&arr[1])?;
            let high = parse_str_f64(&arr[2])?;
            let low = parse_str_f64(&arr[3])?;
            let close = parse_str_f64(&arr[4])?;
            let volume = parse_str_f64(&arr[5])?;
            let close_time = arr[6].as_i64().unwrap_or(0);

            candles.push(Candle::new(open_time, open, high, low, close, volume, close_time));
        }

        debug!(symbol, interval_minutes, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}
