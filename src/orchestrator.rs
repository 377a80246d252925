// =============================================================================
// Cycle Orchestrator — one full monitoring pass per scheduled tick
// =============================================================================
//
// Phases per cycle: Idle -> Fetching -> Ingested -> Scored -> Done.
//
//   Fetching: pull the funding-rate snapshot. Empty or failed => abort the
//             cycle before any ledger mutation; nothing persisted, nothing
//             sent; retried on the next tick.
//   Ingested: rotate the ledger (the single swap of the cycle), compute
//             rankings and period-over-period movers, persist the raw
//             snapshot and the stats.
//   Scored:   pre-fetch candle annotations for extreme-short candidates,
//             classify + deduplicate alerts, score sentiment, dispatch the
//             concatenated alert message.
//   Done:     stamp the cycle and return to Idle.
//
// Storage and notification failures are logged and swallowed — downstream
// steps continue with in-memory values. Only the fetch gate aborts.
//
// Concurrency: `run_cycle` holds one `tokio::sync::Mutex` for its full
// duration. Scheduled ticks and the bot's manual refresh both enter through
// it, so cycles are strictly run-to-completion with no overlap and the
// ledger's current/previous pair is never read mid-swap.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::alerts::{extreme_short_candidates, AlertClassifier, AlertHistory, PriceMoves};
use crate::binance::MarketData;
use crate::bot::telegram::Notifier;
use crate::changes::biggest_changes;
use crate::ledger::RateLedger;
use crate::ranking::top_n;
use crate::runtime_config::RuntimeConfig;
use crate::sentiment::score_market;
use crate::store::{SnapshotRecord, StatsStore};
use crate::types::{ChangeDirection, FundingStats, SortOrder, window_price_change};

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Full pass: ledger rotated, stats persisted, alerts evaluated.
    Completed { symbols: usize, alerts_sent: usize },
    /// Fetch returned nothing usable; ledger untouched.
    SourceUnavailable,
}

/// Sequences one monitoring pass per tick and owns the rate ledger.
pub struct CycleOrchestrator<M: MarketData, N: Notifier> {
    config: RuntimeConfig,
    market: Arc<M>,
    notifier: Arc<N>,
    history: Arc<dyn AlertHistory>,
    store: Arc<dyn StatsStore>,
    /// The ledger lives inside the cycle lock: single writer, no mid-cycle
    /// readers.
    ledger: Mutex<RateLedger>,
    last_completed_at: RwLock<Option<DateTime<Utc>>>,
}

impl<M: MarketData, N: Notifier> CycleOrchestrator<M, N> {
    pub fn new(
        config: RuntimeConfig,
        market: Arc<M>,
        notifier: Arc<N>,
        history: Arc<dyn AlertHistory>,
        store: Arc<dyn StatsStore>,
    ) -> Self {
        Self {
            config,
            market,
            notifier,
            history,
            store,
            ledger: Mutex::new(RateLedger::new()),
            last_completed_at: RwLock::new(None),
        }
    }

    /// Timestamp of the last completed cycle, for the command menu.
    pub fn last_completed_at(&self) -> Option<DateTime<Utc>> {
        *self.last_completed_at.read()
    }

    /// Run one full cycle stamped `now`. Never invoked concurrently with
    /// itself: callers queue on the internal lock.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleOutcome {
        let mut ledger = self.ledger.lock().await;
        info!(at = %now, "cycle started");

        // ── Fetching ────────────────────────────────────────────────────
        let rates = match self.market.fetch_funding_rates().await {
            Ok(rates) if !rates.is_empty() => rates,
            Ok(_) => {
                warn!("funding rate fetch returned no symbols — skipping cycle");
                return CycleOutcome::SourceUnavailable;
            }
            Err(e) => {
                warn!(error = %e, "funding rate fetch failed — skipping cycle");
                return CycleOutcome::SourceUnavailable;
            }
        };
        let symbol_count = rates.len();

        // ── Ingested ────────────────────────────────────────────────────
        // The one ledger rotation of this cycle.
        ledger.update(rates, now);
        let current = ledger.current();
        let previous = ledger.previous();

        let top_highest = top_n(current, self.config.top_n, SortOrder::Descending);
        let top_lowest = top_n(current, self.config.top_n, SortOrder::Ascending);
        let (top_increases, top_decreases) = match previous {
            Some(prev) => (
                biggest_changes(current, prev, self.config.top_n, ChangeDirection::Increasing),
                biggest_changes(current, prev, self.config.top_n, ChangeDirection::Decreasing),
            ),
            None => (Vec::new(), Vec::new()),
        };

        if let Err(e) = self
            .store
            .insert_snapshot(SnapshotRecord::new(now, current.clone()))
        {
            warn!(error = %e, "failed to persist raw snapshot");
        }
        if let Err(e) = self.store.insert_stats(FundingStats {
            timestamp: now,
            top_highest,
            top_lowest,
            top_increases,
            top_decreases,
        }) {
            warn!(error = %e, "failed to persist funding stats");
        }

        // ── Scored ──────────────────────────────────────────────────────
        let price_moves = self.annotate_extreme_shorts(current).await;

        let classifier = AlertClassifier::new(&self.config, self.history.as_ref());
        let outcome = classifier.classify(current, previous, &price_moves, now);

        if let Some(record) = score_market(&current.values().copied().collect::<Vec<f64>>(), now) {
            debug!(score = record.score, avg_rate = record.avg_rate, "sentiment scored");
            if let Err(e) = self.store.insert_sentiment(record) {
                warn!(error = %e, "failed to persist sentiment record");
            }
        }

        let mut alerts_sent = 0usize;
        if let Some(message) = outcome.message(now) {
            alerts_sent = outcome.new_records.len();
            if let Err(e) = self.notifier.send_message(&message).await {
                // No retry of the same message; the cycle still completes.
                warn!(error = %e, "alert dispatch failed");
            }
        }

        // ── Done ────────────────────────────────────────────────────────
        *self.last_completed_at.write() = Some(now);
        info!(
            symbols = symbol_count,
            alerts = alerts_sent,
            suppressed = outcome.suppressed.len(),
            "cycle completed"
        );

        CycleOutcome::Completed {
            symbols: symbol_count,
            alerts_sent,
        }
    }

    /// Pre-fetch the short lookback price window for every extreme-short
    /// candidate. Each fetch is bounded by the configured timeout; failures
    /// and timeouts leave the symbol unannotated.
    async fn annotate_extreme_shorts(&self, current: &crate::types::RateMap) -> PriceMoves {
        let mut moves = PriceMoves::new();
        let timeout = std::time::Duration::from_secs(self.config.annotation_timeout_secs);

        for symbol in extreme_short_candidates(current, &self.config) {
            let fetch = self
                .market
                .fetch_recent_candles(&symbol, 1, self.config.candle_lookback);
            match tokio::time::timeout(timeout, fetch).await {
                Ok(Ok(candles)) => {
                    if let Some(change) = window_price_change(&candles) {
                        moves.insert(symbol, change);
                    }
                }
                Ok(Err(e)) => {
                    debug!(symbol = %symbol, error = %e, "candle window fetch failed — alert will be unannotated")
                }
                Err(_) => {
                    debug!(symbol = %symbol, "candle window fetch timed out — alert will be unannotated")
                }
            }
        }

        moves
    }
}
