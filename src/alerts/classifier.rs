// =============================================================================
// Alert Classifier — per-symbol threshold pass with windowed deduplication
// =============================================================================
//
// For each symbol in the current snapshot:
//   rate  = current[symbol]
//   delta = rate - previous[symbol]   (0 when no prior value exists)
//
//   rate >  +extreme_rate      => Extreme, long squeeze risk
//   rate <  -extreme_rate      => Extreme, short side; annotated from the
//                                 pre-fetched price window when available
//   |delta| > violent_change   => Change
//
// Market-wide advisory: when >= market_wide_min_extreme symbols sit beyond
// |extreme_rate|, one cycle-scoped line is appended. Never stored, never
// deduplicated.
//
// Deduplication: one history lookup per symbol covering both kinds over the
// trailing rolling window [now - dedup_window, now], inclusive. A hit
// suppresses every candidate for that symbol this cycle and inserts nothing;
// a miss lets the candidates through and each emitted alert is persisted as
// the new suppression anchor. Extreme-long and extreme-short share the
// Extreme key, so an instrument alternating between them stays snoozed.
//
// All thresholds are strict comparisons; a rate sitting exactly on the
// threshold raises nothing.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::alerts::history::AlertHistory;
use crate::runtime_config::RuntimeConfig;
use crate::types::{AlertKind, AlertRecord, RateMap};

/// Both alert kinds share one suppression key space.
const DEDUP_KINDS: &[AlertKind] = &[AlertKind::Extreme, AlertKind::Change];

/// Pre-fetched fractional price change over the short lookback window, per
/// extreme-short candidate. A missing entry means the auxiliary fetch failed
/// or timed out; the alert is still raised without the annotation.
pub type PriceMoves = HashMap<String, f64>;

/// Everything one classification pass produced.
#[derive(Debug, Default)]
pub struct ClassificationOutcome {
    pub extreme_lines: Vec<String>,
    pub change_lines: Vec<String>,
    pub market_wide: Option<String>,
    /// Records persisted this pass (one per emitted alert).
    pub new_records: Vec<AlertRecord>,
    /// Symbols whose candidates were suppressed by the dedup window.
    pub suppressed: Vec<String>,
}

impl ClassificationOutcome {
    /// Concatenate all emitted lines into one outbound message, or `None`
    /// when nothing fired this cycle.
    pub fn message(&self, at: DateTime<Utc>) -> Option<String> {
        if self.extreme_lines.is_empty() && self.change_lines.is_empty() && self.market_wide.is_none()
        {
            return None;
        }

        let mut lines = vec![format!("🚨 Funding rate alert ({})", at.format("%Y-%m-%d %H:%M:%S"))];

        if let Some(wide) = &self.market_wide {
            lines.push(wide.clone());
        }
        if !self.extreme_lines.is_empty() {
            lines.push("\n🌡 Extreme funding rates".to_string());
            lines.extend(self.extreme_lines.iter().cloned());
        }
        if !self.change_lines.is_empty() {
            lines.push("\n💥 Violent funding moves".to_string());
            lines.extend(self.change_lines.iter().cloned());
        }

        Some(lines.join("\n"))
    }
}

/// Symbols the orchestrator must pre-fetch a candle window for: the
/// extreme-short candidates of the current snapshot.
pub fn extreme_short_candidates(current: &RateMap, config: &RuntimeConfig) -> Vec<String> {
    let mut symbols: Vec<String> = current
        .iter()
        .filter(|(_, rate)| **rate < -config.extreme_rate)
        .map(|(symbol, _)| symbol.clone())
        .collect();
    symbols.sort();
    symbols
}

/// Threshold classifier over one cycle's ledger state.
pub struct AlertClassifier<'a> {
    config: &'a RuntimeConfig,
    history: &'a dyn AlertHistory,
}

impl<'a> AlertClassifier<'a> {
    pub fn new(config: &'a RuntimeConfig, history: &'a dyn AlertHistory) -> Self {
        Self { config, history }
    }

    /// Run the classification pass for the cycle stamped `now`.
    ///
    /// Deterministic given identical inputs and history state: symbols are
    /// visited in sorted order.
    pub fn classify(
        &self,
        current: &RateMap,
        previous: Option<&RateMap>,
        price_moves: &PriceMoves,
        now: DateTime<Utc>,
    ) -> ClassificationOutcome {
        let window_start = now - Duration::minutes(self.config.dedup_window_minutes);
        let mut outcome = ClassificationOutcome::default();
        let mut extreme_count = 0usize;

        let mut symbols: Vec<&String> = current.keys().collect();
        symbols.sort();

        for symbol in symbols {
            let rate = current[symbol];
            let delta = previous
                .and_then(|p| p.get(symbol))
                .map(|prev| rate - prev)
                .unwrap_or(0.0);

            if rate.abs() > self.config.extreme_rate {
                extreme_count += 1;
            }

            let is_extreme = rate.abs() > self.config.extreme_rate;
            let is_violent = delta.abs() > self.config.violent_change;
            if !is_extreme && !is_violent {
                continue;
            }

            // One read-then-write per symbol; cycles are serialised so this
            // needs no extra locking.
            if let Some(anchor) = self.history.find_recent(symbol, DEDUP_KINDS, window_start) {
                debug!(
                    symbol = %symbol,
                    anchor_kind = %anchor.kind,
                    anchor_at = %anchor.timestamp,
                    "alert suppressed by dedup window"
                );
                outcome.suppressed.push(symbol.clone());
                continue;
            }

            if rate > self.config.extreme_rate {
                outcome.extreme_lines.push(format!(
                    "🔥 {symbol} long funding at {}, long squeeze risk",
                    fmt_pct(rate)
                ));
                self.persist(&mut outcome, AlertRecord::new(symbol, AlertKind::Extreme, rate, None, now));
            } else if rate < -self.config.extreme_rate {
                let line = match price_moves.get(symbol) {
                    Some(change) if *change > self.config.price_surge => format!(
                        "❗ {symbol} short funding at {}, price up {} over the last {} minutes — possible short squeeze in progress",
                        fmt_pct(rate),
                        fmt_pct(*change),
                        self.config.candle_lookback
                    ),
                    Some(_) => format!(
                        "❄️ {symbol} short funding at {}, potential rebound opportunity",
                        fmt_pct(rate)
                    ),
                    None => format!("❄️ {symbol} short funding at {}, short squeeze risk", fmt_pct(rate)),
                };
                outcome.extreme_lines.push(line);
                self.persist(&mut outcome, AlertRecord::new(symbol, AlertKind::Extreme, rate, None, now));
            }

            if is_violent {
                outcome.change_lines.push(format!(
                    "⚡ {symbol} funding moved {} since last cycle",
                    fmt_pct(delta)
                ));
                self.persist(
                    &mut outcome,
                    AlertRecord::new(symbol, AlertKind::Change, rate, Some(delta), now),
                );
            }
        }

        if extreme_count >= self.config.market_wide_min_extreme {
            outcome.market_wide = Some(format!(
                "📊 {extreme_count} symbols with funding beyond ±{:.4}% — market positioning is stretched, trade with care",
                self.config.extreme_rate * 100.0
            ));
        }

        outcome
    }

    fn persist(&self, outcome: &mut ClassificationOutcome, record: AlertRecord) {
        // Storage failure must not abort the classification pass.
        if let Err(e) = self.history.insert(record.clone()) {
            warn!(symbol = %record.symbol, kind = %record.kind, error = %e, "failed to persist alert record");
        }
        outcome.new_records.push(record);
    }
}

/// Render a fraction as a signed percentage, e.g. `0.012` => `+1.2000%`.
fn fmt_pct(fraction: f64) -> String {
    format!("{:+.4}%", fraction * 100.0)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::history::InMemoryAlertHistory;
    use chrono::Duration;

    fn rates(pairs: &[(&str, f64)]) -> RateMap {
        pairs.iter().map(|(s, r)| (s.to_string(), *r)).collect()
    }

    fn classify_once(
        config: &RuntimeConfig,
        history: &dyn AlertHistory,
        current: &RateMap,
        previous: Option<&RateMap>,
        now: DateTime<Utc>,
    ) -> ClassificationOutcome {
        AlertClassifier::new(config, history).classify(current, previous, &PriceMoves::new(), now)
    }

    #[test]
    fn extreme_long_and_short_flagged_midrange_not() {
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();
        let cur = rates(&[("AUSDT", 0.012), ("BUSDT", -0.011), ("CUSDT", 0.002)]);

        let out = classify_once(&cfg, &history, &cur, None, Utc::now());
        assert_eq!(out.extreme_lines.len(), 2);
        assert!(out.extreme_lines.iter().any(|l| l.contains("AUSDT")));
        assert!(out.extreme_lines.iter().any(|l| l.contains("BUSDT")));
        assert!(!out.extreme_lines.iter().any(|l| l.contains("CUSDT")));
        assert_eq!(out.new_records.len(), 2);
    }

    #[test]
    fn thresholds_are_strict() {
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();
        let prev = rates(&[("EDGE", 0.0), ("MOVE", 0.0)]);
        let cur = rates(&[("EDGE", 0.01), ("MOVE", 0.005)]);

        let out = classify_once(&cfg, &history, &cur, Some(&prev), Utc::now());
        assert!(out.extreme_lines.is_empty());
        assert!(out.change_lines.is_empty());
        assert!(out.new_records.is_empty());
    }

    #[test]
    fn violent_change_candidate_from_delta() {
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();
        let prev = rates(&[("AUSDT", 0.004)]);
        let cur = rates(&[("AUSDT", 0.012)]);

        let out = classify_once(&cfg, &history, &cur, Some(&prev), Utc::now());
        // delta 0.008 > 0.005 => change alert; rate 0.012 > 0.01 => extreme too.
        assert_eq!(out.change_lines.len(), 1);
        assert_eq!(out.extreme_lines.len(), 1);
        assert_eq!(out.new_records.len(), 2);
        assert!(out
            .new_records
            .iter()
            .any(|r| r.kind == AlertKind::Change && r.change == Some(0.012 - 0.004)));
    }

    #[test]
    fn no_previous_value_means_zero_delta() {
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();
        let prev = rates(&[("OTHER", 0.0)]);
        let cur = rates(&[("NEWLY", 0.008)]);

        let out = classify_once(&cfg, &history, &cur, Some(&prev), Utc::now());
        assert!(out.change_lines.is_empty());
    }

    #[test]
    fn dedup_suppresses_within_window_and_releases_after() {
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();
        let cur = rates(&[("BTCUSDT", 0.02)]);
        let t0 = Utc::now();

        let first = classify_once(&cfg, &history, &cur, None, t0);
        assert_eq!(first.new_records.len(), 1);

        // Identical trigger 30 minutes later: suppressed, nothing inserted.
        let second = classify_once(&cfg, &history, &cur, None, t0 + Duration::minutes(30));
        assert!(second.extreme_lines.is_empty());
        assert!(second.new_records.is_empty());
        assert_eq!(second.suppressed, vec!["BTCUSDT".to_string()]);
        assert_eq!(history.recent(10).len(), 1);

        // 61 minutes after the anchor the window has elapsed.
        let third = classify_once(&cfg, &history, &cur, None, t0 + Duration::minutes(61));
        assert_eq!(third.new_records.len(), 1);
        assert_eq!(history.recent(10).len(), 2);
    }

    #[test]
    fn extreme_long_and_short_share_suppression_key() {
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();
        let t0 = Utc::now();

        let long = rates(&[("FLIP", 0.02)]);
        classify_once(&cfg, &history, &long, None, t0);

        // Flips to extreme-short within the window: still suppressed.
        let short = rates(&[("FLIP", -0.02)]);
        let out = classify_once(&cfg, &history, &short, None, t0 + Duration::minutes(10));
        assert!(out.extreme_lines.is_empty());
        assert!(out.new_records.is_empty());
    }

    #[test]
    fn change_record_suppresses_later_extreme() {
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();
        let t0 = Utc::now();
        history
            .insert(AlertRecord::new("X", AlertKind::Change, 0.002, Some(0.006), t0))
            .unwrap();

        let cur = rates(&[("X", 0.05)]);
        let out = classify_once(&cfg, &history, &cur, None, t0 + Duration::minutes(5));
        assert!(out.new_records.is_empty());
    }

    #[test]
    fn short_squeeze_annotation_variants() {
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();
        let cur = rates(&[("SURGE", -0.02), ("CALM", -0.02), ("DARK", -0.02)]);

        let mut moves = PriceMoves::new();
        moves.insert("SURGE".to_string(), 0.03); // > +1% over the window
        moves.insert("CALM".to_string(), -0.002);

        let out = AlertClassifier::new(&cfg, &history).classify(&cur, None, &moves, Utc::now());
        let surge = out.extreme_lines.iter().find(|l| l.contains("SURGE")).unwrap();
        assert!(surge.contains("short squeeze in progress"));
        let calm = out.extreme_lines.iter().find(|l| l.contains("CALM")).unwrap();
        assert!(calm.contains("rebound opportunity"));
        // Failed annotation fetch degrades gracefully: alert still raised.
        let dark = out.extreme_lines.iter().find(|l| l.contains("DARK")).unwrap();
        assert!(dark.contains("short squeeze risk"));
        assert_eq!(out.new_records.len(), 3);
    }

    #[test]
    fn market_wide_advisory_fires_at_ten_extremes() {
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();

        let mut nine: Vec<(String, f64)> =
            (0..9).map(|i| (format!("S{i}USDT"), 0.02)).collect();
        let cur9: RateMap = nine.iter().cloned().collect();
        let out9 = classify_once(&cfg, &InMemoryAlertHistory::new(), &cur9, None, Utc::now());
        assert!(out9.market_wide.is_none());

        nine.push(("S9USDT".to_string(), -0.02));
        let cur10: RateMap = nine.into_iter().collect();
        let out10 = classify_once(&cfg, &history, &cur10, None, Utc::now());
        assert!(out10.market_wide.is_some());
    }

    #[test]
    fn market_wide_counts_suppressed_symbols_too() {
        // The advisory is cycle-scoped and independent of per-symbol dedup.
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();
        let t0 = Utc::now();
        for i in 0..10 {
            history
                .insert(AlertRecord::new(format!("S{i}USDT"), AlertKind::Extreme, 0.02, None, t0))
                .unwrap();
        }

        let cur: RateMap = (0..10).map(|i| (format!("S{i}USDT"), 0.02)).collect();
        let out = classify_once(&cfg, &history, &cur, None, t0 + Duration::minutes(5));
        assert!(out.extreme_lines.is_empty());
        assert!(out.market_wide.is_some());
    }

    #[test]
    fn message_assembly_and_quiet_cycles() {
        let cfg = RuntimeConfig::default();
        let history = InMemoryAlertHistory::new();
        let now = Utc::now();

        let quiet = classify_once(&cfg, &history, &rates(&[("OK", 0.0001)]), None, now);
        assert!(quiet.message(now).is_none());

        let loud = classify_once(&cfg, &history, &rates(&[("HOT", 0.02)]), None, now);
        let msg = loud.message(now).unwrap();
        assert!(msg.contains("Funding rate alert"));
        assert!(msg.contains("HOT"));
    }

    #[test]
    fn extreme_short_candidates_sorted() {
        let cfg = RuntimeConfig::default();
        let cur = rates(&[("Z", -0.02), ("A", -0.03), ("B", 0.02), ("C", -0.005)]);
        assert_eq!(extreme_short_candidates(&cur, &cfg), vec!["A", "Z"]);
    }
}
