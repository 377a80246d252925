// =============================================================================
// Ranking Engine — top-N rate rankings and the liquidity-weighted filter
// =============================================================================
//
// Pure functions of their snapshot arguments: no hidden state, no side
// effects, deterministic given identical input. Entries are pre-ordered by
// symbol before the stable sort so that ties always break the same way.
//
// Boundary convention: the liquidity filter is inclusive (`>=`) on every
// threshold; strict comparisons belong to the alert classifier.

use crate::types::{LiquidityEntry, RankedEntry, RateMap, SortOrder, VolumeMap};

/// Return the first `n` entries of `rates` sorted by rate in `order`.
///
/// Output length is `min(n, |rates|)`; never padded.
pub fn top_n(rates: &RateMap, n: usize, order: SortOrder) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = rates
        .iter()
        .map(|(symbol, rate)| RankedEntry {
            symbol: symbol.clone(),
            rate: *rate,
        })
        .collect();

    // Symbol order first, then a stable sort by rate: reproducible ties.
    entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    match order {
        SortOrder::Descending => {
            entries.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap_or(std::cmp::Ordering::Equal))
        }
        SortOrder::Ascending => {
            entries.sort_by(|a, b| a.rate.partial_cmp(&b.rate).unwrap_or(std::cmp::Ordering::Equal))
        }
    }

    entries.truncate(n);
    entries
}

/// Open-interest lookup used by [`liquidity_filtered`]. `None` for a symbol
/// means the collaborator had no OI figure; such symbols only pass when no
/// OI threshold is configured.
pub type OpenInterestMap = std::collections::HashMap<String, f64>;

/// All symbols with `|rate| >= rate_threshold` and `volume >= volume_threshold`
/// (and, when `oi_threshold` is set, a known open interest `>= oi_threshold`),
/// sorted by `(|rate|, volume)` with both keys descending.
///
/// No upper bound on result size; callers truncate.
pub fn liquidity_filtered(
    rates: &RateMap,
    volumes: &VolumeMap,
    open_interest: Option<&OpenInterestMap>,
    rate_threshold: f64,
    volume_threshold: f64,
    oi_threshold: Option<f64>,
) -> Vec<LiquidityEntry> {
    let mut result: Vec<LiquidityEntry> = Vec::new();

    for (symbol, rate) in rates {
        let Some(volume) = volumes.get(symbol).copied() else {
            continue;
        };
        if rate.abs() < rate_threshold || volume < volume_threshold {
            continue;
        }

        let oi = open_interest.and_then(|m| m.get(symbol).copied());
        if let Some(min_oi) = oi_threshold {
            match oi {
                Some(v) if v >= min_oi => {}
                _ => continue,
            }
        }

        result.push(LiquidityEntry {
            symbol: symbol.clone(),
            funding_rate: *rate,
            volume_24h: volume,
            open_interest: if oi_threshold.is_some() { oi } else { None },
        });
    }

    result.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    result.sort_by(|a, b| {
        b.funding_rate
            .abs()
            .partial_cmp(&a.funding_rate.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.volume_24h
                    .partial_cmp(&a.volume_24h)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    result
}
