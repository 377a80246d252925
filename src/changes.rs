// =============================================================================
// Change Detector — period-over-period funding-rate deltas
// =============================================================================
//
// Compares the current snapshot against the previous one and ranks the
// biggest movers in each direction. Symbols present in only one of the two
// snapshots are appearances/disappearances, not changes, and are silently
// excluded. Zero deltas belong to neither direction.
//
// Pure and idempotent: identical inputs always yield identical output.

use crate::types::{ChangeDirection, RateDelta, RateMap};

/// Top `n` movers in `direction` between `previous` and `current`.
///
/// Increasing keeps strictly positive deltas sorted descending; Decreasing
/// keeps strictly negative deltas sorted ascending — first element is always
/// the largest move in the requested direction.
pub fn biggest_changes(
    current: &RateMap,
    previous: &RateMap,
    n: usize,
    direction: ChangeDirection,
) -> Vec<RateDelta> {
    let mut deltas: Vec<RateDelta> = current
        .iter()
        .filter_map(|(symbol, rate)| {
            let prev = previous.get(symbol)?;
            let change = rate - prev;
            let keep = match direction {
                ChangeDirection::Increasing => change > 0.0,
                ChangeDirection::Decreasing => change < 0.0,
            };
            keep.then(|| RateDelta {
                symbol: symbol.clone(),
                change,
            })
        })
        .collect();

    deltas.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    match direction {
        ChangeDirection::Increasing => deltas
            .sort_by(|a, b| b.change.partial_cmp(&a.change).unwrap_or(std::cmp::Ordering::Equal)),
        ChangeDirection::Decreasing => deltas
            .sort_by(|a, b| a.change.partial_cmp(&b.change).unwrap_or(std::cmp::Ordering::Equal)),
    }

    deltas.truncate(n);
    deltas
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn rates(pairs: &[(&str, f64)]) -> RateMap {
        pairs.iter().map(|(s, r)| (s.to_string(), *r)).collect()
    }

    #[test]
    fn increasing_keeps_only_positive_deltas() {
        let prev = rates(&[("UP", 0.001), ("DOWN", 0.005), ("FLAT", 0.002)]);
        let cur = rates(&[("UP", 0.004), ("DOWN", 0.001), ("FLAT", 0.002)]);

        let out = biggest_changes(&cur, &prev, 10, ChangeDirection::Increasing);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "UP");
        assert!((out[0].change - 0.003).abs() < 1e-12);
        assert!(out.iter().all(|d| d.change > 0.0));
    }

    #[test]
    fn decreasing_keeps_only_negative_deltas() {
        let prev = rates(&[("UP", 0.001), ("DOWN", 0.005)]);
        let cur = rates(&[("UP", 0.004), ("DOWN", 0.001)]);

        let out = biggest_changes(&cur, &prev, 10, ChangeDirection::Decreasing);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "DOWN");
        assert!((out[0].change + 0.004).abs() < 1e-12);
    }

    #[test]
    fn zero_delta_excluded_from_both_directions() {
        let prev = rates(&[("FLAT", 0.002)]);
        let cur = rates(&[("FLAT", 0.002)]);

        assert!(biggest_changes(&cur, &prev, 10, ChangeDirection::Increasing).is_empty());
        assert!(biggest_changes(&cur, &prev, 10, ChangeDirection::Decreasing).is_empty());
    }

    #[test]
    fn new_listings_and_delistings_excluded() {
        let prev = rates(&[("GONE", 0.01), ("BOTH", 0.001)]);
        let cur = rates(&[("NEW", 0.05), ("BOTH", 0.002)]);

        let out = biggest_changes(&cur, &prev, 10, ChangeDirection::Increasing);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "BOTH");
    }

    #[test]
    fn increasing_sorted_descending_and_truncated() {
        let prev = rates(&[("A", 0.0), ("B", 0.0), ("C", 0.0)]);
        let cur = rates(&[("A", 0.001), ("B", 0.003), ("C", 0.002)]);

        let out = biggest_changes(&cur, &prev, 2, ChangeDirection::Increasing);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].symbol, "B");
        assert_eq!(out[1].symbol, "C");
    }

    #[test]
    fn decreasing_sorted_ascending() {
        let prev = rates(&[("A", 0.0), ("B", 0.0)]);
        let cur = rates(&[("A", -0.001), ("B", -0.004)]);

        let out = biggest_changes(&cur, &prev, 10, ChangeDirection::Decreasing);
        assert_eq!(out[0].symbol, "B");
        assert_eq!(out[1].symbol, "A");
    }

    #[test]
    fn idempotent_for_identical_inputs() {
        let prev = rates(&[("A", 0.001), ("B", 0.004)]);
        let cur = rates(&[("A", 0.003), ("B", 0.001)]);

        let first = biggest_changes(&cur, &prev, 10, ChangeDirection::Increasing);
        let second = biggest_changes(&cur, &prev, 10, ChangeDirection::Increasing);
        assert_eq!(first, second);
    }

    #[test]
    fn delta_is_current_minus_previous() {
        let prev = rates(&[("AUSDT", 0.004)]);
        let cur = rates(&[("AUSDT", 0.012)]);

        let out = biggest_changes(&cur, &prev, 10, ChangeDirection::Increasing);
        assert_eq!(out.len(), 1);
        assert!((out[0].change - 0.008).abs() < 1e-12);
    }

    #[test]
    fn empty_previous_yields_nothing() {
        let cur = rates(&[("A", 0.01)]);
        assert!(biggest_changes(&cur, &RateMap::new(), 10, ChangeDirection::Increasing).is_empty());
    }
}
