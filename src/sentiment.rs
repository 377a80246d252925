// =============================================================================
// Sentiment Scorer — logistic transform of standardised average funding
// =============================================================================
//
// Step 1 — avg = mean(rates), std = population standard deviation(rates).
// Step 2 — z = avg / (std + 1e-6), the epsilon guarding division by zero.
// Step 3 — score = 100 / (1 + e^(-10 * z)), rounded to 2 decimal places.
//
// Positive average funding (longs paying shorts) pushes the score above 50
// ("greed"); negative pushes it below 50 ("fear"). The score is always in
// [0, 100] and monotone non-decreasing in avg for a fixed std.

use chrono::{DateTime, Utc};

use crate::types::SentimentRecord;

/// Division-by-zero guard added to the standard deviation.
const STD_EPSILON: f64 = 1e-6;

/// Human-readable mood bucket (lower bound inclusive, upper exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Panic,
    Bearish,
    Neutral,
    Bullish,
    Euphoric,
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Panic => write!(f, "extreme panic"),
            Self::Bearish => write!(f, "bearish caution"),
            Self::Neutral => write!(f, "neutral"),
            Self::Bullish => write!(f, "bullish optimism"),
            Self::Euphoric => write!(f, "extreme greed"),
        }
    }
}

/// Bucket a score into a mood label. `<20` panic, `<40` bearish, `<60`
/// neutral, `<80` bullish, `>=80` euphoric.
pub fn mood_for_score(score: f64) -> Mood {
    if score < 20.0 {
        Mood::Panic
    } else if score < 40.0 {
        Mood::Bearish
    } else if score < 60.0 {
        Mood::Neutral
    } else if score < 80.0 {
        Mood::Bullish
    } else {
        Mood::Euphoric
    }
}

/// Score the current rate distribution. Returns `None` for empty input —
/// no rates means no record is emitted that cycle.
pub fn score_market(rates: &[f64], at: DateTime<Utc>) -> Option<SentimentRecord> {
    if rates.is_empty() {
        return None;
    }

    let n = rates.len() as f64;
    let avg = rates.iter().sum::<f64>() / n;
    let variance = rates.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    let z = avg / (std + STD_EPSILON);
    let score = (100.0 / (1.0 + (-10.0 * z).exp()) * 100.0).round() / 100.0;

    Some(SentimentRecord {
        timestamp: at,
        avg_rate: avg,
        std_rate: std,
        score,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_emits_no_record() {
        assert!(score_market(&[], Utc::now()).is_none());
    }

    #[test]
    fn score_always_in_range() {
        let cases: Vec<Vec<f64>> = vec![
            vec![0.5, 0.5, 0.5],
            vec![-0.5, -0.5],
            vec![0.0001, -0.0002, 0.0003],
            vec![0.0],
            vec![1.0, -1.0],
        ];
        for rates in cases {
            let rec = score_market(&rates, Utc::now()).unwrap();
            assert!((0.0..=100.0).contains(&rec.score), "score {} out of range", rec.score);
        }
    }

    #[test]
    fn uniform_positive_rates_score_high() {
        // std = 0, so z = avg / epsilon is huge and the logistic saturates.
        let rec = score_market(&[0.001, 0.001, 0.001], Utc::now()).unwrap();
        assert!(rec.score > 99.0);
        assert_eq!(mood_for_score(rec.score), Mood::Euphoric);
    }

    #[test]
    fn uniform_negative_rates_score_low() {
        let rec = score_market(&[-0.001, -0.001, -0.001], Utc::now()).unwrap();
        assert!(rec.score < 1.0);
        assert_eq!(mood_for_score(rec.score), Mood::Panic);
    }

    #[test]
    fn zero_average_is_neutral_fifty() {
        let rec = score_market(&[0.002, -0.002], Utc::now()).unwrap();
        assert!((rec.score - 50.0).abs() < 1e-9);
        assert_eq!(mood_for_score(rec.score), Mood::Neutral);
    }

    #[test]
    fn monotone_in_average_for_fixed_std() {
        // Same spread, shifted mean: score must not decrease.
        let base = [-0.001, 0.001];
        let shifted = [0.0, 0.002];
        let low = score_market(&base, Utc::now()).unwrap();
        let high = score_market(&shifted, Utc::now()).unwrap();
        assert!((low.std_rate - high.std_rate).abs() < 1e-12);
        assert!(high.score >= low.score);
    }

    #[test]
    fn population_std_deviation_used() {
        // Population (divide by n), not sample (n - 1): for [0, 2] std = 1.
        let rec = score_market(&[0.0, 2.0], Utc::now()).unwrap();
        assert!((rec.std_rate - 1.0).abs() < 1e-12);
        assert!((rec.avg_rate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn score_rounded_to_two_decimals() {
        let rec = score_market(&[0.0001, 0.0003, -0.0002], Utc::now()).unwrap();
        let scaled = rec.score * 100.0;
        assert!((scaled - scaled.round()).abs() < 1e-9);
    }

    #[test]
    fn mood_bucket_boundaries() {
        assert_eq!(mood_for_score(0.0), Mood::Panic);
        assert_eq!(mood_for_score(19.99), Mood::Panic);
        assert_eq!(mood_for_score(20.0), Mood::Bearish);
        assert_eq!(mood_for_score(39.99), Mood::Bearish);
        assert_eq!(mood_for_score(40.0), Mood::Neutral);
        assert_eq!(mood_for_score(59.99), Mood::Neutral);
        assert_eq!(mood_for_score(60.0), Mood::Bullish);
        assert_eq!(mood_for_score(79.99), Mood::Bullish);
        assert_eq!(mood_for_score(80.0), Mood::Euphoric);
        assert_eq!(mood_for_score(100.0), Mood::Euphoric);
    }
}
