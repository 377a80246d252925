// =============================================================================
// Command Menu — parses menu buttons and formats replies
// =============================================================================
//
// Every reply is built from the persisted stores (plus one on-demand market
// fetch for the hot-contracts board), so the menu works even between cycles
// and right after a restart. Formatting lives here as pure functions; the
// long-poll loop in `bot::run_command_listener` does the wiring.

use chrono::{DateTime, Utc};

use crate::sentiment::mood_for_score;
use crate::types::{AlertKind, AlertRecord, FundingStats, LiquidityEntry, SentimentRecord};

/// One menu button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TopRates,
    BottomRates,
    FastestMovers,
    RecentAlerts,
    Sentiment,
    HotContracts,
    LastCheck,
    RefreshNow,
    Unknown,
}

impl Command {
    /// Map raw message text to a command. Unrecognised text falls through to
    /// [`Command::Unknown`].
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "📈 Top funding rates" => Self::TopRates,
            "📉 Bottom funding rates" => Self::BottomRates,
            "⚡ Fastest movers" => Self::FastestMovers,
            "📣 Recent alerts" => Self::RecentAlerts,
            "📊 Market sentiment" => Self::Sentiment,
            "🔥 Hot contracts" => Self::HotContracts,
            "🕓 Last check time" => Self::LastCheck,
            "🔄 Refresh now" => Self::RefreshNow,
            _ => Self::Unknown,
        }
    }
}

fn fmt_pct(fraction: f64) -> String {
    format!("{:+.4}%", fraction * 100.0)
}

/// Top/bottom funding ranking from the latest cycle stats.
pub fn format_top_rates(stats: Option<&FundingStats>, highest: bool) -> String {
    let Some(stats) = stats else {
        return "No data yet — wait for the first cycle to complete.".to_string();
    };

    let (title, icon, entries) = if highest {
        ("📈 Highest funding rates", "🔥", &stats.top_highest)
    } else {
        ("📉 Lowest funding rates", "❄️", &stats.top_lowest)
    };

    let mut lines = vec![format!("{title} (top {})", entries.len())];
    for entry in entries {
        lines.push(format!("{icon} {}: {}", entry.symbol, fmt_pct(entry.rate)));
    }
    lines.join("\n")
}

/// Biggest period-over-period movers, both directions.
pub fn format_movers(stats: Option<&FundingStats>) -> String {
    let Some(stats) = stats else {
        return "No data yet — wait for the first cycle to complete.".to_string();
    };
    if stats.top_increases.is_empty() && stats.top_decreases.is_empty() {
        return "Not enough history to compare yet — need two completed cycles.".to_string();
    }

    let mut lines = vec!["⚡ Fastest funding moves since last cycle".to_string()];
    for delta in stats.top_increases.iter().chain(stats.top_decreases.iter()) {
        lines.push(format!("⚡ {}: {}", delta.symbol, fmt_pct(delta.change)));
    }
    lines.join("\n")
}

/// Recent alert records, newest first.
pub fn format_recent_alerts(records: &[AlertRecord]) -> String {
    if records.is_empty() {
        return "No recent alerts.".to_string();
    }

    let mut lines = vec![format!("📣 Recent alerts (last {})", records.len())];
    for record in records {
        let when = record.timestamp.format("%m-%d %H:%M");
        match record.kind {
            AlertKind::Extreme => {
                lines.push(format!("🔥 [{when}] {} extreme rate {}", record.symbol, fmt_pct(record.rate)))
            }
            AlertKind::Change => lines.push(format!(
                "⚡ [{when}] {} violent move {}",
                record.symbol,
                fmt_pct(record.change.unwrap_or(0.0))
            )),
        }
    }
    lines.join("\n")
}

/// Latest sentiment reading with its mood bucket.
pub fn format_sentiment(record: Option<&SentimentRecord>) -> String {
    let Some(record) = record else {
        return "No sentiment data yet.".to_string();
    };

    format!(
        "📊 Market sentiment ({})\n\nScore: {} ({})\nMarket-wide average funding rate: {}",
        record.timestamp.format("%Y-%m-%d %H:%M"),
        record.score,
        mood_for_score(record.score),
        fmt_pct(record.avg_rate)
    )
}

/// Liquidity-weighted hot-contracts board, already filtered and sorted.
pub fn format_hot_contracts(entries: &[LiquidityEntry], limit: usize) -> String {
    if entries.is_empty() {
        return "No symbol currently clears both thresholds.".to_string();
    }

    let mut lines = vec!["🔥 Hot contracts (high funding + high volume)\n".to_string()];
    for (idx, entry) in entries.iter().take(limit).enumerate() {
        lines.push(format!("{}. {}", idx + 1, entry.symbol));
        lines.push(format!("   📈 funding: {}", fmt_pct(entry.funding_rate)));
        lines.push(format!("   💰 24h volume: ${:.2}", entry.volume_24h));
    }
    lines.join("\n")
}

/// Timestamp of the last completed cycle.
pub fn format_last_check(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => format!("🕓 Last update completed at {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => "🕓 No cycle has completed yet.".to_string(),
    }
}

/// Fallback for unrecognised text.
pub fn format_unknown() -> String {
    "🤖 Unrecognised command — use the menu buttons.".to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RankedEntry, RateDelta};

    fn stats() -> FundingStats {
        FundingStats {
            timestamp: Utc::now(),
            top_highest: vec![RankedEntry { symbol: "AUSDT".into(), rate: 0.012 }],
            top_lowest: vec![RankedEntry { symbol: "BUSDT".into(), rate: -0.011 }],
            top_increases: vec![RateDelta { symbol: "AUSDT".into(), change: 0.008 }],
            top_decreases: vec![],
        }
    }

    #[test]
    fn parse_maps_every_menu_button() {
        assert_eq!(Command::parse("📈 Top funding rates"), Command::TopRates);
        assert_eq!(Command::parse("📉 Bottom funding rates"), Command::BottomRates);
        assert_eq!(Command::parse("⚡ Fastest movers"), Command::FastestMovers);
        assert_eq!(Command::parse("📣 Recent alerts"), Command::RecentAlerts);
        assert_eq!(Command::parse("📊 Market sentiment"), Command::Sentiment);
        assert_eq!(Command::parse("🔥 Hot contracts"), Command::HotContracts);
        assert_eq!(Command::parse("🕓 Last check time"), Command::LastCheck);
        assert_eq!(Command::parse("🔄 Refresh now"), Command::RefreshNow);
        assert_eq!(Command::parse("anything else"), Command::Unknown);
    }

    #[test]
    fn top_rates_reply_lists_entries() {
        let reply = format_top_rates(Some(&stats()), true);
        assert!(reply.contains("AUSDT"));
        assert!(reply.contains("+1.2000%"));

        let reply = format_top_rates(Some(&stats()), false);
        assert!(reply.contains("BUSDT"));
        assert!(reply.contains("-1.1000%"));
    }

    #[test]
    fn replies_degrade_gracefully_without_data() {
        assert!(format_top_rates(None, true).contains("No data yet"));
        assert!(format_movers(None).contains("No data yet"));
        assert!(format_sentiment(None).contains("No sentiment"));
        assert!(format_recent_alerts(&[]).contains("No recent alerts"));
        assert!(format_last_check(None).contains("No cycle"));
    }

    #[test]
    fn movers_need_two_cycles() {
        let mut s = stats();
        s.top_increases.clear();
        assert!(format_movers(Some(&s)).contains("two completed cycles"));
        assert!(format_movers(Some(&stats())).contains("AUSDT"));
    }

    #[test]
    fn recent_alerts_formats_both_kinds() {
        let now = Utc::now();
        let records = vec![
            AlertRecord::new("HOT", AlertKind::Extreme, 0.015, None, now),
            AlertRecord::new("MOVE", AlertKind::Change, 0.002, Some(0.006), now),
        ];
        let reply = format_recent_alerts(&records);
        assert!(reply.contains("HOT extreme rate"));
        assert!(reply.contains("MOVE violent move +0.6000%"));
    }

    #[test]
    fn sentiment_reply_includes_mood() {
        let record = SentimentRecord {
            timestamp: Utc::now(),
            avg_rate: 0.0005,
            std_rate: 0.001,
            score: 85.0,
        };
        let reply = format_sentiment(Some(&record));
        assert!(reply.contains("85"));
        assert!(reply.contains("extreme greed"));
    }

    #[test]
    fn hot_contracts_truncates_to_limit() {
        let entries: Vec<LiquidityEntry> = (0..15)
            .map(|i| LiquidityEntry {
                symbol: format!("S{i}USDT"),
                funding_rate: 0.01,
                volume_24h: 20_000_000.0,
                open_interest: None,
            })
            .collect();
        let reply = format_hot_contracts(&entries, 10);
        assert!(reply.contains("S9USDT"));
        assert!(!reply.contains("S10USDT"));
    }
}
