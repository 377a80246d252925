// =============================================================================
// Bot Module — Telegram command menu and long-poll listener
// =============================================================================

pub mod commands;
pub mod telegram;

pub use commands::Command;
pub use telegram::{IncomingMessage, Notifier, TelegramClient};

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::alerts::AlertHistory;
use crate::binance::MarketData;
use crate::orchestrator::{CycleOrchestrator, CycleOutcome};
use crate::ranking::{liquidity_filtered, OpenInterestMap};
use crate::runtime_config::RuntimeConfig;
use crate::store::StatsStore;

/// How many alert records the 📣 button shows.
const RECENT_ALERT_LIMIT: usize = 10;
/// Long-poll timeout for getUpdates.
const POLL_TIMEOUT_SECS: u32 = 30;
/// Pause after a failed getUpdates before retrying.
const POLL_RETRY_SECS: u64 = 5;

/// Long-poll loop answering menu button presses.
///
/// Runs forever; transport errors are logged and retried after a short
/// pause. A manual refresh enters the orchestrator through the same cycle
/// lock as the scheduler, so it can never overlap a scheduled pass.
pub async fn run_command_listener<M, N>(
    orchestrator: Arc<CycleOrchestrator<M, N>>,
    telegram: TelegramClient,
    market: Arc<M>,
    history: Arc<dyn AlertHistory>,
    store: Arc<dyn StatsStore>,
    config: RuntimeConfig,
) where
    M: MarketData,
    N: Notifier,
{
    let mut offset: i64 = 0;
    info!("command listener started");

    loop {
        let updates = match telegram.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed — retrying");
                tokio::time::sleep(std::time::Duration::from_secs(POLL_RETRY_SECS)).await;
                continue;
            }
        };

        for message in updates {
            offset = offset.max(message.update_id + 1);

            let command = Command::parse(&message.text);
            info!(chat_id = message.chat_id, ?command, "command received");

            let reply = build_reply(command, &orchestrator, &market, &history, &store, &config).await;

            if let Err(e) = telegram.send_to_chat(message.chat_id, &reply).await {
                warn!(error = %e, chat_id = message.chat_id, "failed to send command reply");
            }
        }
    }
}

async fn build_reply<M, N>(
    command: Command,
    orchestrator: &CycleOrchestrator<M, N>,
    market: &Arc<M>,
    history: &Arc<dyn AlertHistory>,
    store: &Arc<dyn StatsStore>,
    config: &RuntimeConfig,
) -> String
where
    M: MarketData,
    N: Notifier,
{
    match command {
        Command::TopRates => commands::format_top_rates(store.latest_stats().as_ref(), true),
        Command::BottomRates => commands::format_top_rates(store.latest_stats().as_ref(), false),
        Command::FastestMovers => commands::format_movers(store.latest_stats().as_ref()),
        Command::RecentAlerts => {
            commands::format_recent_alerts(&history.recent(RECENT_ALERT_LIMIT))
        }
        Command::Sentiment => commands::format_sentiment(store.latest_sentiment().as_ref()),
        Command::HotContracts => hot_contracts_reply(market.as_ref(), config).await,
        Command::LastCheck => commands::format_last_check(orchestrator.last_completed_at()),
        Command::RefreshNow => match orchestrator.run_cycle(Utc::now()).await {
            CycleOutcome::Completed { symbols, alerts_sent } => format!(
                "🔄 Refresh complete: {symbols} symbols checked, {alerts_sent} new alert(s)."
            ),
            CycleOutcome::SourceUnavailable => {
                "⚠️ Market data source unavailable — nothing updated. Try again shortly."
                    .to_string()
            }
        },
        Command::Unknown => commands::format_unknown(),
    }
}

/// Live hot-contracts board: fresh rates and volumes, the liquidity filter,
/// and (only when an OI threshold is configured) per-symbol open interest for
/// the candidates that already cleared the rate/volume gate.
async fn hot_contracts_reply<M: MarketData>(market: &M, config: &RuntimeConfig) -> String {
    let (rates, volumes) = match tokio::try_join!(market.fetch_funding_rates(), market.fetch_volumes()) {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "hot contracts fetch failed");
            return "⚠️ Could not reach the market data source.".to_string();
        }
    };

    let mut entries = liquidity_filtered(
        &rates,
        &volumes,
        None,
        config.rate_threshold,
        config.volume_threshold,
        None,
    );

    if let Some(min_oi) = config.oi_threshold {
        let mut open_interest = OpenInterestMap::new();
        for entry in &entries {
            match market.fetch_open_interest(&entry.symbol).await {
                Ok(oi) => {
                    open_interest.insert(entry.symbol.clone(), oi);
                }
                Err(e) => {
                    warn!(symbol = %entry.symbol, error = %e, "open interest fetch failed")
                }
            }
        }
        entries = liquidity_filtered(
            &rates,
            &volumes,
            Some(&open_interest),
            config.rate_threshold,
            config.volume_threshold,
            Some(min_oi),
        );
    }

    commands::format_hot_contracts(&entries, config.top_n)
}
