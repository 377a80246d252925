// =============================================================================
// Funding Sentinel — Main Entry Point
// =============================================================================
//
// Monitors Binance USDⓈ-M perpetual funding rates on a fixed schedule:
// snapshot -> rankings -> change detection -> deduplicated alerts ->
// sentiment score, with a Telegram command menu on the side.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod alerts;
mod binance;
mod bot;
mod changes;
mod ledger;
mod orchestrator;
mod ranking;
mod runtime_config;
mod sentiment;
mod store;
mod types;

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::alerts::{AlertHistory, JsonlAlertHistory};
use crate::binance::BinanceFuturesClient;
use crate::bot::TelegramClient;
use crate::orchestrator::CycleOrchestrator;
use crate::runtime_config::RuntimeConfig;
use crate::store::{JsonlStatsStore, StatsStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Funding Sentinel — Starting Up                   ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = RuntimeConfig::load("runtime_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    info!(
        poll_interval_minutes = config.poll_interval_minutes,
        extreme_rate = config.extreme_rate,
        violent_change = config.violent_change,
        "Monitor thresholds loaded"
    );

    // Missing Telegram credentials are fatal: the monitor is useless without
    // its notification channel.
    let telegram = TelegramClient::from_env()?;

    // ── 2. Build collaborators ───────────────────────────────────────────
    let market = Arc::new(BinanceFuturesClient::new());
    let data_dir = std::path::Path::new(&config.data_dir);
    let history: Arc<dyn AlertHistory> =
        Arc::new(JsonlAlertHistory::open(data_dir.join("funding_alerts.jsonl"))?);
    let store: Arc<dyn StatsStore> = Arc::new(JsonlStatsStore::open(data_dir)?);

    let orchestrator = Arc::new(CycleOrchestrator::new(
        config.clone(),
        market.clone(),
        Arc::new(telegram.clone()),
        history.clone(),
        store.clone(),
    ));

    // ── 3. Push the command menu ─────────────────────────────────────────
    if let Err(e) = telegram.send_menu().await {
        warn!(error = %e, "Failed to send command menu");
    }

    // ── 4. Command listener ──────────────────────────────────────────────
    let listener_orch = orchestrator.clone();
    let listener_telegram = telegram.clone();
    let listener_market = market.clone();
    let listener_history = history.clone();
    let listener_store = store.clone();
    let listener_config = config.clone();
    tokio::spawn(async move {
        bot::run_command_listener(
            listener_orch,
            listener_telegram,
            listener_market,
            listener_history,
            listener_store,
            listener_config,
        )
        .await;
    });

    // ── 5. Scheduled cycle loop ──────────────────────────────────────────
    let cycle_orch = orchestrator.clone();
    let interval_minutes = config.poll_interval_minutes;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(interval_minutes * 60));
        loop {
            // First tick fires immediately, so the first cycle runs at startup.
            interval.tick().await;
            let outcome = cycle_orch.run_cycle(Utc::now()).await;
            info!(?outcome, "scheduled cycle finished");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = config.save("runtime_config.json") {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Funding Sentinel shut down complete.");
    Ok(())
}
