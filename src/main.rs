// =============================================================================
// Signal Gate — Main Entry Point
// =============================================================================
//
// Wires the candle feed, the paper broker, the scorer and the risk gate into a
// single cycle runner, and serves the dashboard API next to it. The runner
// stops on Ctrl-C or on a kill request; the runtime config is saved on the way
// out.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod broker;
mod cycle;
mod execution;
mod indicators;
mod journal;
mod market_data;
mod regime;
mod risk;
mod runtime_config;
mod signals;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::{BinanceClient, BinanceFeed};
use crate::broker::replay::{ReplayFeed, ReplayMode};
use crate::broker::{MarketFeed, PaperBroker};
use crate::cycle::{CycleSettings, TradingCycle};
use crate::journal::Journal;
use crate::risk::RiskGate;
use crate::runtime_config::{parse_symbols, FeedConfig, RuntimeConfig};
use crate::signals::SignalScorer;
use crate::types::TradingMode;

const DEFAULT_CONFIG_PATH: &str = "runtime_config.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

/// Build the candle source named by the config.
fn build_feed(config: &RuntimeConfig) -> anyhow::Result<Arc<dyn MarketFeed>> {
    match &config.feed {
        FeedConfig::Binance { base_url } => {
            let client = BinanceClient::new(base_url.clone(), config.call_timeout_secs)?;
            info!(base_url = %base_url, "using Binance kline feed");
            Ok(Arc::new(BinanceFeed::new(client)))
        }
        FeedConfig::Replay { path, stepping, warmup } => {
            let mode = if *stepping {
                ReplayMode::Stepping { warmup: *warmup }
            } else {
                ReplayMode::Fixed
            };
            let feed = ReplayFeed::load(path, mode)?;
            let available = feed.instruments();
            for symbol in &config.symbols {
                if !available.contains(symbol) {
                    warn!(symbol = %symbol, path = %path, "no replay data for configured symbol");
                }
            }
            Ok(Arc::new(feed))
        }
    }
}

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
    info!("║        Signal Gate — Starting Up                         ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("SIGNAL_GATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // A kill is per process; a restart comes back paused.
    if config.trading_mode == TradingMode::Killed {
        warn!("Config was saved in Killed mode — starting Paused");
        config.trading_mode = TradingMode::Paused;
    }

    if let Ok(syms) = std::env::var("SIGNAL_GATE_SYMBOLS") {
        let parsed = parse_symbols(&syms);
        if !parsed.is_empty() {
            config.symbols = parsed;
        }
    }

    info!(symbols = ?config.symbols, timeframe = %config.timeframe, "Configured instruments");
    info!(
        trading_mode = %config.trading_mode,
        min_confidence = config.min_confidence,
        interval_secs = config.signal_interval_secs,
        "Engine configuration"
    );

    // ── 2. Venue ─────────────────────────────────────────────────────────
    let feed = build_feed(&config).context("failed to build candle feed")?;
    let broker = Arc::new(PaperBroker::new(
        feed,
        config.paper.starting_balance,
        config.paper.leverage,
    ));
    info!(
        starting_balance = config.paper.starting_balance,
        leverage = config.paper.leverage,
        "Paper broker ready"
    );

    // ── 3. Pipeline ──────────────────────────────────────────────────────
    let scorer = SignalScorer::new(config.min_confidence, config.verbose_mode);
    let gate = RiskGate::new(config.risk.clone());
    let runner = TradingCycle::new(broker, scorer, gate, CycleSettings::from(&config));

    let journal = match Journal::open(&config.journal_dir) {
        Ok(journal) => {
            match journal.latest() {
                Ok(Some(prev)) => info!(
                    cycle = prev.cycle,
                    at = %prev.timestamp,
                    dir = %journal.dir().display(),
                    "Previous run journaled up to this cycle"
                ),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Could not read previous journal entry"),
            }
            Some(journal)
        }
        Err(e) => {
            warn!(error = %e, "Signal journal disabled");
            None
        }
    };

    // ── 4. Shared state ──────────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));

    // ── 5. API server ────────────────────────────────────────────────────
    let api_state = state.clone();
    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let bind_addr =
            std::env::var("SIGNAL_GATE_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        info!(addr = %bind_addr, "API server starting");

        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr = %bind_addr, error = %e, "Failed to bind API server address");
                return;
            }
        };
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server error");
        }
    });

    // ── 6. Cycle runner ──────────────────────────────────────────────────
    let runner_handle = tokio::spawn(runner.run(state.clone(), journal, state.subscribe_shutdown()));

    // ── 7. Ctrl-C ────────────────────────────────────────────────────────
    let signal_state = state.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Shutdown signal received — stopping gracefully");
                signal_state.request_shutdown();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 8. Graceful shutdown ─────────────────────────────────────────────
    if let Err(e) = runner_handle.await {
        error!(error = %e, "Cycle runner task failed");
    }

    if let Err(e) = state.runtime_config.read().save(&config_path) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Signal Gate shut down complete.");
    Ok(())
}
