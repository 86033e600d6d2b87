// =============================================================================
// Trading Cycle — one serial pass over every configured instrument
// =============================================================================
//
// A cycle is:
//   account snapshot → open positions → risk gate
//     → per instrument: fetch candles → score → (maybe) execute
//   → report (journal + dashboard)
//
// Every broker call is bounded by the configured timeout; a timeout counts as
// absent data. One instrument failing never aborts the others. Signals are
// scored and reported even when the gate rejects or trading is paused, only
// order placement is withheld.
// =============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::app_state::AppState;
use crate::broker::Broker;
use crate::execution::{ExecutionEngine, ExecutionResult};
use crate::journal::Journal;
use crate::market_data::CandleSeries;
use crate::risk::RiskGate;
use crate::runtime_config::RuntimeConfig;
use crate::signals::{Action, Signal, SignalScorer, MIN_SIGNAL_BARS};
use crate::types::{AccountSnapshot, ClosedTrade, OpenPosition, TradingMode};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// What happened to one instrument during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum InstrumentOutcome {
    /// Scored, no order placed.
    Signal { action: Action, confidence: u32 },
    /// Scored and an order was accepted by the broker.
    Executed { action: Action, confidence: u32, order_id: String },
    /// Not scored (no data, timeout, short or unordered history).
    Skipped(String),
    /// A broker call errored.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub instrument: String,
    pub outcome: InstrumentOutcome,
}

/// Counters accumulated over the lifetime of the runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Non-hold signals produced.
    pub signals_generated: u64,
    /// Orders accepted by the broker.
    pub trades_executed: u64,
}

/// Everything one cycle observed and did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub trading_mode: TradingMode,
    pub account: Option<AccountSnapshot>,
    pub positions: Vec<OpenPosition>,
    /// Every signal scored this cycle, holds included.
    pub signals: Vec<Signal>,
    pub outcomes: Vec<InstrumentReport>,
    pub stats: CycleStats,
    pub trading_allowed: bool,
    pub gate_reason: String,
    /// Positions the broker closed since the previous cycle.
    #[serde(default)]
    pub closed_trades: Vec<ClosedTrade>,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub symbols: Vec<String>,
    pub timeframe: String,
    pub lookback: usize,
    pub call_timeout: Duration,
    pub interval: Duration,
}

impl From<&RuntimeConfig> for CycleSettings {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            symbols: config.symbols.clone(),
            timeframe: config.timeframe.clone(),
            lookback: config.lookback_periods,
            call_timeout: Duration::from_secs(config.call_timeout_secs.max(1)),
            interval: Duration::from_secs(config.signal_interval_secs.max(1)),
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Owns the risk gate and drives the pipeline, one cycle at a time.
pub struct TradingCycle {
    broker: Arc<dyn Broker>,
    scorer: SignalScorer,
    gate: RiskGate,
    execution: ExecutionEngine,
    settings: CycleSettings,
    cycles: u64,
    stats: CycleStats,
}

impl TradingCycle {
    pub fn new(broker: Arc<dyn Broker>, scorer: SignalScorer, gate: RiskGate, settings: CycleSettings) -> Self {
        Self {
            execution: ExecutionEngine::new(broker.clone()),
            broker,
            scorer,
            gate,
            settings,
            cycles: 0,
            stats: CycleStats::default(),
        }
    }

    pub fn gate(&self) -> &RiskGate {
        &self.gate
    }

    /// Await `fut` for at most the call timeout. `Ok(None)` on timeout.
    async fn bounded<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<Option<T>> {
        match tokio::time::timeout(self.settings.call_timeout, fut).await {
            Ok(result) => result.map(Some),
            Err(_) => {
                warn!(call = what, timeout_secs = self.settings.call_timeout.as_secs(), "broker call timed out");
                Ok(None)
            }
        }
    }

    /// Run a single cycle. `mode` decides whether actionable signals reach the
    /// broker.
    pub async fn run_once(&mut self, mode: TradingMode) -> CycleReport {
        self.cycles += 1;
        let cycle = self.cycles;
        info!(cycle, %mode, "==================== CYCLE #{} ====================", cycle);

        let account = match self.bounded("fetch_account_snapshot", self.broker.fetch_account_snapshot()).await {
            Ok(Some(Some(account))) => Some(account),
            Ok(_) => {
                error!(cycle, "failed to get account info");
                None
            }
            Err(e) => {
                error!(cycle, error = %e, "failed to get account info");
                None
            }
        };

        let Some(account) = account else {
            return self.report(cycle, mode, None, Vec::new(), Vec::new(), Vec::new(), false, "Account unavailable".to_string());
        };

        let positions = match self.bounded("fetch_open_positions", self.broker.fetch_open_positions()).await {
            Ok(Some(positions)) => Some(positions),
            Ok(None) => None,
            Err(e) => {
                error!(cycle, error = %e, "failed to get open positions");
                None
            }
        };

        let (trading_allowed, gate_reason) = match &positions {
            Some(positions) => self.gate.can_trade(&account, positions.len()),
            None => (false, "Open positions unavailable".to_string()),
        };
        let positions = positions.unwrap_or_default();

        info!(
            balance = %format!("{:.2}", account.balance),
            equity = %format!("{:.2}", account.equity),
            profit = %format!("{:.2}", account.profit),
            open = positions.len(),
            "account"
        );
        if !trading_allowed {
            warn!(reason = %gate_reason, "Trading disabled");
        }

        let symbols = self.settings.symbols.clone();
        let mut open_count = positions.len();
        let mut signals = Vec::with_capacity(symbols.len());
        let mut outcomes = Vec::with_capacity(symbols.len());

        for instrument in &symbols {
            let may_execute = mode == TradingMode::Live && trading_allowed;
            let (signal, outcome) = self.process_instrument(instrument, &account, may_execute, &mut open_count).await;
            if let Some(signal) = signal {
                signals.push(signal);
            }
            outcomes.push(InstrumentReport {
                instrument: instrument.clone(),
                outcome,
            });
        }

        info!(
            cycle,
            signals_generated = self.stats.signals_generated,
            trades_executed = self.stats.trades_executed,
            "Cycle complete"
        );

        let closed_trades = match self.bounded("take_closed_trades", self.broker.take_closed_trades()).await {
            Ok(Some(trades)) => trades,
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(cycle, error = %e, "failed to collect closed trades");
                Vec::new()
            }
        };
        for trade in &closed_trades {
            info!(
                instrument = %trade.instrument,
                side = %trade.side,
                pnl = trade.pnl,
                reason = ?trade.reason,
                "TRADE CLOSED"
            );
        }

        let mut report = self.report(cycle, mode, Some(account), positions, signals, outcomes, trading_allowed, gate_reason);
        report.closed_trades = closed_trades;
        report
    }

    async fn process_instrument(
        &mut self,
        instrument: &str,
        account: &AccountSnapshot,
        may_execute: bool,
        open_count: &mut usize,
    ) -> (Option<Signal>, InstrumentOutcome) {
        let fetch = self
            .broker
            .fetch_candles(instrument, &self.settings.timeframe, self.settings.lookback);
        let candles = match self.bounded("fetch_candles", fetch).await {
            Ok(Some(Some(candles))) => candles,
            Ok(Some(None)) => {
                warn!(instrument, "no market data");
                return (None, InstrumentOutcome::Skipped("no market data".to_string()));
            }
            Ok(None) => {
                return (None, InstrumentOutcome::Skipped("candle fetch timed out".to_string()));
            }
            Err(e) => {
                error!(instrument, error = %e, "error fetching candles");
                return (None, InstrumentOutcome::Failed(format!("{e:#}")));
            }
        };

        let mut series = match CandleSeries::from_candles(instrument, self.settings.lookback, candles) {
            Ok(series) => series,
            Err(e) => {
                warn!(instrument, error = %e, "rejecting candle batch");
                return (None, InstrumentOutcome::Skipped(format!("{e:#}")));
            }
        };

        let bars = series.len();
        let Some(signal) = self.scorer.generate_signal(instrument, series.as_slice()) else {
            debug!(instrument, bars, "not enough history");
            return (None, InstrumentOutcome::Skipped(format!("insufficient history ({bars} of {MIN_SIGNAL_BARS} bars)")));
        };

        let outcome = InstrumentOutcome::Signal {
            action: signal.action,
            confidence: signal.confidence,
        };
        if !signal.is_actionable() {
            return (Some(signal), outcome);
        }

        self.stats.signals_generated += 1;
        info!(
            instrument,
            action = %signal.action,
            price = signal.reference_price,
            confidence = signal.confidence,
            buy_score = signal.buy_score,
            sell_score = signal.sell_score,
            reasons = %signal.reasons.join(", "),
            "SIGNAL GENERATED"
        );

        if !may_execute {
            return (Some(signal), outcome);
        }
        if *open_count >= self.gate.config().max_open_trades {
            warn!(instrument, open = *open_count, "open trade cap reached within cycle");
            return (Some(signal), outcome);
        }

        let outcome = match self.execution.execute(&signal, account.balance, &self.gate).await {
            ExecutionResult::Placed { order_id, .. } => {
                self.stats.trades_executed += 1;
                *open_count += 1;
                InstrumentOutcome::Executed {
                    action: signal.action,
                    confidence: signal.confidence,
                    order_id,
                }
            }
            ExecutionResult::Skipped(_) => outcome,
            ExecutionResult::Failed(e) => InstrumentOutcome::Failed(e),
        };
        (Some(signal), outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        cycle: u64,
        trading_mode: TradingMode,
        account: Option<AccountSnapshot>,
        positions: Vec<OpenPosition>,
        signals: Vec<Signal>,
        outcomes: Vec<InstrumentReport>,
        trading_allowed: bool,
        gate_reason: String,
    ) -> CycleReport {
        CycleReport {
            cycle,
            timestamp: Utc::now(),
            trading_mode,
            account,
            positions,
            signals,
            outcomes,
            stats: self.stats,
            trading_allowed,
            gate_reason,
            closed_trades: Vec::new(),
        }
    }

    /// Run cycles until shutdown is signalled or trading is killed.
    ///
    /// Shutdown and control requests are only observed between cycles.
    pub async fn run(mut self, state: Arc<AppState>, journal: Option<Journal>, mut shutdown: watch::Receiver<bool>) {
        info!(
            symbols = ?self.settings.symbols,
            interval_secs = self.settings.interval.as_secs(),
            "trading cycle loop starting"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            let mode = state.trading_mode();
            if mode == TradingMode::Killed {
                warn!("trading killed — cycle loop exiting");
                break;
            }
            if state.take_daily_reset_request() {
                self.gate.reset_daily();
            }

            let report = self.run_once(mode).await;

            if let Some(journal) = &journal {
                if let Err(e) = journal.record(&report) {
                    error!(error = %e, "failed to journal cycle");
                    state.push_error(format!("journal: {e:#}"));
                }
            }
            for entry in &report.outcomes {
                if let InstrumentOutcome::Failed(e) = &entry.outcome {
                    state.push_error(format!("{}: {}", entry.instrument, e));
                }
            }
            state.publish_cycle(report, self.gate.snapshot());

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!(cycles = self.cycles, "trading cycle loop stopped");
    }
}
