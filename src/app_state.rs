// =============================================================================
// Central Application State — shared between the cycle runner and the API
// =============================================================================
//
// The cycle runner owns every piece of trading state (broker, risk gate,
// counters). What lives here is only what the dashboard needs to read and the
// control requests it sends back:
//
//   - The most recent `CycleReport` and risk snapshot, published once per
//     cycle.
//   - Trading mode (inside the runtime config) and a pending daily-reset flag,
//     both consumed by the runner between cycles.
//   - A shutdown `watch` channel that Ctrl-C and the kill endpoint share.
//
// Thread safety:
//   - Atomics for the version counter and the reset flag.
//   - parking_lot::RwLock for published snapshots and the config.
// =============================================================================

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;

use crate::cycle::{CycleReport, CycleStats};
use crate::risk::RiskState;
use crate::runtime_config::RuntimeConfig;
use crate::signals::Signal;
use crate::types::{AccountSnapshot, ClosedTrade, OpenPosition, TradingMode};

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

pub struct AppState {
    /// Incremented on every published change.
    pub state_version: AtomicU64,

    pub runtime_config: RwLock<RuntimeConfig>,

    latest_report: RwLock<Option<CycleReport>>,
    risk_state: RwLock<Option<RiskState>>,
    recent_errors: RwLock<Vec<ErrorRecord>>,

    pending_daily_reset: AtomicBool,
    shutdown: watch::Sender<bool>,

    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: RuntimeConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: RwLock::new(config),
            latest_report: RwLock::new(None),
            risk_state: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            pending_daily_reset: AtomicBool::new(false),
            shutdown,
            started_at: Utc::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Control ─────────────────────────────────────────────────────────

    pub fn trading_mode(&self) -> TradingMode {
        self.runtime_config.read().trading_mode
    }

    pub fn set_trading_mode(&self, mode: TradingMode) {
        self.runtime_config.write().trading_mode = mode;
        self.increment_version();
    }

    /// Ask the runner to reset the risk gate's daily state before the next
    /// cycle.
    pub fn request_daily_reset(&self) {
        self.pending_daily_reset.store(true, Ordering::SeqCst);
    }

    /// Consume a pending reset request.
    pub fn take_daily_reset_request(&self) -> bool {
        self.pending_daily_reset.swap(false, Ordering::SeqCst)
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    // ── Publishing ──────────────────────────────────────────────────────

    pub fn publish_cycle(&self, report: CycleReport, risk: RiskState) {
        *self.latest_report.write() = Some(report);
        *self.risk_state.write() = Some(risk);
        self.increment_version();
    }

    pub fn latest_report(&self) -> Option<CycleReport> {
        self.latest_report.read().clone()
    }

    pub fn latest_signals(&self) -> Vec<Signal> {
        self.latest_report
            .read()
            .as_ref()
            .map(|r| r.signals.clone())
            .unwrap_or_default()
    }

    pub fn risk_state(&self) -> Option<RiskState> {
        self.risk_state.read().clone()
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message, evicting the oldest past
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, message: String) {
        let record = ErrorRecord {
            message,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Payload for `GET /api/v1/state`.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let now = Utc::now();
        let config = self.runtime_config.read();
        let report = self.latest_report.read();

        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: now.timestamp_millis(),
            uptime_secs: (now - self.started_at).num_seconds().max(0) as u64,
            trading_mode: config.trading_mode,
            symbols: config.symbols.clone(),
            timeframe: config.timeframe.clone(),
            min_confidence: config.min_confidence,
            cycle: report.as_ref().map(|r| r.cycle).unwrap_or(0),
            last_cycle_at: report.as_ref().map(|r| r.timestamp),
            account: report.as_ref().and_then(|r| r.account),
            positions: report.as_ref().map(|r| r.positions.clone()).unwrap_or_default(),
            closed_trades: report.as_ref().map(|r| r.closed_trades.clone()).unwrap_or_default(),
            stats: report.as_ref().map(|r| r.stats).unwrap_or_default(),
            trading_allowed: report.as_ref().map(|r| r.trading_allowed).unwrap_or(false),
            gate_reason: report.as_ref().map(|r| r.gate_reason.clone()),
            risk: self.risk_state.read().clone(),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

/// Dashboard view of the engine.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub trading_mode: TradingMode,
    pub symbols: Vec<String>,
    pub timeframe: String,
    pub min_confidence: u32,
    /// Number of the last completed cycle, 0 before the first one.
    pub cycle: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub account: Option<AccountSnapshot>,
    pub positions: Vec<OpenPosition>,
    /// Closes reported by the last cycle.
    pub closed_trades: Vec<ClosedTrade>,
    pub stats: CycleStats,
    pub trading_allowed: bool,
    pub gate_reason: Option<String>,
    pub risk: Option<RiskState>,
    pub recent_errors: Vec<ErrorRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_reset_request_is_consumed_once() {
        let state = AppState::new(RuntimeConfig::default());
        assert!(!state.take_daily_reset_request());
        state.request_daily_reset();
        assert!(state.take_daily_reset_request());
        assert!(!state.take_daily_reset_request());
    }

    #[test]
    fn trading_mode_changes_bump_version() {
        let state = AppState::new(RuntimeConfig::default());
        let before = state.current_state_version();
        state.set_trading_mode(TradingMode::Paused);
        assert_eq!(state.trading_mode(), TradingMode::Paused);
        assert!(state.current_state_version() > before);
    }

    #[test]
    fn error_log_is_capped() {
        let state = AppState::new(RuntimeConfig::default());
        for i in 0..(MAX_RECENT_ERRORS + 5) {
            state.push_error(format!("e{i}"));
        }
        let snap = state.build_snapshot();
        assert_eq!(snap.recent_errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(snap.recent_errors[0].message, "e5");
    }

    #[test]
    fn snapshot_before_first_cycle() {
        let state = AppState::new(RuntimeConfig::default());
        let snap = state.build_snapshot();
        assert_eq!(snap.cycle, 0);
        assert!(snap.account.is_none());
        assert!(!snap.trading_allowed);
        assert!(state.latest_signals().is_empty());
    }

    #[tokio::test]
    async fn shutdown_reaches_subscribers() {
        let state = AppState::new(RuntimeConfig::default());
        let mut rx = state.subscribe_shutdown();
        assert!(!*rx.borrow());
        state.request_shutdown();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
