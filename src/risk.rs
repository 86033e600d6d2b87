// =============================================================================
// Risk Gate — pre-trade checks, position sizing and bracket placement
// =============================================================================
//
// Checks, in order:
//   1. Open trades   — rejects once the open position count reaches the cap.
//   2. Daily loss    — rejects when equity has fallen more than
//                      `max_daily_loss` (fraction) below the day's start
//                      balance.
//   3. Free margin   — rejects when free margin is below
//                      `balance * margin_buffer`.
//
// The day's start balance is seeded lazily from the first account snapshot
// the gate sees. It is only cleared by `reset_daily`, or by the first check
// on a new UTC date when `auto_daily_rollover` is enabled.
// =============================================================================

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{AccountSnapshot, Side};

/// Smallest volume the gate ever sizes.
pub const MIN_VOLUME: f64 = 0.01;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Limits supplied at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of balance risked per trade (0.02 = 2 %).
    pub risk_per_trade: f64,
    /// Fraction of the day's start balance that may be lost.
    pub max_daily_loss: f64,
    pub max_open_trades: usize,
    /// Fraction of balance that must remain as free margin.
    pub margin_buffer: f64,
    /// Optional ceiling on sized volume. `None` means uncapped.
    pub max_volume: Option<f64>,
    pub auto_daily_rollover: bool,
    pub stop_atr_multiple: f64,
    pub target_atr_multiple: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: 0.02,
            max_daily_loss: 0.05,
            max_open_trades: 5,
            margin_buffer: 0.2,
            max_volume: None,
            auto_daily_rollover: false,
            stop_atr_multiple: 2.0,
            target_atr_multiple: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Serialisable view of the gate for the dashboard and journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub daily_start_balance: Option<f64>,
    pub daily_pnl: f64,
    /// UTC date the current daily window started on (`YYYY-MM-DD`).
    pub trading_day: String,
    /// Loss still allowed before the daily limit trips. `None` until seeded.
    pub remaining_daily_loss: Option<f64>,
    pub max_daily_loss: f64,
    pub max_open_trades: usize,
    pub risk_per_trade: f64,
}

// ---------------------------------------------------------------------------
// Risk Gate
// ---------------------------------------------------------------------------

pub struct RiskGate {
    config: RiskConfig,
    daily_start_balance: Option<f64>,
    daily_pnl: f64,
    trading_day: NaiveDate,
}

impl RiskGate {
    pub fn new(config: RiskConfig) -> Self {
        info!(
            risk_per_trade = config.risk_per_trade,
            max_daily_loss = config.max_daily_loss,
            max_open_trades = config.max_open_trades,
            margin_buffer = config.margin_buffer,
            max_volume = ?config.max_volume,
            "RiskGate initialised"
        );
        Self {
            config,
            daily_start_balance: None,
            daily_pnl: 0.0,
            trading_day: Utc::now().date_naive(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Pre-trade gate
    // -------------------------------------------------------------------------

    /// Check whether a new trade may be opened.
    ///
    /// Returns `(true, "OK")` when every check passes, otherwise `(false,
    /// reason)` naming the first check that failed.
    pub fn can_trade(&mut self, account: &AccountSnapshot, open_positions: usize) -> (bool, String) {
        self.can_trade_on(account, open_positions, Utc::now().date_naive())
    }

    /// [`Self::can_trade`] with an explicit "today", for deterministic rollover.
    pub fn can_trade_on(&mut self, account: &AccountSnapshot, open_positions: usize, today: NaiveDate) -> (bool, String) {
        // 1. Open trades
        if open_positions >= self.config.max_open_trades {
            let msg = format!("Max open trades reached ({})", self.config.max_open_trades);
            warn!("{}", msg);
            return (false, msg);
        }

        if self.config.auto_daily_rollover && today != self.trading_day {
            info!(
                old_date = %self.trading_day,
                new_date = %today,
                "date rolled — resetting daily risk state"
            );
            self.clear_daily(today);
        }

        let start = match self.daily_start_balance {
            Some(start) if start != 0.0 => start,
            _ => {
                debug!(balance = account.balance, "seeding daily start balance");
                self.daily_start_balance = Some(account.balance);
                account.balance
            }
        };

        // 2. Daily loss
        self.daily_pnl = account.equity - start;
        let max_loss = start * self.config.max_daily_loss;
        if self.daily_pnl < -max_loss {
            let msg = format!("Daily loss limit reached ({:.2})", self.daily_pnl);
            warn!(start, max_loss, "{}", msg);
            return (false, msg);
        }

        // 3. Free margin
        if account.free_margin < account.balance * self.config.margin_buffer {
            let msg = "Insufficient margin".to_string();
            warn!(
                free_margin = account.free_margin,
                required = account.balance * self.config.margin_buffer,
                "{}",
                msg
            );
            return (false, msg);
        }

        (true, "OK".to_string())
    }

    // -------------------------------------------------------------------------
    // Sizing
    // -------------------------------------------------------------------------

    /// Volume that loses `balance * risk_per_trade` if the stop is hit.
    ///
    /// Never below [`MIN_VOLUME`]; exactly [`MIN_VOLUME`] when `atr` is zero.
    pub fn size_position(&self, balance: f64, atr: f64) -> f64 {
        let risk_amount = balance * self.config.risk_per_trade;
        let stop_distance = atr * self.config.stop_atr_multiple;
        if stop_distance == 0.0 || !stop_distance.is_finite() {
            return MIN_VOLUME;
        }

        let volume = round2(risk_amount / stop_distance).max(MIN_VOLUME);
        match self.config.max_volume {
            Some(cap) => volume.min(cap.max(MIN_VOLUME)),
            None => volume,
        }
    }

    /// Stop-loss and take-profit prices for a fill at `price`.
    pub fn exit_levels(&self, side: Side, price: f64, atr: f64) -> (f64, f64) {
        let stop = atr * self.config.stop_atr_multiple;
        let target = atr * self.config.target_atr_multiple;
        (price - side.sign() * stop, price + side.sign() * target)
    }

    // -------------------------------------------------------------------------
    // Daily state
    // -------------------------------------------------------------------------

    /// Clear the start balance so the next check re-seeds it.
    pub fn reset_daily(&mut self) {
        let today = Utc::now().date_naive();
        self.clear_daily(today);
        info!(date = %today, "daily risk state reset (manual)");
    }

    fn clear_daily(&mut self, today: NaiveDate) {
        self.daily_start_balance = None;
        self.daily_pnl = 0.0;
        self.trading_day = today;
    }

    pub fn daily_start_balance(&self) -> Option<f64> {
        self.daily_start_balance
    }

    pub fn snapshot(&self) -> RiskState {
        let remaining_daily_loss = self
            .daily_start_balance
            .map(|start| (start * self.config.max_daily_loss + self.daily_pnl).max(0.0));
        RiskState {
            daily_start_balance: self.daily_start_balance,
            daily_pnl: self.daily_pnl,
            trading_day: self.trading_day.format("%Y-%m-%d").to_string(),
            remaining_daily_loss,
            max_daily_loss: self.config.max_daily_loss,
            max_open_trades: self.config.max_open_trades,
            risk_per_trade: self.config.risk_per_trade,
        }
    }
}

impl std::fmt::Debug for RiskGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskGate")
            .field("config", &self.config)
            .field("daily_start_balance", &self.daily_start_balance)
            .field("daily_pnl", &self.daily_pnl)
            .field("trading_day", &self.trading_day)
            .finish()
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
