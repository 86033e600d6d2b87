// =============================================================================
// Shared types used across the Signal Gate engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Direction of an order or an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// `+1.0` for longs, `-1.0` for shorts. Multiply a price move by this to
    /// get the move in the position's favour.
    pub fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Whether the engine places orders, only scores, or has been stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    /// Signals are scored and actionable ones are sent to the broker.
    Live,
    /// Signals are scored and journaled, but no order is placed.
    Paused,
    /// The cycle loop exits before the next cycle.
    Killed,
}

impl Default for TradingMode {
    fn default() -> Self {
        Self::Paused
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "Live"),
            Self::Paused => write!(f, "Paused"),
            Self::Killed => write!(f, "Killed"),
        }
    }
}

/// Account figures as reported by the broker at the start of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub margin: f64,
    pub free_margin: f64,
    /// Floating profit across all open positions.
    pub profit: f64,
}

/// A position currently held at the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub id: String,
    pub instrument: String,
    pub side: Side,
    pub volume: f64,
    pub open_price: f64,
    pub current_price: f64,
    pub profit: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// A market order with an attached stop-loss / take-profit bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrument: String,
    pub side: Side,
    pub volume: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Free-form order comment, e.g. `Bot-75%`.
    pub tag: String,
}

/// Why a position was closed by its bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
}

/// A position the venue closed on a stop-loss or take-profit touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: String,
    pub instrument: String,
    pub side: Side,
    pub volume: f64,
    pub open_price: f64,
    pub close_price: f64,
    pub pnl: f64,
    pub reason: CloseReason,
    /// Open time of the bar that triggered the close (Unix ms).
    pub closed_at: i64,
}
