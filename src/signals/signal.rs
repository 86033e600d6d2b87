// =============================================================================
// Signal — immutable per-cycle verdict for one instrument
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorFrame;
use crate::regime::Trend;
use crate::types::Side;

/// Discrete outcome of scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    /// The order side for an actionable signal, `None` for holds.
    pub fn side(self) -> Option<Side> {
        match self {
            Self::Buy => Some(Side::Buy),
            Self::Sell => Some(Side::Sell),
            Self::Hold => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Hold => write!(f, "hold"),
        }
    }
}

/// Scored verdict for one (instrument, cycle) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub instrument: String,
    /// When the signal was produced.
    pub timestamp: DateTime<Utc>,
    /// Open time of the bar the signal was computed on (Unix ms).
    pub candle_time: i64,
    pub action: Action,
    /// Winning score capped at 100 (or the larger score for holds).
    pub confidence: u32,
    /// Close of the most recent bar.
    pub reference_price: f64,
    /// Indicator values on the most recent bar.
    pub indicators: IndicatorFrame,
    pub trend: Trend,
    pub volatility: f64,
    pub buy_score: u32,
    pub sell_score: u32,
    /// Triggered rules, in evaluation order.
    pub reasons: Vec<String>,
}

impl Signal {
    pub fn is_actionable(&self) -> bool {
        self.action != Action::Hold
    }
}
