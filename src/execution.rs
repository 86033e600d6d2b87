// =============================================================================
// Execution Engine — turns an actionable signal into a bracketed order
// =============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::broker::Broker;
use crate::risk::RiskGate;
use crate::signals::Signal;
use crate::types::OrderRequest;

// ---------------------------------------------------------------------------
// Result type
// ---------------------------------------------------------------------------

/// Outcome of an execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionResult {
    /// The broker accepted the order.
    Placed { order_id: String, order: OrderRequest },
    /// No order was sent (hold signal, missing ATR, ...).
    Skipped(String),
    /// The broker rejected the order or the call errored.
    Failed(String),
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Placed { order_id, .. } => write!(f, "Placed({order_id})"),
            Self::Skipped(reason) => write!(f, "Skipped({reason})"),
            Self::Failed(err) => write!(f, "Failed({err})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Sizes and routes orders to the broker.
pub struct ExecutionEngine {
    broker: Arc<dyn Broker>,
}

impl ExecutionEngine {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Build the order for `signal`, or `None` when it is not actionable or
    /// the ATR needed for sizing is unavailable.
    pub fn build_order(signal: &Signal, balance: f64, gate: &RiskGate) -> Option<OrderRequest> {
        let side = signal.action.side()?;
        let atr = signal.indicators.atr?;
        let price = signal.reference_price;

        let volume = gate.size_position(balance, atr);
        let (stop_loss, take_profit) = gate.exit_levels(side, price, atr);

        Some(OrderRequest {
            instrument: signal.instrument.clone(),
            side,
            volume,
            stop_loss,
            take_profit,
            tag: format!("Bot-{}%", signal.confidence),
        })
    }

    /// Size, bracket and place an order for `signal`. Never retries.
    pub async fn execute(&self, signal: &Signal, balance: f64, gate: &RiskGate) -> ExecutionResult {
        let Some(order) = Self::build_order(signal, balance, gate) else {
            let reason = if signal.is_actionable() {
                "ATR unavailable"
            } else {
                "hold signal"
            };
            warn!(instrument = %signal.instrument, reason, "execution skipped");
            return ExecutionResult::Skipped(reason.to_string());
        };

        match self.broker.place_order(order.clone()).await {
            Ok(order_id) => {
                info!(
                    order_id = %order_id,
                    instrument = %order.instrument,
                    side = %order.side,
                    volume = order.volume,
                    sl = order.stop_loss,
                    tp = order.take_profit,
                    tag = %order.tag,
                    "TRADE EXECUTED"
                );
                ExecutionResult::Placed { order_id, order }
            }
            Err(e) => {
                error!(instrument = %order.instrument, error = %e, "TRADE FAILED");
                ExecutionResult::Failed(format!("{e:#}"))
            }
        }
    }
}
