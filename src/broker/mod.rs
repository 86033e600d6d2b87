// =============================================================================
// Broker Module
// =============================================================================
//
// Capability interfaces between the cycle runner and the outside world:
// - `Broker`     — account, positions, candles, order placement and closes
// - `MarketFeed` — candle source a simulated broker prices itself from
//
// Implementations:
// - `PaperBroker` — in-process simulated account over any `MarketFeed`
// - `ReplayFeed`  — candles served from memory or a JSON file
// - `BinanceFeed` — public klines (see `crate::binance`)

pub mod paper;
pub mod replay;

use anyhow::Result;
use async_trait::async_trait;

use crate::market_data::Candle;
use crate::types::{AccountSnapshot, ClosedTrade, OpenPosition, OrderRequest};

pub use paper::PaperBroker;
pub use replay::ReplayFeed;

/// Everything the trading cycle needs from a venue.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Latest `count` candles for `instrument`, oldest first.
    ///
    /// `Ok(None)` means the venue has no data for the instrument right now.
    async fn fetch_candles(&self, instrument: &str, timeframe: &str, count: usize) -> Result<Option<Vec<Candle>>>;

    /// `Ok(None)` when the account is currently unavailable.
    async fn fetch_account_snapshot(&self) -> Result<Option<AccountSnapshot>>;

    async fn fetch_open_positions(&self) -> Result<Vec<OpenPosition>>;

    /// Submit a market order with its bracket. Returns the venue order id.
    async fn place_order(&self, order: OrderRequest) -> Result<String>;

    /// Positions closed on their bracket since the last call, oldest first.
    async fn take_closed_trades(&self) -> Result<Vec<ClosedTrade>> {
        Ok(Vec::new())
    }
}

/// A source of candles with no account behind it.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn fetch_candles(&self, instrument: &str, timeframe: &str, count: usize) -> Result<Option<Vec<Candle>>>;
}
