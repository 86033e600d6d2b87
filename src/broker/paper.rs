// =============================================================================
// Paper Broker — simulated account priced from a MarketFeed
// =============================================================================
//
// Ledger rules:
//   - Market orders fill at the last close of the instrument's most recent
//     candle fetch. Ordering before any fetch is an error.
//   - Every candle fetch marks that instrument's positions to market. Bars
//     newer than a position's entry bar are scanned oldest first and the
//     position closes at its stop or target on the first touch. When a bar
//     touches both, the stop wins.
//   - Realized P&L is credited to balance on close.
//
//   margin      = Σ volume · open_price / leverage
//   equity      = balance + unrealized
//   free_margin = equity − margin
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{Broker, MarketFeed};
use crate::market_data::Candle;
use crate::types::{AccountSnapshot, CloseReason, ClosedTrade, OpenPosition, OrderRequest, Side};

#[derive(Debug, Clone)]
struct PaperPosition {
    position: OpenPosition,
    /// Open time of the newest bar known when the order filled.
    entry_bar: i64,
}

#[derive(Debug, Default)]
struct Ledger {
    balance: f64,
    positions: Vec<PaperPosition>,
    /// Last close and bar time per instrument.
    last_bar: HashMap<String, (f64, i64)>,
    /// Closes not yet collected through `take_closed_trades`.
    closed: Vec<ClosedTrade>,
}

impl Ledger {
    fn unrealized(&self) -> f64 {
        self.positions.iter().map(|p| p.position.profit).sum()
    }

    fn margin(&self, leverage: f64) -> f64 {
        self.positions
            .iter()
            .map(|p| p.position.volume * p.position.open_price)
            .sum::<f64>()
            / leverage
    }
}

/// Closed trades kept while nobody collects them.
const MAX_UNCLAIMED_CLOSES: usize = 500;

pub struct PaperBroker {
    feed: Arc<dyn MarketFeed>,
    leverage: f64,
    ledger: RwLock<Ledger>,
}

impl PaperBroker {
    /// `leverage` below 1 is treated as 1.
    pub fn new(feed: Arc<dyn MarketFeed>, starting_balance: f64, leverage: f64) -> Self {
        info!(starting_balance, leverage, "PaperBroker initialised");
        Self {
            feed,
            leverage: leverage.max(1.0),
            ledger: RwLock::new(Ledger {
                balance: starting_balance,
                ..Ledger::default()
            }),
        }
    }

    #[cfg(test)]
    pub fn balance(&self) -> f64 {
        self.ledger.read().balance
    }

    /// Apply freshly fetched bars for `instrument` to the ledger.
    fn mark_to_market(&self, instrument: &str, candles: &[Candle]) {
        let Some(last) = candles.last() else {
            return;
        };
        let mut ledger = self.ledger.write();
        ledger.last_bar.insert(instrument.to_string(), (last.close, last.timestamp));

        let mut still_open = Vec::with_capacity(ledger.positions.len());
        let mut realized = 0.0;
        let positions = std::mem::take(&mut ledger.positions);

        for mut paper in positions {
            if paper.position.instrument != instrument {
                still_open.push(paper);
                continue;
            }

            let exit = candles
                .iter()
                .filter(|c| c.timestamp > paper.entry_bar)
                .find_map(|c| bracket_touch(&paper.position, c).map(|(price, reason)| (price, reason, c.timestamp)));

            match exit {
                Some((close_price, reason, closed_at)) => {
                    let p = &paper.position;
                    let pnl = (close_price - p.open_price) * p.side.sign() * p.volume;
                    realized += pnl;
                    info!(
                        id = %p.id,
                        instrument,
                        side = %p.side,
                        close_price,
                        pnl,
                        ?reason,
                        "paper position closed"
                    );
                    ledger.closed.push(ClosedTrade {
                        id: p.id.clone(),
                        instrument: p.instrument.clone(),
                        side: p.side,
                        volume: p.volume,
                        open_price: p.open_price,
                        close_price,
                        pnl,
                        reason,
                        closed_at,
                    });
                }
                None => {
                    let p = &mut paper.position;
                    p.current_price = last.close;
                    p.profit = (last.close - p.open_price) * p.side.sign() * p.volume;
                    still_open.push(paper);
                }
            }
        }

        ledger.positions = still_open;
        ledger.balance += realized;

        let overflow = ledger.closed.len().saturating_sub(MAX_UNCLAIMED_CLOSES);
        if overflow > 0 {
            ledger.closed.drain(..overflow);
            warn!(dropped = overflow, "unclaimed closed trades evicted");
        }
    }
}

/// Price and reason if `candle` reaches the position's stop or target.
fn bracket_touch(position: &OpenPosition, candle: &Candle) -> Option<(f64, CloseReason)> {
    let (stop_hit, target_hit) = match position.side {
        Side::Buy => (candle.low <= position.stop_loss, candle.high >= position.take_profit),
        Side::Sell => (candle.high >= position.stop_loss, candle.low <= position.take_profit),
    };
    if stop_hit {
        Some((position.stop_loss, CloseReason::StopLoss))
    } else if target_hit {
        Some((position.take_profit, CloseReason::TakeProfit))
    } else {
        None
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn fetch_candles(&self, instrument: &str, timeframe: &str, count: usize) -> Result<Option<Vec<Candle>>> {
        let candles = self.feed.fetch_candles(instrument, timeframe, count).await?;
        if let Some(candles) = &candles {
            self.mark_to_market(instrument, candles);
        }
        Ok(candles)
    }

    async fn fetch_account_snapshot(&self) -> Result<Option<AccountSnapshot>> {
        let ledger = self.ledger.read();
        let profit = ledger.unrealized();
        let equity = ledger.balance + profit;
        let margin = ledger.margin(self.leverage);
        Ok(Some(AccountSnapshot {
            balance: ledger.balance,
            equity,
            margin,
            free_margin: equity - margin,
            profit,
        }))
    }

    async fn fetch_open_positions(&self) -> Result<Vec<OpenPosition>> {
        Ok(self.ledger.read().positions.iter().map(|p| p.position.clone()).collect())
    }

    async fn take_closed_trades(&self) -> Result<Vec<ClosedTrade>> {
        Ok(std::mem::take(&mut self.ledger.write().closed))
    }

    async fn place_order(&self, order: OrderRequest) -> Result<String> {
        if !(order.volume.is_finite() && order.volume > 0.0) {
            bail!("invalid order volume {} for {}", order.volume, order.instrument);
        }

        let mut ledger = self.ledger.write();
        let Some(&(price, bar_time)) = ledger.last_bar.get(&order.instrument) else {
            bail!("no market price for {}", order.instrument);
        };

        let id = uuid::Uuid::new_v4().to_string();
        debug!(
            id = %id,
            instrument = %order.instrument,
            side = %order.side,
            volume = order.volume,
            price,
            tag = %order.tag,
            "paper order filled"
        );
        ledger.positions.push(PaperPosition {
            position: OpenPosition {
                id: id.clone(),
                instrument: order.instrument,
                side: order.side,
                volume: order.volume,
                open_price: price,
                current_price: price,
                profit: 0.0,
                stop_loss: order.stop_loss,
                take_profit: order.take_profit,
            },
            entry_bar: bar_time,
        });
        Ok(id)
    }
}

impl std::fmt::Debug for PaperBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.ledger.read();
        f.debug_struct("PaperBroker")
            .field("leverage", &self.leverage)
            .field("balance", &ledger.balance)
            .field("open_positions", &ledger.positions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::replay::{ReplayFeed, ReplayMode};

    fn bar(i: i64, close: f64, low: f64, high: f64) -> Candle {
        Candle::new(i * 60_000, close, high, low, close, 10.0)
    }

    fn broker(candles: Vec<Candle>) -> PaperBroker {
        let feed = ReplayFeed::new(ReplayMode::Stepping { warmup: 1 })
            .with_candles("BTCUSDT", candles)
            .unwrap();
        PaperBroker::new(Arc::new(feed), 10_000.0, 10.0)
    }

    fn order(side: Side, sl: f64, tp: f64) -> OrderRequest {
        OrderRequest {
            instrument: "BTCUSDT".to_string(),
            side,
            volume: 2.0,
            stop_loss: sl,
            take_profit: tp,
            tag: "Bot-70%".to_string(),
        }
    }

    #[tokio::test]
    async fn order_before_any_price_fails() {
        let b = broker(vec![bar(0, 100.0, 99.0, 101.0)]);
        assert!(b.place_order(order(Side::Buy, 95.0, 110.0)).await.is_err());
    }

    #[tokio::test]
    async fn fills_at_last_close_and_marks_to_market() {
        let b = broker(vec![bar(0, 100.0, 99.0, 101.0), bar(1, 103.0, 102.0, 104.0)]);
        b.fetch_candles("BTCUSDT", "5m", 100).await.unwrap();
        b.place_order(order(Side::Buy, 95.0, 110.0)).await.unwrap();

        b.fetch_candles("BTCUSDT", "5m", 100).await.unwrap();
        let positions = b.fetch_open_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].open_price, 100.0);
        assert_eq!(positions[0].current_price, 103.0);
        assert_eq!(positions[0].profit, 6.0);

        let acct = b.fetch_account_snapshot().await.unwrap().unwrap();
        assert_eq!(acct.balance, 10_000.0);
        assert_eq!(acct.equity, 10_006.0);
        assert_eq!(acct.margin, 20.0);
        assert_eq!(acct.free_margin, 9_986.0);
        assert_eq!(acct.profit, 6.0);
    }

    #[tokio::test]
    async fn long_closes_when_low_touches_stop() {
        let b = broker(vec![bar(0, 100.0, 99.0, 101.0), bar(1, 97.0, 94.0, 100.0)]);
        b.fetch_candles("BTCUSDT", "5m", 100).await.unwrap();
        b.place_order(order(Side::Buy, 95.0, 110.0)).await.unwrap();
        b.fetch_candles("BTCUSDT", "5m", 100).await.unwrap();

        assert!(b.fetch_open_positions().await.unwrap().is_empty());
        assert_eq!(b.balance(), 10_000.0 - 10.0);
        let closed = b.take_closed_trades().await.unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].reason, CloseReason::StopLoss);
        assert_eq!(closed[0].close_price, 95.0);
        assert!(b.take_closed_trades().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_closes_at_target() {
        let b = broker(vec![bar(0, 100.0, 99.0, 101.0), bar(1, 92.0, 89.0, 100.5)]);
        b.fetch_candles("BTCUSDT", "5m", 100).await.unwrap();
        b.place_order(order(Side::Sell, 105.0, 90.0)).await.unwrap();
        b.fetch_candles("BTCUSDT", "5m", 100).await.unwrap();

        assert_eq!(b.balance(), 10_000.0 + 20.0);
        assert_eq!(b.take_closed_trades().await.unwrap()[0].reason, CloseReason::TakeProfit);
    }

    #[tokio::test]
    async fn unclaimed_closes_are_capped() {
        // Every round fills a long, then the next bar's low hits its stop.
        let rounds = MAX_UNCLAIMED_CLOSES + 20;
        let bars = (0..=rounds as i64).map(|i| bar(i, 100.0, 94.0, 101.0)).collect();
        let b = broker(bars);
        b.fetch_candles("BTCUSDT", "5m", 1_000).await.unwrap();
        for _ in 0..rounds {
            b.place_order(order(Side::Buy, 95.0, 110.0)).await.unwrap();
            b.fetch_candles("BTCUSDT", "5m", 1_000).await.unwrap();
        }

        assert!(b.fetch_open_positions().await.unwrap().is_empty());
        let closed = b.take_closed_trades().await.unwrap();
        assert_eq!(closed.len(), MAX_UNCLAIMED_CLOSES);
        assert_eq!(closed.last().unwrap().closed_at, rounds as i64 * 60_000);
        assert!(b.take_closed_trades().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entry_bar_never_triggers_bracket() {
        // Fixed replay: the same bar is seen again, its wick below the stop
        // must not close the position.
        let feed = ReplayFeed::new(ReplayMode::Fixed)
            .with_candles("BTCUSDT", vec![bar(0, 100.0, 90.0, 101.0)])
            .unwrap();
        let b = PaperBroker::new(Arc::new(feed), 1_000.0, 1.0);
        b.fetch_candles("BTCUSDT", "5m", 10).await.unwrap();
        b.place_order(order(Side::Buy, 95.0, 110.0)).await.unwrap();
        b.fetch_candles("BTCUSDT", "5m", 10).await.unwrap();
        assert_eq!(b.fetch_open_positions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_non_positive_volume() {
        let b = broker(vec![bar(0, 100.0, 99.0, 101.0)]);
        b.fetch_candles("BTCUSDT", "5m", 100).await.unwrap();
        let mut o = order(Side::Buy, 95.0, 110.0);
        o.volume = 0.0;
        assert!(b.place_order(o).await.is_err());
    }
}
