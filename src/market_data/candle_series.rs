use std::collections::VecDeque;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLC + tick-volume bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, Unix milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, tick_volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            tick_volume,
        }
    }
}

// ---------------------------------------------------------------------------
// CandleSeries -- capped, strictly time-ordered ring per instrument
// ---------------------------------------------------------------------------

/// Ordered candle history for one instrument, capped to `lookback` bars.
///
/// Appends must carry a timestamp strictly greater than the newest stored
/// bar; once the cap is reached the oldest bar is dropped.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    instrument: String,
    candles: VecDeque<Candle>,
    lookback: usize,
}

impl CandleSeries {
    /// Create an empty series that retains at most `lookback` candles.
    pub fn new(instrument: impl Into<String>, lookback: usize) -> Self {
        Self {
            instrument: instrument.into(),
            candles: VecDeque::with_capacity(lookback.max(1)),
            lookback: lookback.max(1),
        }
    }

    /// Build a series from a fetched batch (oldest first).
    ///
    /// Fails if the batch is not strictly time-ordered. When the batch is
    /// longer than `lookback` only the newest `lookback` bars are kept.
    pub fn from_candles(
        instrument: impl Into<String>,
        lookback: usize,
        candles: impl IntoIterator<Item = Candle>,
    ) -> Result<Self> {
        let mut series = Self::new(instrument, lookback);
        for candle in candles {
            series.push(candle)?;
        }
        Ok(series)
    }

    /// Append a closed candle, dropping the oldest one past the cap.
    pub fn push(&mut self, candle: Candle) -> Result<()> {
        if let Some(last) = self.candles.back() {
            if candle.timestamp <= last.timestamp {
                bail!(
                    "{}: candle at {} does not follow last candle at {}",
                    self.instrument,
                    candle.timestamp,
                    last.timestamp
                );
            }
        }
        self.candles.push_back(candle);
        while self.candles.len() > self.lookback {
            self.candles.pop_front();
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Contiguous oldest-first view of the stored candles.
    pub fn as_slice(&mut self) -> &[Candle] {
        self.candles.make_contiguous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, close: f64) -> Candle {
        Candle::new(ts, close, close + 1.0, close - 1.0, close, 10.0)
    }

    #[test]
    fn push_keeps_order_and_cap() {
        let mut series = CandleSeries::new("EURUSD", 3);
        for i in 0..5 {
            series.push(bar(i * 60_000, 100.0 + i as f64)).unwrap();
        }
        assert_eq!(series.len(), 3);
        let closes: Vec<f64> = series.as_slice().iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![102.0, 103.0, 104.0]);
        assert_eq!(series.as_slice()[2].timestamp, 4 * 60_000);
    }

    #[test]
    fn out_of_order_candle_rejected() {
        let mut series = CandleSeries::new("EURUSD", 10);
        series.push(bar(2_000, 1.0)).unwrap();
        assert!(series.push(bar(1_000, 2.0)).is_err());
        assert!(series.push(bar(2_000, 2.0)).is_err());
        assert_eq!(series.len(), 1);
        assert_eq!(series.as_slice()[0].close, 1.0);
    }

    #[test]
    fn from_candles_trims_to_lookback() {
        let batch: Vec<Candle> = (0..150).map(|i| bar(i, i as f64)).collect();
        let mut series = CandleSeries::from_candles("BTCUSD", 100, batch).unwrap();
        assert_eq!(series.len(), 100);
        assert_eq!(series.as_slice()[0].close, 50.0);
    }

    #[test]
    fn from_candles_rejects_unordered_batch() {
        let batch = vec![bar(5, 1.0), bar(3, 2.0)];
        assert!(CandleSeries::from_candles("BTCUSD", 100, batch).is_err());
    }

    #[test]
    fn zero_lookback_is_clamped() {
        let mut series = CandleSeries::new("X", 0);
        series.push(bar(1, 1.0)).unwrap();
        series.push(bar(2, 2.0)).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.as_slice()[0].timestamp, 2);
    }
}
