// =============================================================================
// Replay Feed — deterministic candles from memory or a JSON file
// =============================================================================
//
// Two modes:
//   Fixed    — every fetch returns the newest `count` bars of the dataset.
//   Stepping — the visible history starts at `warmup` bars and grows by one
//              bar per fetch, so consecutive cycles see the market move.
//
// File format: `{ "<instrument>": [ {timestamp, open, high, low, close,
// tick_volume}, ... ], ... }`, oldest bar first.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::MarketFeed;
use crate::market_data::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    Fixed,
    Stepping { warmup: usize },
}

pub struct ReplayFeed {
    data: HashMap<String, Vec<Candle>>,
    mode: ReplayMode,
    /// Visible bar count per instrument (stepping mode only).
    cursors: RwLock<HashMap<String, usize>>,
}

impl ReplayFeed {
    pub fn new(mode: ReplayMode) -> Self {
        Self {
            data: HashMap::new(),
            mode,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Register `candles` (oldest first) for `instrument`.
    ///
    /// Fails if the bars are not strictly time-ordered.
    pub fn with_candles(mut self, instrument: impl Into<String>, candles: Vec<Candle>) -> Result<Self> {
        let instrument = instrument.into();
        if let Some(pair) = candles.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            bail!(
                "replay data for {} is not time-ordered at {} -> {}",
                instrument,
                pair[0].timestamp,
                pair[1].timestamp
            );
        }
        self.data.insert(instrument, candles);
        Ok(self)
    }

    /// Load every instrument from a JSON file.
    pub fn load(path: impl AsRef<Path>, mode: ReplayMode) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay file {}", path.display()))?;
        let data: HashMap<String, Vec<Candle>> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse replay file {}", path.display()))?;

        let mut feed = Self::new(mode);
        for (instrument, candles) in data {
            feed = feed.with_candles(instrument, candles)?;
        }
        info!(
            path = %path.display(),
            instruments = feed.data.len(),
            ?mode,
            "replay feed loaded"
        );
        Ok(feed)
    }

    pub fn instruments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of bars currently visible for `instrument`.
    fn visible(&self, instrument: &str, total: usize) -> usize {
        match self.mode {
            ReplayMode::Fixed => total,
            ReplayMode::Stepping { warmup } => {
                let mut cursors = self.cursors.write();
                let cursor = cursors.entry(instrument.to_string()).or_insert(warmup.min(total));
                let visible = *cursor;
                *cursor = (*cursor + 1).min(total);
                visible
            }
        }
    }
}

#[async_trait]
impl MarketFeed for ReplayFeed {
    async fn fetch_candles(&self, instrument: &str, _timeframe: &str, count: usize) -> Result<Option<Vec<Candle>>> {
        let Some(candles) = self.data.get(instrument) else {
            debug!(instrument, "no replay data for instrument");
            return Ok(None);
        };

        let visible = self.visible(instrument, candles.len());
        if visible == 0 {
            return Ok(None);
        }
        let start = visible.saturating_sub(count);
        Ok(Some(candles[start..visible].to_vec()))
    }
}
