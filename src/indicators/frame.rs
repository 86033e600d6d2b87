// =============================================================================
// Indicator Frame — every derived value for one bar
// =============================================================================
//
// `compute_frames` derives the full indicator set for each bar of a candle
// slice in one pass per indicator. Frames are rebuilt from scratch every cycle;
// only the last two are consumed by the scorer.
//
// Windows:
//   EMA 12 / 26, SMA 50 / 200, RSI 14, MACD signal 9, Bollinger 20 ± 2σ,
//   ATR 14, volume SMA 20, Stochastic %K 14 / %D 3.
//
// `sma_200` degrades to the mean of the whole slice when fewer than 200 bars
// exist, in which case it is only defined on the final bar.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::atr::calculate_atr;
use super::bollinger::calculate_bollinger;
use super::ema::calculate_ema;
use super::macd::macd_from_emas;
use super::rolling::rolling_mean;
use super::rsi::calculate_rsi;
use super::stochastic::calculate_stochastic;
use crate::market_data::Candle;

pub const EMA_FAST_SPAN: usize = 12;
pub const EMA_SLOW_SPAN: usize = 26;
pub const MACD_SIGNAL_SPAN: usize = 9;
pub const SMA_MID_PERIOD: usize = 50;
pub const SMA_LONG_PERIOD: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const BB_PERIOD: usize = 20;
pub const BB_NUM_STD: f64 = 2.0;
pub const ATR_PERIOD: usize = 14;
pub const VOLUME_SMA_PERIOD: usize = 20;
pub const STOCH_K_PERIOD: usize = 14;
pub const STOCH_D_PERIOD: usize = 3;

/// Indicator values for one bar. `None` means not yet available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorFrame {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub atr: Option<f64>,
    pub volume_sma: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
}

/// Compute one frame per candle, oldest first.
pub fn compute_frames(candles: &[Candle]) -> Vec<IndicatorFrame> {
    let n = candles.len();
    if n == 0 {
        return Vec::new();
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.tick_volume).collect();

    let ema_fast = calculate_ema(&closes, EMA_FAST_SPAN);
    let ema_slow = calculate_ema(&closes, EMA_SLOW_SPAN);
    let macd = macd_from_emas(&ema_fast, &ema_slow, MACD_SIGNAL_SPAN);
    let sma_50 = rolling_mean(&closes, SMA_MID_PERIOD);
    let sma_200 = rolling_mean(&closes, SMA_LONG_PERIOD.min(n));
    let rsi = calculate_rsi(&closes, RSI_PERIOD);
    let bb = calculate_bollinger(&closes, BB_PERIOD, BB_NUM_STD);
    let atr = calculate_atr(candles, ATR_PERIOD);
    let volume_sma = rolling_mean(&volumes, VOLUME_SMA_PERIOD);
    let stoch = calculate_stochastic(candles, STOCH_K_PERIOD, STOCH_D_PERIOD);

    (0..n)
        .map(|i| {
            let volume_ratio = volume_sma[i]
                .filter(|sma| *sma != 0.0)
                .map(|sma| volumes[i] / sma);
            IndicatorFrame {
                ema_fast: Some(ema_fast[i]),
                ema_slow: Some(ema_slow[i]),
                sma_50: sma_50[i],
                sma_200: sma_200[i],
                rsi: rsi[i],
                macd: Some(macd.macd[i]),
                macd_signal: Some(macd.signal[i]),
                macd_hist: Some(macd.hist[i]),
                bb_middle: bb.middle[i],
                bb_upper: bb.upper[i],
                bb_lower: bb.lower[i],
                atr: atr[i],
                volume_sma: volume_sma[i],
                volume_ratio,
                stoch_k: stoch.k[i],
                stoch_d: stoch.d[i],
            }
        })
        .collect()
}
