// =============================================================================
// Trend / Volatility Classifier
// =============================================================================
//
// Coarse regime labels derived from the indicator frames:
//
//   Trend      — close vs SMA-50 vs SMA-200, strict chained comparison.
//   Volatility — sample std of bar-to-bar percentage returns scaled by
//                sqrt(N); a raw dispersion figure, not annualised.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorFrame;
use crate::market_data::Candle;

/// Minimum bars before a trend label other than `Neutral` is produced.
pub const MIN_TREND_BARS: usize = 50;
/// Minimum bars before volatility is measured.
pub const MIN_VOLATILITY_BARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Uptrend,
    Downtrend,
    Neutral,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uptrend => write!(f, "uptrend"),
            Self::Downtrend => write!(f, "downtrend"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Classify the trend on the most recent bar.
///
/// `frames` must be aligned with `candles`. Ties or unavailable moving
/// averages resolve to `Neutral`.
pub fn detect_trend(candles: &[Candle], frames: &[IndicatorFrame]) -> Trend {
    if candles.len() < MIN_TREND_BARS {
        return Trend::Neutral;
    }
    let (Some(last), Some(frame)) = (candles.last(), frames.last()) else {
        return Trend::Neutral;
    };
    let (Some(sma_50), Some(sma_200)) = (frame.sma_50, frame.sma_200) else {
        return Trend::Neutral;
    };

    let close = last.close;
    if close > sma_50 && sma_50 > sma_200 {
        Trend::Uptrend
    } else if close < sma_50 && sma_50 < sma_200 {
        Trend::Downtrend
    } else {
        Trend::Neutral
    }
}

/// Dispersion of percentage returns over the whole slice.
///
/// Returns 0.0 with fewer than [`MIN_VOLATILITY_BARS`] bars. Returns whose
/// previous close is zero are skipped.
pub fn calculate_volatility(candles: &[Candle]) -> f64 {
    if candles.len() < MIN_VOLATILITY_BARS {
        return 0.0;
    }

    let returns: Vec<f64> = candles
        .windows(2)
        .filter(|w| w[0].close != 0.0)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let volatility = variance.sqrt() * (candles.len() as f64).sqrt();

    if volatility.is_finite() {
        volatility
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute_frames;

    fn closes_to_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64, c, c + 0.5, c - 0.5, c, 100.0))
            .collect()
    }

    #[test]
    fn short_history_is_neutral() {
        let candles = closes_to_candles(&(0..49).map(|i| i as f64).collect::<Vec<_>>());
        let frames = compute_frames(&candles);
        assert_eq!(detect_trend(&candles, &frames), Trend::Neutral);
    }

    #[test]
    fn rising_prices_are_uptrend() {
        let candles = closes_to_candles(&(0..100).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let frames = compute_frames(&candles);
        assert_eq!(detect_trend(&candles, &frames), Trend::Uptrend);
    }

    #[test]
    fn falling_prices_are_downtrend() {
        let candles = closes_to_candles(&(0..100).map(|i| 300.0 - i as f64).collect::<Vec<_>>());
        let frames = compute_frames(&candles);
        assert_eq!(detect_trend(&candles, &frames), Trend::Downtrend);
    }

    #[test]
    fn flat_prices_tie_to_neutral() {
        let candles = closes_to_candles(&[50.0; 120]);
        let frames = compute_frames(&candles);
        assert_eq!(detect_trend(&candles, &frames), Trend::Neutral);
    }

    #[test]
    fn volatility_requires_twenty_bars() {
        let candles = closes_to_candles(&(0..19).map(|i| 10.0 + i as f64).collect::<Vec<_>>());
        assert_eq!(calculate_volatility(&candles), 0.0);
    }

    #[test]
    fn volatility_of_constant_growth_is_zero() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let vol = calculate_volatility(&closes_to_candles(&closes));
        assert!(vol.abs() < 1e-9, "got {vol}");
    }

    #[test]
    fn volatility_known_value() {
        // Alternating +10% / -10% style closes: returns alternate between
        // +0.1 and -1/11.
        let mut closes = vec![100.0];
        for i in 0..19 {
            let prev = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { prev * 1.1 } else { prev / 1.1 });
        }
        let candles = closes_to_candles(&closes);
        let returns: Vec<f64> = closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let expected = var.sqrt() * 20.0_f64.sqrt();
        assert!((calculate_volatility(&candles) - expected).abs() < 1e-12);
        assert!(expected > 0.0);
    }
}
