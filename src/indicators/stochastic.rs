// =============================================================================
// Stochastic Oscillator
// =============================================================================
//
//   %K = 100 * (close - lowest_low_n) / (highest_high_n - lowest_low_n)
//   %D = SMA(%K, d_period)
//
// A flat window (zero range) has no defined position; %K is pinned to the
// midpoint 50 in that case.
// =============================================================================

use super::rolling::{rolling_max, rolling_mean_opt, rolling_min};
use crate::market_data::Candle;

/// %K used when the high/low window has zero range.
pub const FLAT_RANGE_K: f64 = 50.0;

#[derive(Debug, Clone, Default)]
pub struct StochasticSeries {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

pub fn calculate_stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> StochasticSeries {
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let highest = rolling_max(&highs, k_period);
    let lowest = rolling_min(&lows, k_period);

    let k: Vec<Option<f64>> = candles
        .iter()
        .zip(highest.iter().zip(&lowest))
        .map(|(c, (hh, ll))| {
            let (hh, ll) = ((*hh)?, (*ll)?);
            let range = hh - ll;
            if range == 0.0 {
                Some(FLAT_RANGE_K)
            } else {
                Some(100.0 * (c.close - ll) / range)
            }
        })
        .collect();
    let d = rolling_mean_opt(&k, d_period);

    StochasticSeries { k, d }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, close, high, low, close, 1.0)
    }

    #[test]
    fn close_at_high_is_100() {
        let candles: Vec<Candle> = (0..14)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(base + 1.0, base - 1.0, base)
            })
            .chain(std::iter::once(candle(120.0, 113.0, 120.0)))
            .collect();
        let s = calculate_stochastic(&candles, 14, 3);
        assert_eq!(s.k[14], Some(100.0));
    }

    #[test]
    fn flat_range_pins_midpoint() {
        let candles = vec![candle(10.0, 10.0, 10.0); 20];
        let s = calculate_stochastic(&candles, 14, 3);
        assert_eq!(s.k[13], Some(FLAT_RANGE_K));
        assert_eq!(s.d[15], Some(FLAT_RANGE_K));
    }

    #[test]
    fn d_needs_three_k_values() {
        let candles: Vec<Candle> = (0..16).map(|i| candle(i as f64 + 1.0, i as f64, i as f64 + 0.5)).collect();
        let s = calculate_stochastic(&candles, 14, 3);
        assert!(s.k[13].is_some());
        assert_eq!(s.d[14], None);
        assert!(s.d[15].is_some());
    }

    #[test]
    fn k_stays_in_range() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.4).sin() * 8.0;
                candle(base + 1.5, base - 1.5, base + 0.7)
            })
            .collect();
        for k in calculate_stochastic(&candles, 14, 3).k.into_iter().flatten() {
            assert!((0.0..=100.0).contains(&k), "%K {k} out of range");
        }
    }
}
