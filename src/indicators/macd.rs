// =============================================================================
// MACD — Moving Average Convergence / Divergence
// =============================================================================
//
//   macd   = EMA(close, fast) - EMA(close, slow)
//   signal = EMA(macd, signal_span)
//   hist   = macd - signal
//
// All three EMAs are seeded with their first input, so every series is
// defined from the first bar.
// =============================================================================

use super::ema::calculate_ema;

#[derive(Debug, Clone, Default)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub hist: Vec<f64>,
}

/// Build MACD from precomputed fast and slow EMA series of equal length.
pub fn macd_from_emas(ema_fast: &[f64], ema_slow: &[f64], signal_span: usize) -> MacdSeries {
    let macd: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow)
        .map(|(fast, slow)| fast - slow)
        .collect();
    let signal = calculate_ema(&macd, signal_span);
    let hist = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();
    MacdSeries { macd, signal, hist }
}

/// Compute MACD directly from closes.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal_span: usize) -> MacdSeries {
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    macd_from_emas(&ema_fast, &ema_slow, signal_span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_prices_give_zero_macd() {
        let m = calculate_macd(&[10.0; 40], 12, 26, 9);
        assert_eq!(m.macd.len(), 40);
        assert!(m.macd.iter().all(|v| v.abs() < 1e-12));
        assert!(m.hist.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn falling_prices_keep_macd_below_signal() {
        let closes: Vec<f64> = (0..100).map(|i| 200.0 - i as f64).collect();
        let m = calculate_macd(&closes, 12, 26, 9);
        let last = m.macd.len() - 1;
        assert!(m.macd[last] < 0.0);
        assert!(m.macd[last] < m.signal[last]);
        assert!(m.hist[last] < 0.0);
    }

    #[test]
    fn histogram_is_difference() {
        let closes: Vec<f64> = (0..50).map(|i| (i as f64 * 0.3).sin() * 5.0 + 100.0).collect();
        let m = calculate_macd(&closes, 12, 26, 9);
        for i in 0..closes.len() {
            assert!((m.hist[i] - (m.macd[i] - m.signal[i])).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_input() {
        let m = calculate_macd(&[], 12, 26, 9);
        assert!(m.macd.is_empty() && m.signal.is_empty() && m.hist.is_empty());
    }
}
