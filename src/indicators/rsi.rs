// =============================================================================
// Relative Strength Index (RSI) — simple rolling means
// =============================================================================
//
// Step 1 — delta_i = close_i - close_{i-1}; the first bar has no previous
//          close and contributes a zero delta.
// Step 2 — gain = max(delta, 0), loss = max(-delta, 0).
// Step 3 — avg_gain / avg_loss are SIMPLE rolling means over `period` values
//          (not Wilder smoothing).
// Step 4 — RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//
// When avg_loss is zero the ratio is unbounded and RSI saturates at 100.
// A window with neither gains nor losses sits at the 50 midpoint.
// =============================================================================

use super::rolling::rolling_mean;

/// RSI returned when the window contains no losses.
pub const RSI_NO_LOSS: f64 = 100.0;

/// RSI returned for a window with no price movement at all.
pub const RSI_FLAT: f64 = 50.0;

/// Compute the RSI series aligned with `closes`.
///
/// The first defined value sits at index `period - 1`.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if closes.is_empty() {
        return Vec::new();
    }

    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    gains.push(0.0);
    losses.push(0.0);
    for w in closes.windows(2) {
        let delta = w[1] - w[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(g, l)| rsi_from_averages(g?, l?))
        .collect()
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return Some(RSI_FLAT);
        }
        return Some(RSI_NO_LOSS);
    }
    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    rsi.is_finite().then_some(rsi)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty_input() {
        assert!(calculate_rsi(&[], 14).is_empty());
    }

    #[test]
    fn rsi_warmup_is_unavailable() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let rsi = calculate_rsi(&closes, 14);
        assert_eq!(rsi.len(), 20);
        assert!(rsi[..13].iter().all(Option::is_none));
        assert!(rsi[13].is_some());
    }

    #[test]
    fn rsi_all_gains_saturates() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let rsi = calculate_rsi(&closes, 14);
        assert_eq!(rsi.last().copied().flatten(), Some(100.0));
    }

    #[test]
    fn rsi_flat_market_uses_fallback() {
        let rsi = calculate_rsi(&[100.0; 30], 14);
        assert_eq!(rsi.last().copied().flatten(), Some(RSI_FLAT));
    }

    #[test]
    fn rsi_single_gain_in_quiet_window_saturates() {
        let mut closes = vec![100.0; 29];
        closes.push(101.0);
        let rsi = calculate_rsi(&closes, 14);
        assert_eq!(rsi.last().copied().flatten(), Some(RSI_NO_LOSS));
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let rsi = calculate_rsi(&closes, 14);
        assert_eq!(rsi.last().copied().flatten(), Some(0.0));
    }

    #[test]
    fn rsi_simple_mean_known_value() {
        // Last 14 deltas: seven +2 and seven -1 => avg_gain 1.0, avg_loss 0.5
        // => RS 2 => RSI 66.666...
        let mut closes = vec![50.0];
        for i in 0..14 {
            let prev = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { prev + 2.0 } else { prev - 1.0 });
        }
        let rsi = calculate_rsi(&closes, 14);
        let last = rsi.last().copied().flatten().unwrap();
        assert!((last - 200.0 / 3.0).abs() < 1e-9, "got {last}");
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        for v in calculate_rsi(&closes, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }
}
