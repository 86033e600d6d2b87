// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   alpha  = 2 / (span + 1)
//   EMA_0  = value_0
//   EMA_t  = value_t * alpha + EMA_{t-1} * (1 - alpha)
//
// The series is seeded with the first value, so it is defined from index 0
// and has the same length as the input.
// =============================================================================

/// Compute the EMA series of `values` with smoothing `span`.
///
/// # Edge cases
/// - `span == 0` or empty input => empty vec
pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());

    let mut prev = values[0];
    result.push(prev);
    for &value in &values[1..] {
        let ema = value * alpha + prev * (1.0 - alpha);
        result.push(ema);
        prev = ema;
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_span_zero() {
        assert!(calculate_ema(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn ema_seeded_with_first_value() {
        let ema = calculate_ema(&[7.0, 7.0, 7.0], 12);
        assert_eq!(ema, vec![7.0, 7.0, 7.0]);
    }

    #[test]
    fn ema_known_values() {
        // span 3 => alpha 0.5
        let ema = calculate_ema(&[2.0, 4.0, 8.0], 3);
        assert_eq!(ema.len(), 3);
        assert!((ema[0] - 2.0).abs() < 1e-12);
        assert!((ema[1] - 3.0).abs() < 1e-12);
        assert!((ema[2] - 5.5).abs() < 1e-12);
    }

    #[test]
    fn ema_fast_tracks_rising_prices_closer() {
        let closes: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        let fast = calculate_ema(&closes, 12);
        let slow = calculate_ema(&closes, 26);
        assert!(fast.last().unwrap() > slow.last().unwrap());
        assert!(fast.last().unwrap() < &60.0);
    }
}
