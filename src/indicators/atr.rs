// =============================================================================
// Average True Range (ATR) — simple rolling mean
// =============================================================================
//
// True Range (TR) for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
// The first bar has no previous close, so its TR is H - L.
//
// ATR is the SIMPLE rolling mean of TR over `period` bars (not Wilder's
// smoothing).
//
// Default period: 14
// =============================================================================

use super::rolling::rolling_mean;
use crate::market_data::Candle;

/// True range per bar, aligned with `candles`.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    let mut prev_close: Option<f64> = None;
    for c in candles {
        let hl = c.high - c.low;
        let tr = match prev_close {
            Some(pc) => hl.max((c.high - pc).abs()).max((c.low - pc).abs()),
            None => hl,
        };
        out.push(tr);
        prev_close = Some(c.close);
    }
    out
}

/// ATR series aligned with `candles`; defined from index `period - 1`.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    rolling_mean(&true_range(candles), period)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, close, high, low, close, 100.0)
    }

    #[test]
    fn first_bar_uses_high_low() {
        let tr = true_range(&[candle(105.0, 95.0, 100.0)]);
        assert_eq!(tr, vec![10.0]);
    }

    #[test]
    fn true_range_uses_prev_close_on_gap() {
        let tr = true_range(&[candle(105.0, 95.0, 95.0), candle(115.0, 108.0, 112.0)]);
        // |115 - 95| = 20 > 115 - 108 = 7
        assert_eq!(tr[1], 20.0);
    }

    #[test]
    fn atr_insufficient_data() {
        let candles = vec![candle(105.0, 95.0, 100.0); 10];
        assert!(calculate_atr(&candles, 14).iter().all(Option::is_none));
    }

    #[test]
    fn atr_constant_range_is_exact() {
        let candles = vec![candle(105.0, 95.0, 100.0); 20];
        let atr = calculate_atr(&candles, 14);
        assert_eq!(atr[12], None);
        assert_eq!(atr[13], Some(10.0));
        assert_eq!(atr[19], Some(10.0));
    }

    #[test]
    fn atr_is_simple_mean_of_last_window() {
        // TRs: 2, 4, 6, 8 => ATR(2) at the end = 7.0
        let candles = vec![
            candle(101.0, 99.0, 100.0),
            candle(102.0, 98.0, 100.0),
            candle(103.0, 97.0, 100.0),
            candle(104.0, 96.0, 100.0),
        ];
        let atr = calculate_atr(&candles, 2);
        assert_eq!(atr[3], Some(7.0));
    }
}
