// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = SMA(close, period); upper / lower = middle ± k·σ where σ is the
// sample standard deviation of the same window.
// =============================================================================

use super::rolling::{rolling_mean, rolling_std};

/// Per-bar Bollinger envelope, aligned with the input closes.
#[derive(Debug, Clone, Default)]
pub struct BollingerSeries {
    pub middle: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Calculate Bollinger Bands for every bar of `closes`.
///
/// Bars before the first full window are `None` in all three bands.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> BollingerSeries {
    let middle = rolling_mean(closes, period);
    let std = rolling_std(closes, period);

    let mut upper = Vec::with_capacity(closes.len());
    let mut lower = Vec::with_capacity(closes.len());
    for (m, s) in middle.iter().zip(&std) {
        match (m, s) {
            (Some(m), Some(s)) => {
                upper.push(Some(m + num_std * s));
                lower.push(Some(m - num_std * s));
            }
            _ => {
                upper.push(None);
                lower.push(None);
            }
        }
    }

    BollingerSeries { middle, upper, lower }
}
