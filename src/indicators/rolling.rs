// =============================================================================
// Rolling-window primitives
// =============================================================================
//
// Every function returns a series aligned with its input: element `i` holds
// the statistic over the window ending at `i`, or `None` while fewer than
// `window` values are available.
// =============================================================================

/// Simple moving average over a trailing window.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| Some(w.iter().sum::<f64>() / w.len() as f64))
}

/// Sample standard deviation (n - 1 denominator) over a trailing window.
///
/// A window of one value has no sample deviation and yields `None`.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| {
        if w.len() < 2 {
            return None;
        }
        let n = w.len() as f64;
        let mean = w.iter().sum::<f64>() / n;
        let variance = w.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some(variance.sqrt())
    })
}

pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().copied().reduce(f64::min))
}

pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().copied().reduce(f64::max))
}

/// Simple moving average over a series that may itself contain gaps.
///
/// A window containing any unavailable value is unavailable.
pub fn rolling_mean_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for end in window - 1..values.len() {
        let slice = &values[end + 1 - window..=end];
        let sum: Option<f64> = slice.iter().copied().sum();
        out[end] = sum.map(|s| s / window as f64);
    }
    out
}

fn rolling<F>(values: &[f64], window: usize, stat: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for (offset, w) in values.windows(window).enumerate() {
        out[offset + window - 1] = stat(w).filter(|v| v.is_finite());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_alignment() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn window_longer_than_input() {
        assert!(rolling_mean(&[1.0, 2.0], 3).iter().all(Option::is_none));
        assert!(rolling_mean(&[1.0, 2.0], 0).iter().all(Option::is_none));
    }

    #[test]
    fn sample_std_known_value() {
        // Sample std of 2,4,4,4,5,5,7,9 is sqrt(32/7).
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let out = rolling_std(&data, 8);
        let got = out[7].unwrap();
        assert!((got - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12, "got {got}");
    }

    #[test]
    fn std_of_single_value_is_unavailable() {
        assert_eq!(rolling_std(&[5.0], 1), vec![None]);
    }

    #[test]
    fn min_max() {
        let data = [3.0, 1.0, 4.0, 1.5, 5.0];
        assert_eq!(rolling_min(&data, 2), vec![None, Some(1.0), Some(1.0), Some(1.5), Some(1.5)]);
        assert_eq!(rolling_max(&data, 2), vec![None, Some(3.0), Some(4.0), Some(4.0), Some(5.0)]);
    }

    #[test]
    fn mean_opt_propagates_gaps() {
        let data = [None, Some(3.0), Some(6.0), Some(9.0)];
        assert_eq!(rolling_mean_opt(&data, 2), vec![None, None, Some(4.5), Some(7.5)]);
    }
}
