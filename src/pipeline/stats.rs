//! Small NaN-aware statistics shared by the quality enforcer and the
//! feature builder.

/// Linearly interpolated percentile (pandas `quantile` default). `q` in
/// [0, 1]. Returns None on an empty slice.
pub fn percentile_linear(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Median with the usual even-count interpolation. None on empty input.
pub fn median(values: &[f64]) -> Option<f64> {
    percentile_linear(values, 0.5)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn percentile_interpolates_between_ranks() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile_linear(&values, 0.5).unwrap(), 2.5);
        assert_relative_eq!(percentile_linear(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile_linear(&values, 1.0).unwrap(), 4.0);
    }

    #[test]
    fn percentile_handles_unsorted_input() {
        let values = vec![3.0, 1.0, 2.0];
        assert_relative_eq!(percentile_linear(&values, 0.5).unwrap(), 2.0);
    }

    #[test]
    fn median_of_two_values_is_their_mean() {
        assert_relative_eq!(median(&[0.0, 1.0]).unwrap(), 0.5);
    }

    #[test]
    fn empty_input_yields_none() {
        assert!(percentile_linear(&[], 0.999).is_none());
        assert!(median(&[]).is_none());
        assert!(min(&[]).is_none());
        assert!(max(&[]).is_none());
    }

    #[test]
    fn min_max_over_slice() {
        let values = vec![5.0, -2.0, 7.5];
        assert_relative_eq!(min(&values).unwrap(), -2.0);
        assert_relative_eq!(max(&values).unwrap(), 7.5);
    }
}
