//! Numeric reductions over sample series.
//!
//! Every reduction returns `None` for an empty series so callers have to
//! pick their own fallback instead of dividing by zero.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance.
pub fn variance(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;

    let squared = values.iter().map(|value| (value - avg).powi(2)).sum::<f64>();

    Some(squared / values.len() as f64)
}

/// Standard deviation divided by the mean.
///
/// Returns `None` for an empty series or a zero mean, where the ratio is
/// undefined.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    if avg == 0.0 {
        return None;
    }

    Some(variance(values)?.sqrt() / avg)
}

/// Mean absolute difference between consecutive values.
///
/// Requires at least two values.
pub fn mean_abs_delta(values: &[f64]) -> Option<f64> {
    let deltas: Vec<f64> = values
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .collect();

    mean(&deltas)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[4.0]), Some(4.0));
        assert_eq!(mean(&[20.0, 30.0, 25.0, 100.0, 22.0]), Some(39.4));
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(&[]), None);
        assert_eq!(variance(&[5.0, 5.0, 5.0]), Some(0.0));
        // mean 5, deviations 9 + 1 + 1 + 9 = 20 over 4
        assert_eq!(variance(&[2.0, 4.0, 6.0, 8.0]), Some(5.0));
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_eq!(coefficient_of_variation(&[]), None);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), None);
        assert_eq!(coefficient_of_variation(&[10.0, 10.0]), Some(0.0));

        let cv = coefficient_of_variation(&[50.0, 100.0]).unwrap();
        // sd 25, mean 75
        assert!((cv - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_abs_delta() {
        assert_eq!(mean_abs_delta(&[]), None);
        assert_eq!(mean_abs_delta(&[12.0]), None);
        assert_eq!(mean_abs_delta(&[10.0, 20.0, 15.0]), Some(7.5));
    }

    #[test]
    fn test_max_min() {
        assert_eq!(max(&[]), None);
        assert_eq!(min(&[]), None);
        assert_eq!(max(&[20.0, 80.0, 45.0]), Some(80.0));
        assert_eq!(min(&[20.0, 80.0, 45.0]), Some(20.0));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.2345, 1), 1.2);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(1.456, 2), 1.46);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The mean always lies between the extremes.
        #[test]
        fn mean_is_bounded(values in proptest::collection::vec(0.0f64..10_000.0, 1..50)) {
            let avg = mean(&values).unwrap();
            prop_assert!(avg >= min(&values).unwrap() - 1e-9);
            prop_assert!(avg <= max(&values).unwrap() + 1e-9);
        }

        /// Variance is never negative.
        #[test]
        fn variance_is_non_negative(values in proptest::collection::vec(0.0f64..10_000.0, 1..50)) {
            prop_assert!(variance(&values).unwrap() >= 0.0);
        }
    }
}
