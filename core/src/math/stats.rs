pub struct StatsHelper;

impl StatsHelper {
    /// Unbiased (N-1) sample standard deviation.
    ///
    /// Returns NaN for fewer than two samples or if any sample is NaN.
    /// Sums are taken about the first sample, which keeps a constant
    /// sequence at exactly zero.
    pub fn sample_std(samples: &[f64]) -> f64 {
        if samples.len() < 2 || samples.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        let shift = samples[0];
        let (sum, sum_sq) = samples.iter().fold((0.0, 0.0), |(s, sq), &v| {
            let d = v - shift;
            (s + d, sq + d * d)
        });
        let n = samples.len() as f64;
        let variance = (sum_sq - sum * sum / n) / (n - 1.0);
        variance.max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_of_constant_sequence_is_exactly_zero() {
        assert_eq!(StatsHelper::sample_std(&[0.1; 10]), 0.0);
        assert_eq!(StatsHelper::sample_std(&[1e9 + 0.3; 4]), 0.0);
    }

    #[test]
    fn std_uses_unbiased_estimator() {
        let std = StatsHelper::sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((std - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn std_needs_two_finite_samples() {
        assert!(StatsHelper::sample_std(&[]).is_nan());
        assert!(StatsHelper::sample_std(&[4.0]).is_nan());
        assert!(StatsHelper::sample_std(&[1.0, f64::NAN, 2.0]).is_nan());
    }
}
