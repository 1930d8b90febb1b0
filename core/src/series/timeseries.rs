use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::prelude::{ExhaustError, ExhaustResult};

/// Seconds since the Unix epoch.
pub type Timestamp = f64;

pub fn epoch_seconds(at: DateTime<Utc>) -> Timestamp {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) * 1e-9
}

/// Ordered (timestamp, value) samples. Values may be NaN for gaps.
///
/// The timestamp axis is reference counted so derived series (rolling
/// statistics, flags) share it with their source instead of copying.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    timestamps: Arc<[Timestamp]>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(timestamps: Vec<Timestamp>, values: Vec<f64>) -> ExhaustResult<Self> {
        if timestamps.len() != values.len() {
            return Err(ExhaustError::Alignment(format!(
                "{} timestamps but {} values",
                timestamps.len(),
                values.len()
            )));
        }
        if let Some(idx) = timestamps.iter().position(|t| !t.is_finite()) {
            return Err(ExhaustError::Alignment(format!(
                "non-finite timestamp at index {}",
                idx
            )));
        }
        Ok(Self {
            timestamps: timestamps.into(),
            values,
        })
    }

    /// Builds a series on an axis that is already known to be valid.
    pub(crate) fn on_axis(timestamps: Arc<[Timestamp]>, values: Vec<f64>) -> Self {
        debug_assert_eq!(timestamps.len(), values.len());
        Self { timestamps, values }
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn axis(&self) -> &Arc<[Timestamp]> {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, f64)> + '_ {
        self.timestamps.iter().copied().zip(self.values.iter().copied())
    }

    /// Samples with `start <= t <= end`, in their original order.
    pub fn slice(&self, start: Timestamp, end: Timestamp) -> TimeSeries {
        let (timestamps, values): (Vec<_>, Vec<_>) = self
            .iter()
            .filter(|(t, _)| *t >= start && *t <= end)
            .unzip();
        Self {
            timestamps: timestamps.into(),
            values,
        }
    }

    /// Places the series on a regular grid of `step` seconds by linear
    /// interpolation between the bracketing finite samples.
    ///
    /// The grid starts at the first multiple of `step` at or after the first
    /// finite sample and ends at or before the last one, so every grid point
    /// is bracketed. NaN samples are skipped, which fills interior gaps.
    /// Repeated timestamps keep their first sample, as alignment does.
    pub fn resample_linear(&self, step: f64) -> ExhaustResult<TimeSeries> {
        if !(step.is_finite() && step > 0.0) {
            return Err(ExhaustError::InvalidConfig(format!(
                "resample step must be positive, got {}",
                step
            )));
        }
        let mut samples: Vec<(Timestamp, f64)> = self.iter().collect();
        samples.dedup_by(|later, earlier| later.0 == earlier.0);
        let finite: Vec<(Timestamp, f64)> = samples.into_iter().filter(|(_, v)| v.is_finite()).collect();
        if finite.is_empty() {
            return Err(ExhaustError::Alignment(
                "cannot resample a series with no finite samples".into(),
            ));
        }
        if let Some(idx) = finite.windows(2).position(|w| w[1].0 <= w[0].0) {
            return Err(ExhaustError::Alignment(format!(
                "timestamps not increasing at finite sample {}",
                idx + 1
            )));
        }

        let first = finite[0].0;
        let last = finite[finite.len() - 1].0;
        let grid_start = (first / step).ceil() * step;
        if grid_start > last {
            return Ok(Self {
                timestamps: Vec::<Timestamp>::new().into(),
                values: Vec::new(),
            });
        }
        let count = ((last - grid_start) / step).floor() as usize + 1;

        let mut timestamps = Vec::with_capacity(count);
        let mut values = Vec::with_capacity(count);
        let mut cursor = 0;
        for k in 0..count {
            let t = grid_start + k as f64 * step;
            while cursor + 1 < finite.len() && finite[cursor + 1].0 <= t {
                cursor += 1;
            }
            let (t0, v0) = finite[cursor];
            let value = if t <= t0 || cursor + 1 == finite.len() {
                v0
            } else {
                let (t1, v1) = finite[cursor + 1];
                v0 + (v1 - v0) * (t - t0) / (t1 - t0)
            };
            timestamps.push(t);
            values.push(value);
        }

        Ok(Self {
            timestamps: timestamps.into(),
            values,
        })
    }
}

/// Per-sample booleans on the same axis as the series they were derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSeries {
    timestamps: Arc<[Timestamp]>,
    flags: Vec<bool>,
}

impl FlagSeries {
    pub fn new(timestamps: Vec<Timestamp>, flags: Vec<bool>) -> ExhaustResult<Self> {
        if timestamps.len() != flags.len() {
            return Err(ExhaustError::Alignment(format!(
                "{} timestamps but {} flags",
                timestamps.len(),
                flags.len()
            )));
        }
        Ok(Self {
            timestamps: timestamps.into(),
            flags,
        })
    }

    pub(crate) fn on_axis(timestamps: Arc<[Timestamp]>, flags: Vec<bool>) -> Self {
        debug_assert_eq!(timestamps.len(), flags.len());
        Self { timestamps, flags }
    }

    /// All-false flags on `axis`.
    pub(crate) fn cleared(timestamps: Arc<[Timestamp]>) -> Self {
        let flags = vec![false; timestamps.len()];
        Self { timestamps, flags }
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub(crate) fn axis(&self) -> &Arc<[Timestamp]> {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn count_flagged(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    /// Sets every sample that is flagged in `other`. Flags never clear.
    pub fn or_assign(&mut self, other: &FlagSeries) -> ExhaustResult<()> {
        if self.flags.len() != other.flags.len() {
            return Err(ExhaustError::Alignment(format!(
                "cannot combine flag series of length {} and {}",
                self.flags.len(),
                other.flags.len()
            )));
        }
        for (mine, theirs) in self.flags.iter_mut().zip(&other.flags) {
            *mine |= *theirs;
        }
        Ok(())
    }

    pub fn into_flags(self) -> Vec<bool> {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_seconds_keeps_subsecond_part() {
        let at = DateTime::<Utc>::from_timestamp(1_462_492_800, 250_000_000).unwrap();
        assert_eq!(epoch_seconds(at), 1_462_492_800.25);
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let err = TimeSeries::new(vec![0.0, 1.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, ExhaustError::Alignment(_)));
    }

    #[test]
    fn new_rejects_nan_timestamp() {
        assert!(TimeSeries::new(vec![0.0, f64::NAN], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn slice_is_inclusive_on_both_ends() {
        let series = TimeSeries::new(vec![0.0, 1.0, 2.0, 3.0], vec![10.0, 11.0, 12.0, 13.0]).unwrap();
        let sliced = series.slice(1.0, 2.0);
        assert_eq!(sliced.timestamps(), &[1.0, 2.0]);
        assert_eq!(sliced.values(), &[11.0, 12.0]);
    }

    #[test]
    fn resample_interpolates_between_samples() {
        let series = TimeSeries::new(vec![0.5, 2.5, 4.5], vec![0.0, 2.0, f64::NAN]).unwrap();
        let resampled = series.resample_linear(1.0).unwrap();
        assert_eq!(resampled.timestamps(), &[1.0, 2.0]);
        assert!((resampled.values()[0] - 0.5).abs() < 1e-12);
        assert!((resampled.values()[1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn resample_fills_interior_gaps() {
        let series =
            TimeSeries::new(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![0.0, f64::NAN, f64::NAN, 3.0, 4.0]).unwrap();
        let resampled = series.resample_linear(1.0).unwrap();
        assert_eq!(resampled.len(), 5);
        assert!((resampled.values()[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn resample_rejects_all_nan() {
        let series = TimeSeries::new(vec![0.0, 1.0], vec![f64::NAN, f64::NAN]).unwrap();
        assert!(matches!(
            series.resample_linear(1.0),
            Err(ExhaustError::Alignment(_))
        ));
    }

    #[test]
    fn resample_keeps_first_of_repeated_timestamps() {
        let series = TimeSeries::new(vec![0.0, 1.0, 1.0, 2.0], vec![0.0, 1.0, 5.0, 2.0]).unwrap();
        let resampled = series.resample_linear(1.0).unwrap();
        assert_eq!(resampled.timestamps(), &[0.0, 1.0, 2.0]);
        assert_eq!(resampled.values(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn resample_rejects_decreasing_timestamps() {
        let series = TimeSeries::new(vec![0.0, 2.0, 1.0], vec![0.0, 2.0, 1.0]).unwrap();
        assert!(matches!(
            series.resample_linear(1.0),
            Err(ExhaustError::Alignment(_))
        ));
    }

    #[test]
    fn or_assign_only_accumulates() {
        let mut left = FlagSeries::new(vec![0.0, 1.0, 2.0], vec![true, false, false]).unwrap();
        let right = FlagSeries::new(vec![0.0, 1.0, 2.0], vec![false, false, true]).unwrap();
        left.or_assign(&right).unwrap();
        assert_eq!(left.flags(), &[true, false, true]);
    }
}
