use std::collections::BTreeMap;
use std::sync::Arc;

use crate::prelude::{ExhaustError, ExhaustResult};
use crate::series::timeseries::{TimeSeries, Timestamp};

/// Named signals sharing one outer-joined timestamp axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFrame {
    timestamps: Arc<[Timestamp]>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl AlignedFrame {
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub(crate) fn axis(&self) -> &Arc<[Timestamp]> {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn signal_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// The named column reindexed on the shared axis.
    pub fn signal(&self, name: &str) -> ExhaustResult<TimeSeries> {
        let column = self
            .columns
            .get(name)
            .ok_or_else(|| ExhaustError::MissingSignal(name.to_string()))?;
        Ok(TimeSeries::on_axis(self.timestamps.clone(), column.clone()))
    }
}

/// Outer-joins independently sampled series onto one axis.
pub struct TimeSeriesAligner;

impl TimeSeriesAligner {
    /// The resulting axis is the sorted union of every input timestamp.
    /// A signal with no sample at some axis timestamp reads NaN there; no
    /// interpolation happens here.
    ///
    /// Consecutive duplicate timestamps within one series keep their first
    /// sample. Any other ordering defect fails the whole alignment.
    pub fn align<I, S>(inputs: I) -> ExhaustResult<AlignedFrame>
    where
        I: IntoIterator<Item = (S, TimeSeries)>,
        S: Into<String>,
    {
        let mut prepared: Vec<(String, Vec<(Timestamp, f64)>)> = Vec::new();
        for (name, series) in inputs {
            let name = name.into();
            if prepared.iter().any(|(existing, _)| *existing == name) {
                return Err(ExhaustError::Alignment(format!(
                    "signal `{}` supplied more than once",
                    name
                )));
            }
            let samples = Self::validated_samples(&name, &series)?;
            prepared.push((name, samples));
        }
        if prepared.is_empty() {
            return Err(ExhaustError::Alignment("no series to align".into()));
        }

        let mut axis: Vec<Timestamp> = prepared
            .iter()
            .flat_map(|(_, samples)| samples.iter().map(|(t, _)| *t))
            .collect();
        axis.sort_by(|a, b| a.total_cmp(b));
        axis.dedup();

        let columns = prepared
            .into_iter()
            .map(|(name, samples)| {
                let column = Self::reindex(&axis, &samples);
                (name, column)
            })
            .collect();

        Ok(AlignedFrame {
            timestamps: axis.into(),
            columns,
        })
    }

    fn validated_samples(name: &str, series: &TimeSeries) -> ExhaustResult<Vec<(Timestamp, f64)>> {
        if series.is_empty() {
            return Err(ExhaustError::Alignment(format!("signal `{}` is empty", name)));
        }
        let mut samples: Vec<(Timestamp, f64)> = series.iter().collect();
        samples.dedup_by(|later, earlier| later.0 == earlier.0);
        if let Some(idx) = samples.windows(2).position(|w| w[1].0 < w[0].0) {
            return Err(ExhaustError::Alignment(format!(
                "signal `{}` has non-monotonic timestamps after sample {}",
                name, idx
            )));
        }
        Ok(samples)
    }

    fn reindex(axis: &[Timestamp], samples: &[(Timestamp, f64)]) -> Vec<f64> {
        let mut column = vec![f64::NAN; axis.len()];
        let mut cursor = 0;
        for (slot, &t) in column.iter_mut().zip(axis) {
            if cursor < samples.len() && samples[cursor].0 == t {
                *slot = samples[cursor].1;
                cursor += 1;
            }
        }
        column
    }
}
