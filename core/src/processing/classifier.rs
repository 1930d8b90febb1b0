use crate::series::{FlagSeries, TimeSeries};

/// Flags samples strictly above a fixed threshold.
///
/// NaN never exceeds the threshold, so undefined statistics come out
/// unflagged here. The fail-safe for incomplete windows is applied later
/// by [`WindowDilator`](super::dilation::WindowDilator).
#[derive(Debug, Clone, Copy)]
pub struct ThresholdClassifier {
    threshold: f64,
}

impl ThresholdClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classify(&self, series: &TimeSeries) -> FlagSeries {
        let flags = series.values().iter().map(|&v| v > self.threshold).collect();
        FlagSeries::on_axis(series.axis().clone(), flags)
    }
}

pub fn classify(series: &TimeSeries, threshold: f64) -> FlagSeries {
    ThresholdClassifier::new(threshold).classify(series)
}
