use crate::math::stats::StatsHelper;
use crate::math::window::CenteredWindow;
use crate::series::TimeSeries;

/// Rolling standard deviation over a fixed number of neighbouring samples.
///
/// The window counts samples on the series' own axis, not wall-clock time,
/// so two signals with different native rates see different durations for
/// the same window size.
#[derive(Debug, Clone, Copy)]
pub struct RollingStatistic {
    window: CenteredWindow,
}

impl RollingStatistic {
    pub fn centered(samples: usize) -> Self {
        Self {
            window: CenteredWindow::spanning(samples),
        }
    }

    /// Window ending at the current sample.
    pub fn trailing(samples: usize) -> Self {
        Self {
            window: CenteredWindow {
                before: samples.saturating_sub(1),
                after: 0,
            },
        }
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// NaN wherever the window is truncated by either end of the series or
    /// contains a NaN sample.
    pub fn std(&self, series: &TimeSeries) -> TimeSeries {
        let values = series.values();
        let stats = (0..values.len())
            .map(|idx| match self.window.bounds(idx, values.len()) {
                Some(range) => StatsHelper::sample_std(&values[range]),
                None => f64::NAN,
            })
            .collect();
        TimeSeries::on_axis(series.axis().clone(), stats)
    }
}

pub fn rolling_std(series: &TimeSeries, window: usize, center: bool) -> TimeSeries {
    let stat = if center {
        RollingStatistic::centered(window)
    } else {
        RollingStatistic::trailing(window)
    };
    stat.std(series)
}
