use crate::math::window::CenteredWindow;
use crate::series::FlagSeries;

/// Widens flagged regions so every sample within `pad / 2` samples of a
/// flagged sample is flagged too.
///
/// Samples whose window runs past either end of the sequence are flagged
/// unconditionally: an edge that cannot be checked is treated as
/// contaminated.
#[derive(Debug, Clone, Copy)]
pub struct WindowDilator {
    window: CenteredWindow,
}

impl WindowDilator {
    /// A `pad` of 0 or 1 leaves the flags untouched.
    pub fn new(pad: usize) -> Self {
        Self {
            window: CenteredWindow::symmetric(pad / 2),
        }
    }

    pub fn reach(&self) -> usize {
        self.window.before
    }

    pub fn dilate(&self, flags: &FlagSeries) -> FlagSeries {
        let raw = flags.flags();
        let total = raw.len();

        let mut prefix = Vec::with_capacity(total + 1);
        prefix.push(0usize);
        for &flag in raw {
            let last = prefix[prefix.len() - 1];
            prefix.push(last + usize::from(flag));
        }

        let dilated = (0..total)
            .map(|idx| match self.window.bounds(idx, total) {
                Some(range) => prefix[range.end] > prefix[range.start],
                None => true,
            })
            .collect();
        FlagSeries::on_axis(flags.axis().clone(), dilated)
    }
}

pub fn dilate(flags: &FlagSeries, pad: usize) -> FlagSeries {
    WindowDilator::new(pad).dilate(flags)
}
