use std::ops::Range;

/// Sample-count window positioned around an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CenteredWindow {
    pub before: usize,
    pub after: usize,
}

impl CenteredWindow {
    /// Exactly `samples` samples. For even sizes the extra sample sits
    /// before the centre, so a window of 10 spans `i-5..=i+4`.
    pub fn spanning(samples: usize) -> Self {
        Self {
            before: samples / 2,
            after: samples.saturating_sub(1) / 2,
        }
    }

    /// `reach` samples on each side of the centre.
    pub fn symmetric(reach: usize) -> Self {
        Self {
            before: reach,
            after: reach,
        }
    }

    pub fn len(&self) -> usize {
        self.before + self.after + 1
    }

    /// Index range around `centre` in a sequence of `total` samples, or
    /// `None` when the window would run past either end.
    pub fn bounds(&self, centre: usize, total: usize) -> Option<Range<usize>> {
        let start = centre.checked_sub(self.before)?;
        let end = centre.checked_add(self.after)?.checked_add(1)?;
        if end > total {
            return None;
        }
        Some(start..end)
    }
}
