use std::collections::BTreeMap;

use crate::prelude::{ExhaustError, ExhaustResult};
use crate::series::timeseries::Timestamp;

/// Final per-timestamp exhaust flag, optionally with diagnostic columns.
///
/// Diagnostics hold `None` where the underlying value is undefined (for
/// example a rolling statistic over an incomplete window).
#[derive(Debug, Clone, PartialEq)]
pub struct ExhaustLabel {
    timestamps: Vec<Timestamp>,
    exhaust: Vec<bool>,
    diagnostics: BTreeMap<String, Vec<Option<f64>>>,
}

impl ExhaustLabel {
    pub fn new(timestamps: Vec<Timestamp>, exhaust: Vec<bool>) -> ExhaustResult<Self> {
        if timestamps.len() != exhaust.len() {
            return Err(ExhaustError::Alignment(format!(
                "{} timestamps but {} exhaust flags",
                timestamps.len(),
                exhaust.len()
            )));
        }
        Ok(Self {
            timestamps,
            exhaust,
            diagnostics: BTreeMap::new(),
        })
    }

    pub fn with_diagnostic(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> ExhaustResult<Self> {
        let name = name.into();
        if values.len() != self.exhaust.len() {
            return Err(ExhaustError::Alignment(format!(
                "diagnostic `{}` has {} values for {} samples",
                name,
                values.len(),
                self.exhaust.len()
            )));
        }
        if name == "time" || name == "exhaust" {
            return Err(ExhaustError::Alignment(format!(
                "diagnostic name `{}` is reserved",
                name
            )));
        }
        self.diagnostics.insert(name, values);
        Ok(self)
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn exhaust(&self) -> &[bool] {
        &self.exhaust
    }

    pub fn diagnostics(&self) -> &BTreeMap<String, Vec<Option<f64>>> {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.exhaust.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exhaust.is_empty()
    }

    pub fn count_flagged(&self) -> usize {
        self.exhaust.iter().filter(|&&f| f).count()
    }

    /// Drops every diagnostic column.
    pub fn abridged(mut self) -> Self {
        self.diagnostics.clear();
        self
    }
}
