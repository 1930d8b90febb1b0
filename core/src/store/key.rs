use std::fmt;

use chrono::NaiveDate;

use crate::prelude::{ExhaustError, ExhaustResult};

const PREFIX: &str = "exhaust_id";

/// File-safe identifier for one stored exhaust label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultKey(String);

impl ResultKey {
    /// Accepts `[A-Za-z0-9_.-]` only. Keys map one-to-one onto file names,
    /// so nothing is rewritten.
    pub fn new(raw: &str) -> ExhaustResult<Self> {
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(ExhaustError::InvalidConfig(format!(
                "`{}` is not usable as a result key: {:?} is not allowed",
                raw, bad
            )));
        }
        if raw.trim_matches('.').is_empty() {
            return Err(ExhaustError::InvalidConfig(format!(
                "`{}` is not usable as a result key",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// `exhaust_id_<voyage>_<voyage>...`
    pub fn for_voyages<S: AsRef<str>>(voyages: &[S]) -> ExhaustResult<Self> {
        if voyages.is_empty() {
            return Err(ExhaustError::InvalidConfig(
                "a voyage key needs at least one voyage".into(),
            ));
        }
        let mut raw = PREFIX.to_string();
        for voyage in voyages {
            raw.push('_');
            raw.push_str(voyage.as_ref());
        }
        Self::new(&raw)
    }

    /// `exhaust_id_<start>_<end>` with ISO dates.
    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self(format!(
            "{}_{}_{}",
            PREFIX,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
