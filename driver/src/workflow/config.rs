use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use exhaustcore::prelude::ExhaustConfig;
use serde::{Deserialize, Serialize};

use crate::generator::profile::GeneratorConfig;

/// Where one signal's raw table lives.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputSpec {
    pub path: PathBuf,
    /// Regular grid step in seconds applied before alignment.
    #[serde(default)]
    pub resample_seconds: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub store_dir: PathBuf,
    pub voyage_index: Option<PathBuf>,
    pub start: Option<String>,
    pub end: Option<String>,
    /// Signal name to input table.
    pub inputs: BTreeMap<String, InputSpec>,
    /// Replaces `inputs` with generated data when present.
    pub synthetic: Option<GeneratorConfig>,
    pub write_csv: bool,
    pub detector: ExhaustConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("exhaust"),
            voyage_index: None,
            start: None,
            end: None,
            inputs: BTreeMap::new(),
            synthetic: None,
            write_csv: true,
            detector: ExhaustConfig::default(),
        }
    }
}

/// Inclusive time window for slicing inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A bare date means midnight for the start bound and the last
/// millisecond of that day for the end bound.
pub fn parse_bound(raw: &str, is_end: bool) -> anyhow::Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .with_context(|| format!("`{}` is neither a date nor RFC 3339", trimmed))?;
    let boundary = if is_end {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    let time = boundary.context("building day boundary")?;
    Ok(date.and_time(time).and_utc())
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(store_dir: PathBuf, start: Option<String>, end: Option<String>) -> Self {
        Self {
            store_dir,
            start,
            end,
            ..Default::default()
        }
    }

    /// `None` when neither bound is set. Setting only one is an error.
    pub fn date_range(&self) -> anyhow::Result<Option<DateRange>> {
        match (&self.start, &self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let range = DateRange {
                    start: parse_bound(start, false)?,
                    end: parse_bound(end, true)?,
                };
                if range.end < range.start {
                    bail!("end {} precedes start {}", end, start);
                }
                Ok(Some(range))
            }
            _ => bail!("start and end dates must be given together"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn bare_dates_cover_whole_days() {
        let cfg = WorkflowConfig::from_args(
            PathBuf::from("out"),
            Some("2016-05-06".into()),
            Some("2016-05-07".into()),
        );
        let range = cfg.date_range().unwrap().unwrap();
        assert_eq!(range.start.to_rfc3339(), "2016-05-06T00:00:00+00:00");
        assert_eq!(range.end.to_rfc3339(), "2016-05-07T23:59:59.999+00:00");
    }

    #[test]
    fn one_sided_range_is_rejected() {
        let cfg = WorkflowConfig::from_args(PathBuf::from("out"), Some("2016-05-06".into()), None);
        assert!(cfg.date_range().is_err());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"store_dir: /tmp/exhaust\nstart: 2016-05-06\nend: 2016-05-07\ninputs:\n  co:\n    path: co.csv\n    resample_seconds: 1.0\ndetector:\n  cn_id: false\n  filter_window: 300\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.inputs["co"].resample_seconds, Some(1.0));
        assert!(!cfg.detector.cn_id);
        assert_eq!(cfg.detector.filter_window, 300);
        assert_eq!(cfg.detector.co_stat_window, 10);
        assert!(cfg.write_csv);
    }
}
