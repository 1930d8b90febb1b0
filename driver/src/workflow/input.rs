use std::path::Path;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use exhaustcore::series::{epoch_seconds, TimeSeries, Timestamp};
use serde::Deserialize;

/// One row of a `time,value` table.
#[derive(Debug, Deserialize)]
struct InputRow {
    time: String,
    #[serde(default)]
    value: String,
}

/// Epoch seconds or RFC 3339.
pub fn parse_time(raw: &str) -> anyhow::Result<Timestamp> {
    let trimmed = raw.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(seconds);
    }
    let parsed = DateTime::parse_from_rfc3339(trimmed)
        .with_context(|| format!("`{}` is neither epoch seconds nor RFC 3339", trimmed))?;
    Ok(epoch_seconds(parsed.with_timezone(&Utc)))
}

fn parse_value(raw: &str) -> anyhow::Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(f64::NAN);
    }
    trimmed
        .parse::<f64>()
        .map_err(|err| anyhow!("`{}` is not a number: {}", trimmed, err))
}

/// Reads a `time,value` CSV. Blank values become NaN.
pub fn load_series(path: &Path) -> anyhow::Result<TimeSeries> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening input {}", path.display()))?;

    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    for (line, row) in reader.deserialize::<InputRow>().enumerate() {
        let row = row.with_context(|| format!("reading {} row {}", path.display(), line + 1))?;
        let time = parse_time(&row.time)
            .with_context(|| format!("{} row {}: bad time", path.display(), line + 1))?;
        let value = parse_value(&row.value)
            .with_context(|| format!("{} row {}: bad value", path.display(), line + 1))?;
        timestamps.push(time);
        values.push(value);
    }

    TimeSeries::new(timestamps, values).with_context(|| format!("building series from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn times_accept_epoch_and_rfc3339() {
        assert_eq!(parse_time("1462492800").unwrap(), 1_462_492_800.0);
        assert_eq!(parse_time("2016-05-06T00:00:01Z").unwrap(), 1_462_492_801.0);
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn load_reads_table_with_gaps() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"time,value\n2016-05-06T00:00:00Z,0.1\n2016-05-06T00:00:01Z,\n1462492802,0.3\n")
            .unwrap();
        let path = temp.into_temp_path();
        let series = load_series(&path).unwrap();
        assert_eq!(series.len(), 3);
        assert!(series.values()[1].is_nan());
        assert_eq!(series.timestamps()[2], 1_462_492_802.0);
    }

    #[test]
    fn load_reports_bad_rows() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"time,value\n1,abc\n").unwrap();
        let path = temp.into_temp_path();
        let err = load_series(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("row 1"));
    }
}
