//! Self-describing JSON dataset and plain CSV table for exhaust labels.
//!
//! The dataset follows the NetCDF data model: named dimensions, global
//! attributes, and variables that list their dimensions, attributes and
//! values. Times are stored as seconds since the Unix epoch so the label
//! reads back bit-for-bit.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prelude::{ExhaustError, ExhaustResult};
use crate::series::{ExhaustLabel, Timestamp};

pub const TIME_DIMENSION: &str = "time";
pub const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";
pub const EXHAUST_VARIABLE: &str = "exhaust";
/// Global attribute describing the settings and inputs behind a label.
pub const FINGERPRINT_ATTRIBUTE: &str = "fingerprint";

/// Global attributes written into every dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportAttributes {
    pub description: String,
    pub source: String,
}

impl Default for ExportAttributes {
    fn default() -> Self {
        Self {
            description: "Exhaust identification using BC, CN and CO data".into(),
            source: concat!("exhaustcore ", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// A label read back from disk with the fingerprint it was written under.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLabel {
    pub label: ExhaustLabel,
    /// `None` for datasets written without one.
    pub fingerprint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Dataset {
    dimensions: BTreeMap<String, usize>,
    attributes: BTreeMap<String, String>,
    variables: BTreeMap<String, Variable>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Variable {
    dimensions: Vec<String>,
    attributes: BTreeMap<String, String>,
    values: VariableData,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "data", rename_all = "lowercase")]
enum VariableData {
    F64(Vec<Option<f64>>),
    I8(Vec<i8>),
}

fn persistence<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> ExhaustError + '_ {
    move |err| ExhaustError::Persistence(format!("{}: {}", context, err))
}

fn variable(dimensions: &[String], data: VariableData, units: &str) -> Variable {
    let mut attributes = BTreeMap::new();
    attributes.insert("units".to_string(), units.to_string());
    Variable {
        dimensions: dimensions.to_vec(),
        attributes,
        values: data,
    }
}

pub fn write_dataset<W: Write>(
    label: &ExhaustLabel,
    attributes: &ExportAttributes,
    fingerprint: &str,
    writer: W,
) -> ExhaustResult<()> {
    let dims = vec![TIME_DIMENSION.to_string()];

    let mut variables = BTreeMap::new();
    let mut time = variable(
        &dims,
        VariableData::F64(label.timestamps().iter().map(|t| Some(*t)).collect()),
        TIME_UNITS,
    );
    time.attributes
        .insert("calendar".to_string(), "gregorian".to_string());
    variables.insert(TIME_DIMENSION.to_string(), time);
    variables.insert(
        EXHAUST_VARIABLE.to_string(),
        variable(
            &dims,
            VariableData::I8(label.exhaust().iter().map(|&f| i8::from(f)).collect()),
            "dimensionless",
        ),
    );
    for (name, values) in label.diagnostics() {
        variables.insert(
            name.clone(),
            variable(&dims, VariableData::F64(values.clone()), "dimensionless"),
        );
    }

    let mut global = BTreeMap::new();
    global.insert("description".to_string(), attributes.description.clone());
    global.insert("source".to_string(), attributes.source.clone());
    global.insert(FINGERPRINT_ATTRIBUTE.to_string(), fingerprint.to_string());
    global.insert(
        "history".to_string(),
        format!("Created {}", Utc::now().format("%a %b %e %H:%M:%S %Y UTC")),
    );

    let mut dimensions = BTreeMap::new();
    dimensions.insert(TIME_DIMENSION.to_string(), label.len());

    let dataset = Dataset {
        dimensions,
        attributes: global,
        variables,
    };
    serde_json::to_writer(writer, &dataset).map_err(persistence("encoding exhaust dataset"))
}

pub fn read_dataset<R: Read>(reader: R) -> ExhaustResult<StoredLabel> {
    let mut dataset: Dataset =
        serde_json::from_reader(reader).map_err(persistence("decoding exhaust dataset"))?;
    let expected = dataset
        .dimensions
        .get(TIME_DIMENSION)
        .copied()
        .ok_or_else(|| ExhaustError::Persistence("dataset has no time dimension".into()))?;

    let timestamps: Vec<Timestamp> = match dataset.variables.remove(TIME_DIMENSION) {
        Some(Variable {
            values: VariableData::F64(values),
            ..
        }) => values
            .into_iter()
            .map(|t| t.ok_or_else(|| ExhaustError::Persistence("null time value".into())))
            .collect::<ExhaustResult<_>>()?,
        _ => {
            return Err(ExhaustError::Persistence(
                "dataset has no floating-point time variable".into(),
            ))
        }
    };
    let exhaust: Vec<bool> = match dataset.variables.remove(EXHAUST_VARIABLE) {
        Some(Variable {
            values: VariableData::I8(values),
            ..
        }) => values
            .into_iter()
            .map(|v| match v {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(ExhaustError::Persistence(format!(
                    "exhaust value {} is not 0 or 1",
                    other
                ))),
            })
            .collect::<ExhaustResult<_>>()?,
        _ => {
            return Err(ExhaustError::Persistence(
                "dataset has no integer exhaust variable".into(),
            ))
        }
    };
    if timestamps.len() != expected {
        return Err(ExhaustError::Persistence(format!(
            "time dimension is {} but time variable holds {} values",
            expected,
            timestamps.len()
        )));
    }

    let mut label = ExhaustLabel::new(timestamps, exhaust)
        .map_err(persistence("rebuilding exhaust label"))?;
    for (name, variable) in dataset.variables {
        let values = match variable.values {
            VariableData::F64(values) => values,
            VariableData::I8(values) => values.into_iter().map(|v| Some(f64::from(v))).collect(),
        };
        label = label
            .with_diagnostic(name, values)
            .map_err(persistence("rebuilding diagnostic column"))?;
    }
    Ok(StoredLabel {
        label,
        fingerprint: dataset.attributes.remove(FINGERPRINT_ATTRIBUTE),
    })
}

/// ISO-8601 with millisecond precision, falling back to raw seconds for
/// values chrono cannot represent.
pub fn format_timestamp(timestamp: Timestamp) -> String {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).round().min(999_999_999.0) as u32;
    match DateTime::<Utc>::from_timestamp(secs as i64, nanos) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => timestamp.to_string(),
    }
}

pub fn write_csv<W: Write>(label: &ExhaustLabel, writer: W) -> ExhaustResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    let mut header = vec![TIME_DIMENSION.to_string(), EXHAUST_VARIABLE.to_string()];
    header.extend(label.diagnostics().keys().cloned());
    csv.write_record(&header)
        .map_err(persistence("writing csv header"))?;

    for (idx, (timestamp, flag)) in label.timestamps().iter().zip(label.exhaust()).enumerate() {
        let mut row = vec![format_timestamp(*timestamp), flag.to_string()];
        row.extend(label.diagnostics().values().map(|column| match column[idx] {
            Some(v) => v.to_string(),
            None => String::new(),
        }));
        csv.write_record(&row).map_err(persistence("writing csv row"))?;
    }
    csv.flush().map_err(persistence("flushing csv"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_label() -> ExhaustLabel {
        ExhaustLabel::new(
            vec![1_462_492_800.0, 1_462_492_800.5, 1_462_492_801.123_456_7],
            vec![false, true, true],
        )
        .unwrap()
        .with_diagnostic("co_std", vec![None, Some(0.3), Some(0.1 + 0.2)])
        .unwrap()
    }

    #[test]
    fn dataset_round_trips_label_exactly() {
        let label = sample_label();
        let mut buffer = Vec::new();
        write_dataset(&label, &ExportAttributes::default(), "filter_window=600", &mut buffer).unwrap();
        let restored = read_dataset(buffer.as_slice()).unwrap();
        assert_eq!(restored.label, label);
        assert_eq!(restored.fingerprint.as_deref(), Some("filter_window=600"));
    }

    #[test]
    fn dataset_is_self_describing() {
        let mut buffer = Vec::new();
        write_dataset(&sample_label(), &ExportAttributes::default(), "", &mut buffer).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(json["dimensions"]["time"], 3);
        assert_eq!(json["variables"]["exhaust"]["attributes"]["units"], "dimensionless");
        assert_eq!(json["variables"]["exhaust"]["values"]["dtype"], "i8");
        assert_eq!(json["variables"]["time"]["attributes"]["units"], TIME_UNITS);
        assert!(json["attributes"]["history"]
            .as_str()
            .unwrap()
            .starts_with("Created "));
    }

    #[test]
    fn dataset_without_fingerprint_still_reads() {
        let mut buffer = Vec::new();
        write_dataset(&sample_label(), &ExportAttributes::default(), "x", &mut buffer).unwrap();
        let mut json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        json["attributes"]
            .as_object_mut()
            .unwrap()
            .remove(FINGERPRINT_ATTRIBUTE);
        let stored = read_dataset(serde_json::to_vec(&json).unwrap().as_slice()).unwrap();
        assert_eq!(stored.label, sample_label());
        assert!(stored.fingerprint.is_none());
    }

    #[test]
    fn corrupt_dataset_is_a_persistence_error() {
        let err = read_dataset(&b"{\"dimensions\":"[..]).unwrap_err();
        assert!(matches!(err, ExhaustError::Persistence(_)));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut buffer = Vec::new();
        write_dataset(&sample_label(), &ExportAttributes::default(), "", &mut buffer).unwrap();
        let mut json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        json["dimensions"]["time"] = serde_json::json!(7);
        let tampered = serde_json::to_vec(&json).unwrap();
        assert!(read_dataset(tampered.as_slice()).is_err());
    }

    #[test]
    fn csv_has_readable_times_and_blank_gaps() {
        let mut buffer = Vec::new();
        write_csv(&sample_label(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time,exhaust,co_std");
        assert_eq!(lines[1], "2016-05-06T00:00:00.000Z,false,");
        assert_eq!(lines[2], "2016-05-06T00:00:00.500Z,true,0.3");
    }
}
