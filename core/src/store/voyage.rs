use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prelude::{ExhaustError, ExhaustResult};
use crate::store::key::ResultKey;
use crate::store::write_atomically;
use crate::telemetry::log::LogManager;

/// Start and end of one voyage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoyageRecord {
    pub voyage: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl VoyageRecord {
    /// Strictly inside, so a date equal to a port-call boundary matches
    /// neither neighbouring voyage.
    pub fn spans(&self, at: DateTime<Utc>) -> bool {
        at > self.start && at < self.end
    }
}

/// Voyage date table, kept in name order and persisted as
/// `voyage,start,end` CSV.
#[derive(Debug, Clone, Default)]
pub struct VoyageIndex {
    records: BTreeMap<String, VoyageRecord>,
}

impl VoyageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the table at `path`, or starts an empty one if the file does
    /// not exist yet.
    pub fn open(path: &Path) -> ExhaustResult<Self> {
        let logger = LogManager::new("voyages");
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                logger.detail(&format!("no voyage index at {}, starting empty", path.display()));
                return Ok(Self::new());
            }
            Err(err) => {
                return Err(ExhaustError::Persistence(format!(
                    "opening voyage index {}: {}",
                    path.display(),
                    err
                )))
            }
        };

        let mut index = Self::new();
        let mut reader = csv::Reader::from_reader(BufReader::new(file));
        for row in reader.deserialize::<VoyageRecord>() {
            let record = row.map_err(|err| {
                ExhaustError::Persistence(format!("reading voyage index {}: {}", path.display(), err))
            })?;
            index.insert(record)?;
        }
        logger.detail(&format!("loaded {} voyages from {}", index.len(), path.display()));
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> ExhaustResult<()> {
        write_atomically(path, |writer| {
            let mut csv = csv::Writer::from_writer(writer);
            for record in self.records.values() {
                csv.serialize(record)
                    .map_err(|err| ExhaustError::Persistence(format!("writing voyage index: {}", err)))?;
            }
            csv.flush()
                .map_err(|err| ExhaustError::Persistence(format!("flushing voyage index: {}", err)))
        })
    }

    /// Adds or replaces a voyage.
    pub fn insert(&mut self, record: VoyageRecord) -> ExhaustResult<()> {
        if record.end <= record.start {
            return Err(ExhaustError::InvalidConfig(format!(
                "voyage {} ends before it starts",
                record.voyage
            )));
        }
        self.records.insert(record.voyage.clone(), record);
        Ok(())
    }

    pub fn contains(&self, voyage: &str) -> bool {
        self.records.contains_key(voyage)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &VoyageRecord> {
        self.records.values()
    }

    /// Names of the voyages from the one spanning `start` through the one
    /// spanning `end`, in name order.
    pub fn voyages_for_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> ExhaustResult<Vec<String>> {
        let ordered: Vec<&VoyageRecord> = self.records.values().collect();
        let first = ordered
            .iter()
            .position(|r| r.spans(start))
            .ok_or_else(|| ExhaustError::VoyageNotFound(format!("start date {}", start)))?;
        let last = ordered
            .iter()
            .position(|r| r.spans(end))
            .ok_or_else(|| ExhaustError::VoyageNotFound(format!("end date {}", end)))?;
        if last < first {
            return Err(ExhaustError::InvalidConfig(format!(
                "end date {} falls in a voyage listed before the start date {}",
                end, start
            )));
        }
        Ok(ordered[first..=last]
            .iter()
            .map(|r| r.voyage.clone())
            .collect())
    }

    pub fn result_key(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> ExhaustResult<ResultKey> {
        let voyages = self.voyages_for_range(start, end)?;
        ResultKey::for_voyages(&voyages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn record(voyage: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> VoyageRecord {
        VoyageRecord {
            voyage: voyage.into(),
            start,
            end,
        }
    }

    fn index() -> VoyageIndex {
        let mut index = VoyageIndex::new();
        index
            .insert(record("in2016_v02", at(2016, 3, 1), at(2016, 4, 1)))
            .unwrap();
        index
            .insert(record("in2016_v03", at(2016, 5, 1), at(2016, 6, 1)))
            .unwrap();
        index
            .insert(record("in2016_v04", at(2016, 6, 5), at(2016, 7, 1)))
            .unwrap();
        index
    }

    #[test]
    fn range_inside_one_voyage() {
        let voyages = index().voyages_for_range(at(2016, 5, 6), at(2016, 5, 7)).unwrap();
        assert_eq!(voyages, vec!["in2016_v03"]);
    }

    #[test]
    fn range_across_voyages_is_contiguous() {
        let voyages = index().voyages_for_range(at(2016, 3, 10), at(2016, 6, 10)).unwrap();
        assert_eq!(voyages, vec!["in2016_v02", "in2016_v03", "in2016_v04"]);
    }

    #[test]
    fn port_period_is_not_found() {
        let err = index()
            .voyages_for_range(at(2016, 6, 2), at(2016, 6, 10))
            .unwrap_err();
        assert!(matches!(err, ExhaustError::VoyageNotFound(_)));
    }

    #[test]
    fn key_names_every_voyage() {
        let key = index().result_key(at(2016, 5, 20), at(2016, 6, 10)).unwrap();
        assert_eq!(key.as_str(), "exhaust_id_in2016_v03_in2016_v04");
    }

    #[test]
    fn inverted_voyage_is_rejected() {
        let mut index = VoyageIndex::new();
        assert!(index
            .insert(record("bad", at(2016, 2, 1), at(2016, 1, 1)))
            .is_err());
    }

    #[test]
    fn index_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voyage_date_index.csv");
        index().save(&path).unwrap();

        let restored = VoyageIndex::open(&path).unwrap();
        assert_eq!(restored.len(), 3);
        assert!(restored.contains("in2016_v04"));
        let first = restored.records().next().unwrap();
        assert_eq!(first.start, at(2016, 3, 1));
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = VoyageIndex::open(&dir.path().join("absent.csv")).unwrap();
        assert!(index.is_empty());
    }
}
