use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::prelude::{ExhaustError, ExhaustResult};
use crate::series::ExhaustLabel;
use crate::store::export::{self, ExportAttributes, StoredLabel};
use crate::store::key::ResultKey;
use crate::store::StagedFile;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{Counters, StoreMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Cached,
    Computed,
}

/// Result of [`ResultStore::load_or_compute`].
#[derive(Debug)]
pub struct LoadOutcome {
    pub label: ExhaustLabel,
    pub source: ResultSource,
    /// Set when a freshly computed label could not be saved. The label is
    /// still valid; only the cache entry is missing.
    pub persist_error: Option<ExhaustError>,
}

/// Directory of exhaust labels, one JSON dataset (plus an optional CSV
/// companion) per key.
///
/// Each dataset records the fingerprint it was computed under. A stored
/// label is only reused for a caller presenting the same fingerprint.
pub struct ResultStore {
    root: PathBuf,
    attributes: ExportAttributes,
    write_csv: bool,
    locks: Mutex<HashMap<ResultKey, Arc<Mutex<()>>>>,
    metrics: StoreMetrics,
    logger: LogManager,
}

impl ResultStore {
    /// Creates `root` if needed.
    pub fn open(root: impl Into<PathBuf>) -> ExhaustResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| {
            ExhaustError::Persistence(format!("creating store directory {}: {}", root.display(), err))
        })?;
        Ok(Self {
            root,
            attributes: ExportAttributes::default(),
            write_csv: true,
            locks: Mutex::new(HashMap::new()),
            metrics: StoreMetrics::new(),
            logger: LogManager::new("store"),
        })
    }

    pub fn with_attributes(mut self, attributes: ExportAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Whether to write the CSV companion next to each dataset.
    pub fn with_csv(mut self, write_csv: bool) -> Self {
        self.write_csv = write_csv;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_path(&self, key: &ResultKey) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    pub fn table_path(&self, key: &ResultKey) -> PathBuf {
        self.root.join(format!("{}.csv", key))
    }

    pub fn metrics(&self) -> Counters {
        self.metrics.snapshot()
    }

    /// `Ok(None)` when nothing is stored under `key`. The fingerprint is
    /// not checked.
    pub fn load(&self, key: &ResultKey) -> ExhaustResult<Option<ExhaustLabel>> {
        Ok(self.load_stored(key)?.map(|stored| stored.label))
    }

    /// The stored label for `key` along with its fingerprint.
    pub fn load_stored(&self, key: &ResultKey) -> ExhaustResult<Option<StoredLabel>> {
        let path = self.dataset_path(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(ExhaustError::Persistence(format!(
                    "opening {}: {}",
                    path.display(),
                    err
                )))
            }
        };
        export::read_dataset(BufReader::new(file)).map(Some)
    }

    /// Writes `label` under `key`, replacing any previous entry.
    pub fn save(&self, key: &ResultKey, fingerprint: &str, label: &ExhaustLabel) -> ExhaustResult<()> {
        let lock = self.key_lock(key)?;
        let result = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.write(key, fingerprint, label)
        };
        self.release_lock(key, lock);
        result
    }

    /// Returns the stored label for `key`, or runs `compute` and stores its
    /// result. Errors from `compute` are returned unchanged.
    ///
    /// The key stays locked for the whole call, so concurrent callers with
    /// the same key compute at most once. A stored entry that cannot be read,
    /// or that was written under a different `fingerprint`, counts as a
    /// miss. A failure to save is reported in the outcome rather than
    /// discarding the computed label.
    pub fn load_or_compute<F, E>(
        &self,
        key: &ResultKey,
        fingerprint: &str,
        force_reload: bool,
        compute: F,
    ) -> Result<LoadOutcome, E>
    where
        F: FnOnce() -> Result<ExhaustLabel, E>,
        E: From<ExhaustError>,
    {
        let lock = self.key_lock(key)?;
        let outcome = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.load_or_compute_locked(key, fingerprint, force_reload, compute)
        };
        self.release_lock(key, lock);
        outcome
    }

    fn load_or_compute_locked<F, E>(
        &self,
        key: &ResultKey,
        fingerprint: &str,
        force_reload: bool,
        compute: F,
    ) -> Result<LoadOutcome, E>
    where
        F: FnOnce() -> Result<ExhaustLabel, E>,
        E: From<ExhaustError>,
    {
        if force_reload {
            self.logger
                .record(&format!("forced reload of {}, ignoring stored result", key));
        } else {
            match self.load_stored(key) {
                Ok(Some(stored)) if stored.fingerprint.as_deref() == Some(fingerprint) => {
                    self.metrics.record_hit();
                    self.logger.record(&format!(
                        "loaded exhaust id from {}",
                        self.dataset_path(key).display()
                    ));
                    return Ok(LoadOutcome {
                        label: stored.label,
                        source: ResultSource::Cached,
                        persist_error: None,
                    });
                }
                Ok(Some(_)) => {
                    self.metrics.record_stale();
                    self.logger.record(&format!(
                        "stored result for {} was made with other settings or inputs, recomputing",
                        key
                    ));
                }
                Ok(None) => {}
                Err(err) => {
                    self.metrics.record_read_failure();
                    self.logger
                        .warn(&format!("stored result for {} unreadable, recomputing: {}", key, err));
                }
            }
        }

        self.metrics.record_computation();
        self.logger
            .record(&format!("creating exhaust id for {}", key));
        let label = compute()?;

        let persist_error = match self.write(key, fingerprint, &label) {
            Ok(()) => {
                self.logger
                    .record(&format!("saved exhaust id to {}", self.root.display()));
                None
            }
            Err(err) => {
                self.metrics.record_write_failure();
                self.logger
                    .warn(&format!("could not save exhaust id for {}: {}", key, err));
                Some(err)
            }
        };

        Ok(LoadOutcome {
            label,
            source: ResultSource::Computed,
            persist_error,
        })
    }

    fn key_lock(&self, key: &ResultKey) -> ExhaustResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| ExhaustError::Persistence("store lock table poisoned".into()))?;
        Ok(locks.entry(key.clone()).or_default().clone())
    }

    /// Drops the table entry once `lock` is the last handle outside it.
    /// Handles are only cloned under the table lock, so the count is exact.
    fn release_lock(&self, key: &ResultKey, lock: Arc<Mutex<()>>) {
        if let Ok(mut locks) = self.locks.lock() {
            if Arc::strong_count(&lock) == 2 {
                locks.remove(key);
            }
        }
    }

    /// Both files are encoded before either is replaced. The CSV goes in
    /// first and is removed again if the dataset cannot follow it.
    fn write(&self, key: &ResultKey, fingerprint: &str, label: &ExhaustLabel) -> ExhaustResult<()> {
        let dataset = StagedFile::stage(&self.dataset_path(key), |writer| {
            export::write_dataset(label, &self.attributes, fingerprint, writer)
        })?;
        if !self.write_csv {
            return dataset.commit();
        }

        let table_path = self.table_path(key);
        StagedFile::stage(&table_path, |writer| export::write_csv(label, writer))?.commit()?;
        dataset.commit().map_err(|err| {
            if let Err(remove_err) = fs::remove_file(&table_path) {
                self.logger.warn(&format!(
                    "could not remove {} after failed save: {}",
                    table_path.display(),
                    remove_err
                ));
            }
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn label(flags: &[bool]) -> ExhaustLabel {
        let timestamps = (0..flags.len()).map(|i| 1_000.0 + i as f64).collect();
        ExhaustLabel::new(timestamps, flags.to_vec()).unwrap()
    }

    fn computed(flags: &[bool]) -> impl FnOnce() -> ExhaustResult<ExhaustLabel> {
        let label = label(flags);
        move || Ok(label)
    }

    const SETTINGS: &str = "filter_window=301";

    fn key() -> ResultKey {
        ResultKey::for_voyages(&["in2016_v03"]).unwrap()
    }

    #[test]
    fn second_call_is_served_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        let calls = AtomicUsize::new(0);
        let compute = || -> ExhaustResult<ExhaustLabel> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(label(&[false, true, true]))
        };

        let first = store.load_or_compute(&key(), SETTINGS, false, compute).unwrap();
        let second = store.load_or_compute(&key(), SETTINGS, false, compute).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.source, ResultSource::Computed);
        assert_eq!(second.source, ResultSource::Cached);
        assert_eq!(first.label, second.label);
        assert!(store.table_path(&key()).exists());
    }

    #[test]
    fn forced_reload_always_computes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store.save(&key(), SETTINGS, &label(&[false])).unwrap();

        let outcome = store
            .load_or_compute(&key(), SETTINGS, true, computed(&[true, true]))
            .unwrap();
        assert_eq!(outcome.source, ResultSource::Computed);
        assert_eq!(store.load(&key()).unwrap().unwrap(), label(&[true, true]));
        assert_eq!(store.metrics().computations, 1);
    }

    #[test]
    fn unreadable_entry_falls_back_to_compute() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        std::fs::write(store.dataset_path(&key()), "not json").unwrap();

        let outcome = store
            .load_or_compute(&key(), SETTINGS, false, computed(&[true]))
            .unwrap();
        assert_eq!(outcome.source, ResultSource::Computed);
        assert!(outcome.persist_error.is_none());
        assert_eq!(store.metrics().read_failures, 1);
        assert_eq!(store.load(&key()).unwrap().unwrap(), label(&[true]));
    }

    #[test]
    fn write_failure_still_returns_label() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let store = ResultStore::open(&root).unwrap();
        std::fs::remove_dir_all(&root).unwrap();

        let outcome = store
            .load_or_compute(&key(), SETTINGS, false, computed(&[false, true]))
            .unwrap();
        assert_eq!(outcome.label, label(&[false, true]));
        assert!(matches!(outcome.persist_error, Some(ExhaustError::Persistence(_))));
        assert_eq!(store.metrics().write_failures, 1);
    }

    #[test]
    fn compute_errors_propagate_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        let err = store
            .load_or_compute(&key(), SETTINGS, false, || -> ExhaustResult<ExhaustLabel> {
                Err(ExhaustError::MissingSignal("cn".into()))
            })
            .unwrap_err();
        assert!(matches!(err, ExhaustError::MissingSignal(_)));
        assert!(store.load(&key()).unwrap().is_none());
    }

    #[test]
    fn distinct_keys_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap().with_csv(false);
        let other = ResultKey::for_voyages(&["in2016_v03", "in2016_v04"]).unwrap();
        store.save(&key(), SETTINGS, &label(&[true])).unwrap();
        store.save(&other, SETTINGS, &label(&[false, false])).unwrap();
        assert_eq!(store.load(&key()).unwrap().unwrap().len(), 1);
        assert_eq!(store.load(&other).unwrap().unwrap().len(), 2);
        assert!(!store.table_path(&other).exists());
    }

    #[test]
    fn concurrent_callers_compute_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ResultStore::open(dir.path()).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let calls = calls.clone();
                std::thread::spawn(move || {
                    store
                        .load_or_compute(&key(), SETTINGS, false, || -> ExhaustResult<ExhaustLabel> {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(label(&[true, false]))
                        })
                        .map(|outcome| outcome.label)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), label(&[true, false]));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn changed_fingerprint_invalidates_stored_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store
            .load_or_compute(&key(), SETTINGS, false, computed(&[true, true, true]))
            .unwrap();

        let narrower = store
            .load_or_compute(&key(), "filter_window=1", false, computed(&[false, true, false]))
            .unwrap();
        assert_eq!(narrower.source, ResultSource::Computed);
        assert_eq!(narrower.label, label(&[false, true, false]));
        assert_eq!(store.metrics().stale_entries, 1);

        let stored = store.load_stored(&key()).unwrap().unwrap();
        assert_eq!(stored.fingerprint.as_deref(), Some("filter_window=1"));

        let again = store
            .load_or_compute(&key(), "filter_window=1", false, computed(&[true]))
            .unwrap();
        assert_eq!(again.source, ResultSource::Cached);
        assert_eq!(again.label, label(&[false, true, false]));
    }

    #[test]
    fn failed_companion_write_keeps_previous_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap().with_csv(false);
        store.save(&key(), SETTINGS, &label(&[true])).unwrap();

        // a directory cannot be replaced by the renamed CSV
        let store = store.with_csv(true);
        std::fs::create_dir(store.table_path(&key())).unwrap();
        let outcome = store
            .load_or_compute(&key(), "filter_window=1", false, computed(&[false, false]))
            .unwrap();

        assert!(matches!(outcome.persist_error, Some(ExhaustError::Persistence(_))));
        let stored = store.load_stored(&key()).unwrap().unwrap();
        assert_eq!(stored.label, label(&[true]));
        assert_eq!(stored.fingerprint.as_deref(), Some(SETTINGS));
    }

    #[test]
    fn lock_table_is_emptied_after_use() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        for voyage in ["in2016_v03", "in2016_v04", "in2016_v05"] {
            let key = ResultKey::for_voyages(&[voyage]).unwrap();
            store
                .load_or_compute(&key, SETTINGS, false, computed(&[true]))
                .unwrap();
        }
        store.save(&key(), SETTINGS, &label(&[false])).unwrap();
        assert!(store.locks.lock().unwrap().is_empty());
    }
}
