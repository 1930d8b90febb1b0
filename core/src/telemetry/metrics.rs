use std::sync::Mutex;

/// Counters describing how the result store served requests.
pub struct StoreMetrics {
    inner: Mutex<Counters>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub cache_hits: usize,
    pub computations: usize,
    /// Entries skipped because they were written under another fingerprint.
    pub stale_entries: usize,
    pub read_failures: usize,
    pub write_failures: usize,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters::default()),
        }
    }

    pub fn record_hit(&self) {
        self.update(|c| c.cache_hits += 1);
    }

    pub fn record_computation(&self) {
        self.update(|c| c.computations += 1);
    }

    pub fn record_stale(&self) {
        self.update(|c| c.stale_entries += 1);
    }

    pub fn record_read_failure(&self) {
        self.update(|c| c.read_failures += 1);
    }

    pub fn record_write_failure(&self) {
        self.update(|c| c.write_failures += 1);
    }

    pub fn snapshot(&self) -> Counters {
        if let Ok(counters) = self.inner.lock() {
            *counters
        } else {
            Counters::default()
        }
    }

    fn update(&self, apply: impl FnOnce(&mut Counters)) {
        if let Ok(mut counters) = self.inner.lock() {
            apply(&mut counters);
        }
    }
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}
