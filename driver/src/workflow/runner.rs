use std::fs;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use anyhow::{bail, Context};
use exhaustcore::series::{epoch_seconds, AlignedFrame, TimeSeries, TimeSeriesAligner};
use exhaustcore::store::{ResultKey, ResultSource, ResultStore, VoyageIndex};
use exhaustcore::{ExhaustDetector, ExhaustLabel};
use log::{info, warn};

use crate::generator::profile::build_synthetic_voyage;
use crate::workflow::config::{DateRange, WorkflowConfig};
use crate::workflow::input::load_series;

pub struct WorkflowResult {
    pub key: ResultKey,
    pub samples: usize,
    pub flagged: usize,
    pub source: ResultSource,
    pub dataset_path: PathBuf,
    /// Why the result could not be cached, if it could not.
    pub persist_error: Option<String>,
}

impl WorkflowResult {
    /// One-line report of what was produced and whether it was cached.
    pub fn summary(&self) -> String {
        let source = match self.source {
            ResultSource::Cached => "loaded from store",
            ResultSource::Computed => "computed",
        };
        let mut line = format!(
            "{} -> samples {}, exhaust {} ({:.1}%), {}",
            self.key,
            self.samples,
            self.flagged,
            100.0 * self.flagged as f64 / self.samples.max(1) as f64,
            source
        );
        if let Some(err) = &self.persist_error {
            line.push_str(&format!(", not cached: {}", err));
        }
        line
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        let range = self.config.date_range()?;
        let key = self.result_key(range.as_ref())?;
        let store = ResultStore::open(&self.config.store_dir)
            .with_context(|| format!("opening result store {}", self.config.store_dir.display()))?
            .with_csv(self.config.write_csv);

        let fingerprint = self.fingerprint(range.as_ref())?;
        let detector_config = &self.config.detector;
        let outcome = store.load_or_compute(
            &key,
            &fingerprint,
            detector_config.force_reload,
            || -> anyhow::Result<ExhaustLabel> {
                let detector = ExhaustDetector::from_config(detector_config)
                    .context("configuring exhaust detector")?;
                let frame = self.build_frame(range.as_ref())?;
                let report = detector.detect(&frame).context("identifying exhaust")?;
                report
                    .into_label(detector_config.abridged)
                    .context("assembling exhaust label")
            },
        )?;

        Ok(WorkflowResult {
            samples: outcome.label.len(),
            flagged: outcome.label.count_flagged(),
            source: outcome.source,
            dataset_path: store.dataset_path(&key),
            persist_error: outcome.persist_error.map(|err| err.to_string()),
            key,
        })
    }

    fn result_key(&self, range: Option<&DateRange>) -> anyhow::Result<ResultKey> {
        match (range, &self.config.voyage_index, &self.config.synthetic) {
            (Some(range), Some(index_path), _) => {
                let index = VoyageIndex::open(index_path)
                    .with_context(|| format!("opening voyage index {}", index_path.display()))?;
                let voyages = index
                    .voyages_for_range(range.start, range.end)
                    .context("looking up voyages for date range")?;
                info!("date range spans voyages {:?}", voyages);
                Ok(ResultKey::for_voyages(&voyages)?)
            }
            (Some(range), None, _) => Ok(ResultKey::for_range(
                range.start.date_naive(),
                range.end.date_naive(),
            )),
            (None, _, Some(generator)) => Ok(ResultKey::new(&format!(
                "exhaust_id_synthetic_{}",
                generator.seed
            ))?),
            (None, _, None) => bail!("a start and end date are required to identify the result"),
        }
    }

    /// Everything the label depends on besides its key: detector settings,
    /// the requested range, and the synthetic generator or each input table
    /// with its modification time.
    fn fingerprint(&self, range: Option<&DateRange>) -> anyhow::Result<String> {
        let mut parts = vec![self.config.detector.fingerprint()];
        if let Some(range) = range {
            parts.push(format!(
                "range={}..{}",
                range.start.to_rfc3339(),
                range.end.to_rfc3339()
            ));
        }
        match &self.config.synthetic {
            Some(generator) => {
                let described =
                    serde_yaml::to_string(generator).context("describing synthetic generator")?;
                parts.push(format!("synthetic={}", described.trim_end()));
            }
            None => {
                for (name, table) in &self.config.inputs {
                    let modified = fs::metadata(&table.path)
                        .and_then(|meta| meta.modified())
                        .with_context(|| format!("reading modification time of {}", table.path.display()))?;
                    let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
                    parts.push(format!(
                        "{}={}@{}.{:09};resample={:?}",
                        name,
                        table.path.display(),
                        since_epoch.as_secs(),
                        since_epoch.subsec_nanos(),
                        table.resample_seconds
                    ));
                }
            }
        }
        Ok(parts.join("|"))
    }

    fn build_frame(&self, range: Option<&DateRange>) -> anyhow::Result<AlignedFrame> {
        let mut series: Vec<(String, TimeSeries)> = match &self.config.synthetic {
            Some(generator) => {
                info!("generating synthetic underway record (seed {})", generator.seed);
                build_synthetic_voyage(generator)?.series
            }
            None => {
                if self.config.inputs.is_empty() {
                    bail!("no input tables configured");
                }
                let mut loaded = Vec::with_capacity(self.config.inputs.len());
                for (name, table) in &self.config.inputs {
                    info!("loading {} data from {}", name, table.path.display());
                    let mut data = load_series(&table.path)?;
                    if let Some(step) = table.resample_seconds {
                        data = data
                            .resample_linear(step)
                            .with_context(|| format!("resampling {} to {} s", name, step))?;
                    }
                    loaded.push((name.clone(), data));
                }
                loaded
            }
        };

        if let Some(range) = range {
            let (start, end) = (epoch_seconds(range.start), epoch_seconds(range.end));
            for (name, data) in series.iter_mut() {
                *data = data.slice(start, end);
                if data.is_empty() {
                    warn!("{} has no samples between {} and {}", name, range.start, range.end);
                }
            }
        }

        TimeSeriesAligner::align(series).context("aligning input series")
    }
}
