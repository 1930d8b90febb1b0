use crate::prelude::{ExhaustConfig, ExhaustError, ExhaustResult, SubDetector, SubDetectorTrace};
use crate::processing::classifier::ThresholdClassifier;
use crate::processing::dilation::WindowDilator;
use crate::processing::rolling::RollingStatistic;
use crate::series::{signals, AlignedFrame, ExhaustLabel, FlagSeries};
use crate::telemetry::log::LogManager;

/// Flags a signal whose rolling standard deviation exceeds a threshold.
pub struct RollingStdDetector {
    signal: String,
    statistic: RollingStatistic,
    classifier: ThresholdClassifier,
    dilator: WindowDilator,
}

impl RollingStdDetector {
    pub fn new(signal: impl Into<String>, stat_window: usize, threshold: f64, filter_window: usize) -> Self {
        Self {
            signal: signal.into(),
            statistic: RollingStatistic::centered(stat_window),
            classifier: ThresholdClassifier::new(threshold),
            dilator: WindowDilator::new(filter_window),
        }
    }
}

impl SubDetector for RollingStdDetector {
    fn name(&self) -> &str {
        &self.signal
    }

    fn signal(&self) -> &str {
        &self.signal
    }

    fn run(&self, frame: &AlignedFrame) -> ExhaustResult<SubDetectorTrace> {
        let series = frame.signal(&self.signal)?;
        let statistic = self.statistic.std(&series);
        let raw = self.classifier.classify(&statistic);
        let flags = self.dilator.dilate(&raw);
        Ok(SubDetectorTrace {
            name: self.signal.clone(),
            statistic: Some(statistic),
            flags,
        })
    }
}

/// Flags a signal directly against a concentration limit.
pub struct AbsoluteThresholdDetector {
    signal: String,
    classifier: ThresholdClassifier,
    dilator: WindowDilator,
}

impl AbsoluteThresholdDetector {
    pub fn new(signal: impl Into<String>, limit: f64, filter_window: usize) -> Self {
        Self {
            signal: signal.into(),
            classifier: ThresholdClassifier::new(limit),
            dilator: WindowDilator::new(filter_window),
        }
    }
}

impl SubDetector for AbsoluteThresholdDetector {
    fn name(&self) -> &str {
        &self.signal
    }

    fn signal(&self) -> &str {
        &self.signal
    }

    fn run(&self, frame: &AlignedFrame) -> ExhaustResult<SubDetectorTrace> {
        let series = frame.signal(&self.signal)?;
        let raw = self.classifier.classify(&series);
        let flags = self.dilator.dilate(&raw);
        Ok(SubDetectorTrace {
            name: self.signal.clone(),
            statistic: None,
            flags,
        })
    }
}

/// Outcome of one detection run.
#[derive(Debug, Clone)]
pub struct DetectionReport {
    pub exhaust: FlagSeries,
    pub traces: Vec<SubDetectorTrace>,
}

impl DetectionReport {
    pub fn flagged(&self) -> usize {
        self.exhaust.count_flagged()
    }

    /// Converts to the persisted form. Unless `abridged`, each trace adds a
    /// `<name>_std` column (rolling detectors only) and a `<name>_flag`
    /// column holding 0 or 1.
    pub fn into_label(self, abridged: bool) -> ExhaustResult<ExhaustLabel> {
        let timestamps = self.exhaust.timestamps().to_vec();
        let mut label = ExhaustLabel::new(timestamps, self.exhaust.into_flags())?;
        if abridged {
            return Ok(label);
        }
        for trace in self.traces {
            if let Some(statistic) = &trace.statistic {
                let values = statistic
                    .values()
                    .iter()
                    .map(|v| v.is_finite().then_some(*v))
                    .collect();
                label = label.with_diagnostic(format!("{}_std", trace.name), values)?;
            }
            let flags = trace
                .flags
                .flags()
                .iter()
                .map(|&f| Some(if f { 1.0 } else { 0.0 }))
                .collect();
            label = label.with_diagnostic(format!("{}_flag", trace.name), flags)?;
        }
        Ok(label)
    }
}

/// Runs every configured sub-detector and OR-combines their flags.
pub struct ExhaustDetector {
    detectors: Vec<Box<dyn SubDetector>>,
    logger: LogManager,
}

impl ExhaustDetector {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
            logger: LogManager::new("detector"),
        }
    }

    /// Builds the CO, CN and BC sub-detectors enabled in `config`.
    pub fn from_config(config: &ExhaustConfig) -> ExhaustResult<Self> {
        config.validate()?;
        let mut detector = Self::new();
        if config.co_id {
            detector.push(RollingStdDetector::new(
                signals::CO,
                config.co_stat_window,
                config.co_stat_threshold,
                config.filter_window,
            ));
        }
        if config.cn_id {
            detector.push(RollingStdDetector::new(
                signals::CN,
                config.cn_stat_window,
                config.cn_stat_threshold,
                config.filter_window,
            ));
        }
        if config.bc_id {
            detector.push(AbsoluteThresholdDetector::new(
                signals::BC,
                config.bc_lim,
                config.filter_window,
            ));
        }
        Ok(detector)
    }

    pub fn push<D: SubDetector + 'static>(&mut self, detector: D) {
        self.detectors.push(Box::new(detector));
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// With no sub-detectors every sample comes out clean.
    pub fn detect(&self, frame: &AlignedFrame) -> ExhaustResult<DetectionReport> {
        if let Some(missing) = self
            .detectors
            .iter()
            .find(|d| !frame.contains(d.signal()))
        {
            return Err(ExhaustError::MissingSignal(missing.signal().to_string()));
        }

        self.logger.record(&format!(
            "identifying exhaust over {} samples with {} sub-detectors",
            frame.len(),
            self.detectors.len()
        ));

        let mut exhaust = FlagSeries::cleared(frame.axis().clone());
        let mut traces = Vec::with_capacity(self.detectors.len());
        for detector in &self.detectors {
            let trace = detector.run(frame)?;
            exhaust.or_assign(&trace.flags)?;
            self.logger.detail(&format!(
                "{} flagged {} samples",
                detector.name(),
                trace.flags.count_flagged()
            ));
            traces.push(trace);
        }

        self.logger.record(&format!(
            "exhaust flagged {} of {} samples",
            exhaust.count_flagged(),
            exhaust.len()
        ));
        Ok(DetectionReport { exhaust, traces })
    }
}

impl Default for ExhaustDetector {
    fn default() -> Self {
        Self::new()
    }
}

pub fn detect(frame: &AlignedFrame, config: &ExhaustConfig) -> ExhaustResult<DetectionReport> {
    ExhaustDetector::from_config(config)?.detect(frame)
}
