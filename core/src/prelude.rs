use serde::{Deserialize, Serialize};

use crate::series::{AlignedFrame, FlagSeries, TimeSeries};

/// Detector parameters, one field per knob exposed to callers.
///
/// Window sizes are sample counts over the aligned axis, never durations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExhaustConfig {
    pub co_id: bool,
    pub cn_id: bool,
    pub bc_id: bool,
    pub filter_window: usize,
    pub co_stat_window: usize,
    pub co_stat_threshold: f64,
    pub cn_stat_window: usize,
    pub cn_stat_threshold: f64,
    pub bc_lim: f64,
    pub force_reload: bool,
    /// Keep only the `exhaust` column when persisting.
    pub abridged: bool,
}

impl Default for ExhaustConfig {
    fn default() -> Self {
        Self {
            co_id: true,
            cn_id: true,
            bc_id: true,
            filter_window: 60 * 10,
            co_stat_window: 10,
            co_stat_threshold: 0.245,
            cn_stat_window: 10,
            cn_stat_threshold: 50.0,
            bc_lim: 0.07001,
            force_reload: false,
            abridged: true,
        }
    }
}

impl ExhaustConfig {
    /// Canonical text of every setting that changes the stored label.
    /// `force_reload` only steers the cache and is left out.
    pub fn fingerprint(&self) -> String {
        format!(
            "co_id={};cn_id={};bc_id={};filter_window={};co_stat_window={};co_stat_threshold={};\
             cn_stat_window={};cn_stat_threshold={};bc_lim={};abridged={}",
            self.co_id,
            self.cn_id,
            self.bc_id,
            self.filter_window,
            self.co_stat_window,
            self.co_stat_threshold,
            self.cn_stat_window,
            self.cn_stat_threshold,
            self.bc_lim,
            self.abridged
        )
    }

    pub fn validate(&self) -> ExhaustResult<()> {
        if self.filter_window == 0 {
            return Err(ExhaustError::InvalidConfig(
                "filter_window must be at least 1 sample".into(),
            ));
        }
        let windows = [
            (self.co_id, "co_stat_window", self.co_stat_window),
            (self.cn_id, "cn_stat_window", self.cn_stat_window),
        ];
        for (active, name, window) in windows {
            if active && window == 0 {
                return Err(ExhaustError::InvalidConfig(format!(
                    "{} must be at least 1 sample",
                    name
                )));
            }
        }
        let thresholds = [
            (self.co_id, "co_stat_threshold", self.co_stat_threshold),
            (self.cn_id, "cn_stat_threshold", self.cn_stat_threshold),
            (self.bc_id, "bc_lim", self.bc_lim),
        ];
        for (active, name, value) in thresholds {
            if active && !value.is_finite() {
                return Err(ExhaustError::InvalidConfig(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Common error type for alignment, detection and persistence.
#[derive(thiserror::Error, Debug)]
pub enum ExhaustError {
    #[error("alignment error: {0}")]
    Alignment(String),
    #[error("signal `{0}` is not present in the aligned frame")]
    MissingSignal(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("no voyage covers {0}")]
    VoyageNotFound(String),
}

pub type ExhaustResult<T> = Result<T, ExhaustError>;

/// What a sub-detector produced for one run.
#[derive(Debug, Clone)]
pub struct SubDetectorTrace {
    pub name: String,
    /// Rolling statistic, absent for direct-threshold detectors.
    pub statistic: Option<TimeSeries>,
    /// Dilated flags.
    pub flags: FlagSeries,
}

/// One signal-specific classifier feeding the OR-combination.
///
/// Implementations hold no mutable state, so a single detector may be
/// shared across threads as long as each call gets its own frame.
pub trait SubDetector: Send + Sync {
    fn name(&self) -> &str;
    fn signal(&self) -> &str;
    fn run(&self, frame: &AlignedFrame) -> ExhaustResult<SubDetectorTrace>;
}
