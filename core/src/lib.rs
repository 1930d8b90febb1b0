//! Exhaust-contamination detection for ship-borne atmospheric time series.
//!
//! Independently sampled instrument series are outer-joined onto one axis,
//! screened by per-signal sub-detectors (rolling standard deviation for CO
//! and particle counts, a concentration limit for black carbon), dilated,
//! OR-combined into one `exhaust` flag, and cached per voyage on disk.

pub mod math;
pub mod prelude;
pub mod processing;
pub mod series;
pub mod store;
pub mod telemetry;

pub use prelude::{ExhaustConfig, ExhaustError, ExhaustResult, SubDetector};
pub use processing::{detect, DetectionReport, ExhaustDetector};
pub use series::{AlignedFrame, ExhaustLabel, FlagSeries, TimeSeries, TimeSeriesAligner};
pub use store::{LoadOutcome, ResultKey, ResultSource, ResultStore, VoyageIndex};
