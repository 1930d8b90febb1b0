pub mod classifier;
pub mod detector;
pub mod dilation;
pub mod rolling;

pub use classifier::{classify, ThresholdClassifier};
pub use detector::{detect, AbsoluteThresholdDetector, DetectionReport, ExhaustDetector, RollingStdDetector};
pub use dilation::{dilate, WindowDilator};
pub use rolling::{rolling_std, RollingStatistic};
