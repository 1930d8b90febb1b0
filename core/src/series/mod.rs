pub mod frame;
pub mod label;
pub mod timeseries;

pub use frame::{AlignedFrame, TimeSeriesAligner};
pub use label::ExhaustLabel;
pub use timeseries::{epoch_seconds, FlagSeries, TimeSeries, Timestamp};

/// Signal names understood by the built-in sub-detectors.
pub mod signals {
    /// Carbon-monoxide mixing ratio.
    pub const CO: &str = "co";
    /// Condensation-nuclei (particle) number concentration.
    pub const CN: &str = "cn";
    /// Black-carbon mass concentration.
    pub const BC: &str = "bc";
}
