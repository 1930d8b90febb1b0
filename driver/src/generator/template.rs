use std::f64::consts::PI;

/// Raised-cosine weight for sample `index` of a plume `length` samples long:
/// 0 at both ends, 1 in the middle.
pub fn plume_envelope(index: usize, length: usize) -> f64 {
    if length < 2 {
        return 1.0;
    }
    let phase = index as f64 / (length - 1) as f64;
    0.5 * (1.0 - (2.0 * PI * phase).cos())
}

/// Slow diurnal-like drift around zero with the given period in samples.
pub fn background_drift(index: usize, period: usize) -> f64 {
    if period == 0 {
        return 0.0;
    }
    (2.0 * PI * index as f64 / period as f64).sin()
}
