use std::ops::Range;

use anyhow::{ensure, Context};
use exhaustcore::series::{signals, TimeSeries, Timestamp};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::template::{background_drift, plume_envelope};

/// Configuration for a synthetic underway record with exhaust plumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Epoch seconds of the first sample.
    pub start: Timestamp,
    pub duration_seconds: usize,
    /// Native black-carbon sampling interval; CO and CN sample every second.
    pub bc_interval_seconds: usize,
    /// Grid every generated series is resampled onto before alignment.
    pub resample_seconds: f64,
    pub plume_count: usize,
    pub plume_seconds: usize,
    pub noise: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            // 2016-05-06T00:00:00Z
            start: 1_462_492_800.0,
            duration_seconds: 6 * 3600,
            bc_interval_seconds: 5,
            resample_seconds: 1.0,
            plume_count: 4,
            plume_seconds: 120,
            noise: 1.0,
            seed: 0,
        }
    }
}

/// Generated series plus the plume intervals they contain.
pub struct SyntheticVoyage {
    pub series: Vec<(String, TimeSeries)>,
    pub plumes: Vec<Range<Timestamp>>,
}

fn plume_offsets(config: &GeneratorConfig, rng: &mut StdRng) -> Vec<usize> {
    let slots = config.duration_seconds / config.plume_count.max(1);
    (0..config.plume_count)
        .map(|slot| {
            let slack = slots.saturating_sub(config.plume_seconds).max(1);
            slot * slots + rng.gen_range(0..slack)
        })
        .collect()
}

pub fn build_synthetic_voyage(config: &GeneratorConfig) -> anyhow::Result<SyntheticVoyage> {
    ensure!(config.duration_seconds > 1, "synthetic record needs at least two samples");
    ensure!(config.bc_interval_seconds > 0, "bc interval must be positive");
    ensure!(
        config.plume_count * config.plume_seconds < config.duration_seconds,
        "plumes do not fit in the synthetic record"
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let offsets = plume_offsets(config, &mut rng);
    let in_plume = |second: usize| {
        offsets
            .iter()
            .find(|&&start| second >= start && second < start + config.plume_seconds)
            .map(|&start| plume_envelope(second - start, config.plume_seconds))
    };

    let timestamps: Vec<Timestamp> = (0..config.duration_seconds)
        .map(|s| config.start + s as f64)
        .collect();

    let mut co = Vec::with_capacity(config.duration_seconds);
    let mut cn = Vec::with_capacity(config.duration_seconds);
    for second in 0..config.duration_seconds {
        let drift = background_drift(second, 3600);
        let mut co_value = 0.06 + 0.01 * drift + rng.gen_range(-0.01..0.01) * config.noise;
        let mut cn_value = 300.0 + 20.0 * drift + rng.gen_range(-5.0..5.0) * config.noise;
        if let Some(weight) = in_plume(second) {
            co_value += weight * rng.gen_range(0.0..2.0);
            cn_value += weight * rng.gen_range(0.0..5000.0);
        }
        co.push(co_value);
        cn.push(cn_value);
    }

    let (bc_times, bc): (Vec<Timestamp>, Vec<f64>) = (0..config.duration_seconds)
        .step_by(config.bc_interval_seconds)
        .map(|second| {
            let mut value = 0.02 + rng.gen_range(-0.005..0.005) * config.noise;
            if let Some(weight) = in_plume(second) {
                value += 0.3 * weight;
            }
            (config.start + second as f64, value)
        })
        .unzip();

    let raw = vec![
        (signals::CO, TimeSeries::new(timestamps.clone(), co)?),
        (signals::CN, TimeSeries::new(timestamps, cn)?),
        (signals::BC, TimeSeries::new(bc_times, bc)?),
    ];
    let series = raw
        .into_iter()
        .map(|(name, series)| {
            series
                .resample_linear(config.resample_seconds)
                .map(|resampled| (name.to_string(), resampled))
                .with_context(|| format!("resampling synthetic {}", name))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let plumes = offsets
        .iter()
        .map(|&start| {
            let begin = config.start + start as f64;
            begin..begin + config.plume_seconds as f64
        })
        .collect();

    Ok(SyntheticVoyage { series, plumes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_emits_three_signals_on_one_second_grid() {
        let config = GeneratorConfig {
            duration_seconds: 600,
            plume_count: 2,
            plume_seconds: 60,
            ..Default::default()
        };
        let voyage = build_synthetic_voyage(&config).unwrap();
        let names: Vec<&str> = voyage.series.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["co", "cn", "bc"]);
        assert_eq!(voyage.series[0].1.len(), 600);
        // bc samples every 5 s up to 595 s, then resampled to 1 s
        assert_eq!(voyage.series[2].1.len(), 596);
        assert_eq!(voyage.plumes.len(), 2);
    }

    #[test]
    fn same_seed_reproduces_series() {
        let config = GeneratorConfig {
            duration_seconds: 300,
            plume_count: 1,
            plume_seconds: 30,
            seed: 7,
            ..Default::default()
        };
        let first = build_synthetic_voyage(&config).unwrap();
        let second = build_synthetic_voyage(&config).unwrap();
        assert_eq!(first.series, second.series);
    }

    #[test]
    fn oversized_plumes_are_rejected() {
        let config = GeneratorConfig {
            duration_seconds: 100,
            plume_count: 2,
            plume_seconds: 60,
            ..Default::default()
        };
        assert!(build_synthetic_voyage(&config).is_err());
    }
}
