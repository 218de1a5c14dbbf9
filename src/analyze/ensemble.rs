//! Monte-Carlo uncertainty ensemble.
//!
//! Five binary "elevated" dimensions are drawn per trial from probabilities
//! derived from the sample. The set of elevated dimensions maps to a risk
//! bucket through a fixed 32-entry table built from the bucket weights and
//! edges. The bucket frequencies give a distribution over the five levels;
//! its Shannon entropy turns into the assessment's confidence.
//!
//! A fixed seed makes the whole thing reproducible.

use std::time::Instant;

use metrics::histogram;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::assessment::RiskLevel;
use crate::config::{DimensionShapes, EnsembleConfig, PhysicsConfig};

use super::physics::hour_in_window;
use crate::error::EngineError;
use crate::weather::WeatherSample;

const TEMPERATURE: u8 = 1 << 0;
const MOISTURE: u8 = 1 << 1;
const WIND_CHILL: u8 = 1 << 2;
const PRECIPITATION: u8 = 1 << 3;
const TIME_OF_DAY: u8 = 1 << 4;

/// Number of buckets (= risk levels).
pub const BUCKETS: usize = 5;

/// Per-dimension probability of being elevated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub temperature: f64,
    pub moisture: f64,
    pub wind_chill: f64,
    pub precipitation: f64,
    pub time_of_day: f64,
}

impl Dimensions {
    pub fn from_sample(s: &WeatherSample, shape: &DimensionShapes, windows: &DayWindows) -> Self {
        let t = s.surface_temperature_c.unwrap_or(s.temperature_c);
        let temperature = shape.temperature_p_min
            + (shape.temperature_p_max - shape.temperature_p_min)
                * ((shape.temperature_unlikely_c - t)
                    / (shape.temperature_unlikely_c - shape.temperature_certain_c))
                    .clamp(0.0, 1.0);

        let floor = shape.moisture_humidity_floor_pct;
        let humid = ((s.humidity_pct - floor) / (100.0 - floor)).clamp(0.0, 1.0);
        let converged = (1.0 - s.dew_point_spread_c() / shape.moisture_spread_zero_c).clamp(0.0, 1.0);
        let moisture = humid.max(converged);

        let wind_chill = ((shape.wind_chill_zero_c - s.wind_chill_c())
            / (shape.wind_chill_zero_c - shape.wind_chill_certain_c))
            .clamp(0.0, 1.0);

        let precipitation = s
            .precipitation_probability_pct
            .map(|p| p / 100.0)
            .unwrap_or(0.0)
            .max((s.recent_precipitation_mm / shape.precipitation_certain_mm).min(1.0));

        let hour = s.local_hour();
        let time_of_day = if windows.overnight(hour) {
            shape.overnight_p
        } else if windows.night(hour) {
            shape.night_p
        } else {
            shape.day_p
        };

        Self {
            temperature,
            moisture,
            wind_chill,
            precipitation,
            time_of_day,
        }
    }
}

/// Night and overnight hour windows, shared with the physics model so both
/// agree on what time of day a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindows {
    pub night: (u32, u32),
    pub overnight: (u32, u32),
}

impl DayWindows {
    pub fn night(&self, hour: u32) -> bool {
        hour_in_window(hour, self.night.0, self.night.1)
    }

    pub fn overnight(&self, hour: u32) -> bool {
        hour_in_window(hour, self.overnight.0, self.overnight.1)
    }
}

impl From<&PhysicsConfig> for DayWindows {
    fn from(c: &PhysicsConfig) -> Self {
        Self {
            night: (c.night_start_hour, c.night_end_hour),
            overnight: (c.overnight_start_hour, c.overnight_end_hour),
        }
    }
}

impl Default for DayWindows {
    fn default() -> Self {
        Self::from(&PhysicsConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleOutput {
    /// Frequencies per [`RiskLevel::ALL`] bucket; sums to 1.
    pub distribution: [f64; BUCKETS],
    /// Shannon entropy of `distribution`, in bits.
    pub entropy: f64,
    /// `1 − entropy / log2(5)`, in [0, 1].
    pub confidence: f64,
    /// Bucket with the highest frequency; ties go to the higher bucket.
    pub most_probable: RiskLevel,
    pub dimensions: Dimensions,
    pub trials: u32,
}

#[derive(Debug, Clone)]
pub struct UncertaintyEnsemble {
    cfg: EnsembleConfig,
    windows: DayWindows,
    table: [RiskLevel; 32],
}

impl UncertaintyEnsemble {
    pub fn new(cfg: EnsembleConfig) -> Self {
        let table = bucket_table(&cfg);
        Self {
            cfg,
            windows: DayWindows::default(),
            table,
        }
    }

    pub fn with_windows(mut self, windows: DayWindows) -> Self {
        self.windows = windows;
        self
    }

    /// Bucket assigned to a set of elevated dimensions (bit 0 = temperature … bit 4 = time of day).
    pub fn bucket_for(&self, mask: u8) -> RiskLevel {
        self.table[usize::from(mask & 0x1f)]
    }

    /// Run with the configured seed.
    pub fn run(&self, sample: &WeatherSample) -> Result<EnsembleOutput, EngineError> {
        self.run_with_seed(sample, self.cfg.seed)
    }

    pub fn run_with_seed(&self, sample: &WeatherSample, seed: u64) -> Result<EnsembleOutput, EngineError> {
        sample.validate()?;
        if self.cfg.trials == 0 {
            return Err(EngineError::Computation("ensemble: zero trials".into()));
        }

        let t0 = Instant::now();
        let dims = Dimensions::from_sample(sample, &self.cfg.dimensions, &self.windows);
        let rho = self.cfg.moisture_precipitation_correlation;
        let precip_if_moist = dims.precipitation + rho * (1.0 - dims.precipitation);
        let precip_if_dry = dims.precipitation * (1.0 - rho);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut counts = [0u32; BUCKETS];

        for _ in 0..self.cfg.trials {
            // Five draws per trial, always, so the stream stays aligned.
            let mut mask = 0u8;
            if rng.random::<f64>() < dims.temperature {
                mask |= TEMPERATURE;
            }
            let moist = rng.random::<f64>() < dims.moisture;
            if moist {
                mask |= MOISTURE;
            }
            if rng.random::<f64>() < dims.wind_chill {
                mask |= WIND_CHILL;
            }
            let p_precip = if moist { precip_if_moist } else { precip_if_dry };
            if rng.random::<f64>() < p_precip {
                mask |= PRECIPITATION;
            }
            if rng.random::<f64>() < dims.time_of_day {
                mask |= TIME_OF_DAY;
            }
            counts[self.bucket_for(mask).index()] += 1;
        }

        let n = f64::from(self.cfg.trials);
        let mut distribution = [0.0; BUCKETS];
        for (d, c) in distribution.iter_mut().zip(counts.iter()) {
            *d = f64::from(*c) / n;
        }

        let best = most_frequent(&counts);

        let entropy = entropy_bits(&distribution);
        let confidence = confidence_from_entropy(entropy);

        histogram!("ensemble_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::trace!(target: "ensemble", ?distribution, entropy, confidence, "ensemble run");

        Ok(EnsembleOutput {
            distribution,
            entropy,
            confidence,
            most_probable: RiskLevel::ALL[best],
            dimensions: dims,
            trials: self.cfg.trials,
        })
    }
}

fn bucket_table(cfg: &EnsembleConfig) -> [RiskLevel; 32] {
    let w = &cfg.bucket_weights;
    let weights = [w.temperature, w.moisture, w.wind_chill, w.precipitation, w.time_of_day];
    let mut table = [RiskLevel::None; 32];
    for (mask, slot) in table.iter_mut().enumerate() {
        let score: f64 = weights
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, w)| *w)
            .sum();
        let level = cfg.bucket_edges.iter().filter(|e| score >= **e).count();
        *slot = RiskLevel::ALL[level];
    }
    table
}

/// Index of the largest count; ties resolve to the higher index.
fn most_frequent(counts: &[u32]) -> usize {
    let mut best = 0usize;
    for (i, c) in counts.iter().enumerate().skip(1) {
        if *c >= counts[best] {
            best = i;
        }
    }
    best
}

/// Shannon entropy in bits; zero-probability buckets contribute nothing.
pub fn entropy_bits(distribution: &[f64]) -> f64 {
    distribution
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.log2())
        .sum()
}

pub fn confidence_from_entropy(entropy: f64) -> f64 {
    (1.0 - entropy / (BUCKETS as f64).log2()).clamp(0.0, 1.0)
}
