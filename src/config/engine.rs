// src/config/engine.rs
//! Engine configuration: every threshold, weight and coefficient the models use.
//!
//! Each section deserializes with defaults, so a TOML file only needs the keys
//! it overrides. [`EngineConfig::validate`] enforces the invariants the models
//! rely on; an engine is never built from a config that fails it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::RiskLevel;
use crate::error::EngineError;
use crate::weather::{Location, WeatherSample};

const WEIGHT_EPSILON: f64 = 1e-6;
pub const MAX_ENSEMBLE_TRIALS: u32 = 200_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: RiskThresholds,
    pub factors: FactorConfig,
    pub physics: PhysicsConfig,
    pub ensemble: EnsembleConfig,
    pub fusion: FusionConfig,
    pub route: RouteConfig,
}

/// Lower bounds (inclusive) of the Low/Moderate/High/Extreme levels on the 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub low: f64,
    pub moderate: f64,
    pub high: f64,
    pub extreme: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 20.0,
            moderate: 40.0,
            high: 60.0,
            extreme: 80.0,
        }
    }
}

impl RiskThresholds {
    pub fn level_for(&self, probability: f64) -> RiskLevel {
        if probability >= self.extreme {
            RiskLevel::Extreme
        } else if probability >= self.high {
            RiskLevel::High
        } else if probability >= self.moderate {
            RiskLevel::Moderate
        } else if probability >= self.low {
            RiskLevel::Low
        } else {
            RiskLevel::None
        }
    }
}

/// Point caps and shapes of the empirical factor model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorConfig {
    pub temperature_max: f64,
    pub temperature_low_c: f64,
    pub temperature_peak_c: f64,
    pub temperature_high_c: f64,
    pub humidity_max: f64,
    pub humidity_threshold_pct: f64,
    pub dew_point_max: f64,
    pub dew_point_full_spread_c: f64,
    pub dew_point_zero_spread_c: f64,
    pub wind_max: f64,
    pub wind_calm_ms: f64,
    pub wind_zero_ms: f64,
    pub precipitation_max: f64,
    pub precipitation_cap_mm: f64,
    /// Total points are divided by this to land on 0–100.
    pub points_scale: f64,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            temperature_max: 40.0,
            temperature_low_c: -5.0,
            temperature_peak_c: 0.0,
            temperature_high_c: 2.0,
            humidity_max: 25.0,
            humidity_threshold_pct: 80.0,
            dew_point_max: 20.0,
            dew_point_full_spread_c: 2.0,
            dew_point_zero_spread_c: 6.0,
            wind_max: 15.0,
            wind_calm_ms: 3.0,
            wind_zero_ms: 8.0,
            precipitation_max: 20.0,
            precipitation_cap_mm: 2.5,
            points_scale: 1.2,
        }
    }
}

impl FactorConfig {
    pub fn max_points(&self) -> f64 {
        self.temperature_max
            + self.humidity_max
            + self.dew_point_max
            + self.wind_max
            + self.precipitation_max
    }
}

/// Weights of the four pWet terms. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WetWeights {
    pub precipitation: f64,
    pub humidity: f64,
    pub dew_spread: f64,
    pub cooling: f64,
}

impl Default for WetWeights {
    fn default() -> Self {
        Self {
            precipitation: 0.40,
            humidity: 0.25,
            dew_spread: 0.25,
            cooling: 0.10,
        }
    }
}

impl WetWeights {
    pub fn sum(&self) -> f64 {
        self.precipitation + self.humidity + self.dew_spread + self.cooling
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub wet_weights: WetWeights,
    pub humidity_threshold_pct: f64,
    pub dew_spread_full_f: f64,
    pub dew_spread_zero_f: f64,
    /// Recent precipitation (mm) treated as a certainly wet road.
    pub wet_precipitation_ref_mm: f64,
    pub rapid_cooling_f_per_hour: f64,

    /// Added to air temperature when no surface measurement exists.
    pub surface_offset_c: f64,
    pub freeze_threshold_c: f64,
    pub warm_threshold_c: f64,
    pub freeze_prob_cold: f64,
    pub freeze_prob_warm: f64,

    pub radiational_bonus: f64,
    pub clear_sky_max_cloud_pct: f64,
    pub night_start_hour: u32,
    pub night_end_hour: u32,
    pub evaporative_bonus: f64,
    pub wind_chill_bonus: f64,
    pub wind_chill_min_ms: f64,
    pub wind_chill_max_air_c: f64,
    pub overnight_start_hour: u32,
    pub overnight_end_hour: u32,
    pub overnight_multiplier: f64,

    pub bridge_multiplier: f64,
    pub bridge_high_wind_multiplier: f64,
    pub bridge_high_wind_ms: f64,

    pub estimated_surface_factor: f64,
    pub transition_band_low_c: f64,
    pub transition_band_high_c: f64,
    pub transition_band_factor: f64,
    pub low_wetness_factor: f64,

    /// Treat a missing surface measurement as a missing required feature.
    pub require_measured_surface: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            wet_weights: WetWeights::default(),
            humidity_threshold_pct: 80.0,
            dew_spread_full_f: 5.0,
            dew_spread_zero_f: 15.0,
            wet_precipitation_ref_mm: 1.0,
            rapid_cooling_f_per_hour: 3.0,
            surface_offset_c: -0.5,
            freeze_threshold_c: 0.0,
            warm_threshold_c: 3.0,
            freeze_prob_cold: 0.95,
            freeze_prob_warm: 0.02,
            radiational_bonus: 0.10,
            clear_sky_max_cloud_pct: 30.0,
            night_start_hour: 20,
            night_end_hour: 7,
            evaporative_bonus: 0.08,
            wind_chill_bonus: 0.05,
            wind_chill_min_ms: 3.0,
            wind_chill_max_air_c: 5.0,
            overnight_start_hour: 2,
            overnight_end_hour: 6,
            overnight_multiplier: 1.2,
            bridge_multiplier: 1.3,
            bridge_high_wind_multiplier: 1.5,
            bridge_high_wind_ms: 10.0,
            estimated_surface_factor: 0.85,
            transition_band_low_c: -1.0,
            transition_band_high_c: 2.0,
            transition_band_factor: 1.15,
            low_wetness_factor: 0.90,
            require_measured_surface: false,
        }
    }
}

/// Weight each elevated dimension adds to the bucket score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketWeights {
    pub temperature: f64,
    pub moisture: f64,
    pub wind_chill: f64,
    pub precipitation: f64,
    pub time_of_day: f64,
}

impl Default for BucketWeights {
    fn default() -> Self {
        Self {
            temperature: 1.25,
            moisture: 1.25,
            wind_chill: 0.75,
            precipitation: 1.0,
            time_of_day: 0.75,
        }
    }
}

/// How each ensemble dimension's "elevated" probability is read off a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionShapes {
    /// Surface (or air) temperature at which the temperature dimension peaks.
    pub temperature_certain_c: f64,
    /// Temperature at which it bottoms out.
    pub temperature_unlikely_c: f64,
    pub temperature_p_max: f64,
    pub temperature_p_min: f64,
    /// Humidity below which moisture gets no credit from humidity alone.
    pub moisture_humidity_floor_pct: f64,
    /// Dew-point spread at which convergence stops counting.
    pub moisture_spread_zero_c: f64,
    pub wind_chill_certain_c: f64,
    pub wind_chill_zero_c: f64,
    /// Recent precipitation treated as certainly elevated.
    pub precipitation_certain_mm: f64,
    /// Time-of-day probabilities. Windows come from the physics section.
    pub overnight_p: f64,
    pub night_p: f64,
    pub day_p: f64,
}

impl Default for DimensionShapes {
    fn default() -> Self {
        Self {
            temperature_certain_c: -1.0,
            temperature_unlikely_c: 4.0,
            temperature_p_max: 0.95,
            temperature_p_min: 0.05,
            moisture_humidity_floor_pct: 70.0,
            moisture_spread_zero_c: 5.0,
            wind_chill_certain_c: -4.0,
            wind_chill_zero_c: 2.0,
            precipitation_certain_mm: 2.0,
            overnight_p: 0.9,
            night_p: 0.6,
            day_p: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub trials: u32,
    pub seed: u64,
    /// ρ in [0, 1]: how strongly an elevated moisture draw pulls precipitation up.
    pub moisture_precipitation_correlation: f64,
    pub bucket_weights: BucketWeights,
    /// Score edges between None|Low|Moderate|High|Extreme. Strictly increasing.
    pub bucket_edges: [f64; 4],
    pub dimensions: DimensionShapes,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            trials: 4_000,
            seed: 0x0B1A_C1CE,
            moisture_precipitation_correlation: 0.3,
            bucket_weights: BucketWeights::default(),
            bucket_edges: [0.5, 1.5, 2.5, 3.5],
            dimensions: DimensionShapes::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub factor_model: bool,
    pub physics_model: bool,
    pub factor_weight: f64,
    pub physics_weight: f64,
    pub single_source_confidence_cap: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            factor_model: true,
            physics_model: true,
            factor_weight: 0.5,
            physics_weight: 0.5,
            single_source_confidence_cap: 0.6,
        }
    }
}

/// Where along a segment the weather sample is taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePoint {
    #[default]
    Midpoint,
    Start,
    End,
}

/// Lower bounds (inclusive) of the Safe/Caution/Risky bands; below `risky` is Dangerous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyBands {
    pub safe: f64,
    pub caution: f64,
    pub risky: f64,
}

impl Default for SafetyBands {
    fn default() -> Self {
        Self {
            safe: 80.0,
            caution: 60.0,
            risky: 40.0,
        }
    }
}

/// Conservative conditions assumed for a segment whose weather could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSample {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub dew_point_c: f64,
    pub wind_speed_ms: f64,
    pub recent_precipitation_mm: f64,
}

impl Default for FallbackSample {
    fn default() -> Self {
        Self {
            temperature_c: 0.0,
            humidity_pct: 85.0,
            dew_point_c: -1.0,
            wind_speed_ms: 2.0,
            recent_precipitation_mm: 0.5,
        }
    }
}

impl FallbackSample {
    pub fn to_sample(&self, location: Location, timestamp: DateTime<Utc>) -> WeatherSample {
        WeatherSample::new(
            location,
            timestamp,
            self.temperature_c,
            self.humidity_pct,
            self.dew_point_c,
            self.wind_speed_ms,
            self.recent_precipitation_mm,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub sample_point: SamplePoint,
    pub max_concurrency: usize,
    pub danger_threshold: f64,
    pub danger_zone_radius_km: f64,
    pub degraded_confidence_cap: f64,
    pub default_lookback_hours: u64,
    pub safety_bands: SafetyBands,
    pub fallback: FallbackSample,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            sample_point: SamplePoint::Midpoint,
            max_concurrency: 4,
            danger_threshold: 60.0,
            danger_zone_radius_km: 0.5,
            degraded_confidence_cap: 0.3,
            default_lookback_hours: 6,
            safety_bands: SafetyBands::default(),
            fallback: FallbackSample::default(),
        }
    }
}

fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<(), EngineError> {
    if cond {
        Ok(())
    } else {
        Err(EngineError::Computation(msg()))
    }
}

fn unit(name: &str, v: f64) -> Result<(), EngineError> {
    ensure((0.0..=1.0).contains(&v), || format!("{name} must be in [0, 1], got {v}"))
}

impl EngineConfig {
    /// Check every invariant the models depend on.
    pub fn validate(&self) -> Result<(), EngineError> {
        let t = &self.thresholds;
        ensure(
            0.0 < t.low && t.low < t.moderate && t.moderate < t.high && t.high < t.extreme && t.extreme <= 100.0,
            || format!("risk thresholds must be strictly increasing within (0, 100], got {t:?}"),
        )?;

        let f = &self.factors;
        ensure(
            f.temperature_low_c < f.temperature_peak_c && f.temperature_peak_c < f.temperature_high_c,
            || "factors: temperature_low_c < temperature_peak_c < temperature_high_c".into(),
        )?;
        ensure(f.humidity_threshold_pct < 100.0, || {
            "factors: humidity_threshold_pct must be below 100".into()
        })?;
        ensure(f.dew_point_full_spread_c < f.dew_point_zero_spread_c, || {
            "factors: dew_point_full_spread_c must be below dew_point_zero_spread_c".into()
        })?;
        ensure(f.wind_calm_ms < f.wind_zero_ms, || {
            "factors: wind_calm_ms must be below wind_zero_ms".into()
        })?;
        ensure(f.precipitation_cap_mm > 0.0, || {
            "factors: precipitation_cap_mm must be positive".into()
        })?;
        ensure(
            [f.temperature_max, f.humidity_max, f.dew_point_max, f.wind_max, f.precipitation_max]
                .iter()
                .all(|m| *m >= 0.0),
            || "factors: point caps must be non-negative".into(),
        )?;
        ensure(f.points_scale > 0.0, || "factors: points_scale must be positive".into())?;
        ensure(
            (f.max_points() - f.points_scale * 100.0).abs() < WEIGHT_EPSILON,
            || {
                format!(
                    "factors: point caps sum to {} but points_scale {} maps 100% to {}",
                    f.max_points(),
                    f.points_scale,
                    f.points_scale * 100.0
                )
            },
        )?;

        let p = &self.physics;
        let w = &p.wet_weights;
        ensure(
            [w.precipitation, w.humidity, w.dew_spread, w.cooling].iter().all(|x| *x >= 0.0),
            || "physics: wet weights must be non-negative".into(),
        )?;
        ensure((w.sum() - 1.0).abs() < WEIGHT_EPSILON, || {
            format!("physics: wet weights must sum to 1.0, got {}", w.sum())
        })?;
        ensure(p.humidity_threshold_pct < 100.0, || {
            "physics: humidity_threshold_pct must be below 100".into()
        })?;
        ensure(p.dew_spread_full_f < p.dew_spread_zero_f, || {
            "physics: dew_spread_full_f must be below dew_spread_zero_f".into()
        })?;
        ensure(p.wet_precipitation_ref_mm > 0.0, || {
            "physics: wet_precipitation_ref_mm must be positive".into()
        })?;
        ensure(p.freeze_threshold_c < p.warm_threshold_c, || {
            "physics: freeze_threshold_c must be below warm_threshold_c".into()
        })?;
        unit("physics.freeze_prob_cold", p.freeze_prob_cold)?;
        unit("physics.freeze_prob_warm", p.freeze_prob_warm)?;
        ensure(p.freeze_prob_warm <= p.freeze_prob_cold, || {
            "physics: freeze_prob_warm must not exceed freeze_prob_cold".into()
        })?;
        unit("physics.radiational_bonus", p.radiational_bonus)?;
        unit("physics.evaporative_bonus", p.evaporative_bonus)?;
        unit("physics.wind_chill_bonus", p.wind_chill_bonus)?;
        ensure(
            p.night_start_hour < 24
                && p.night_end_hour < 24
                && p.overnight_start_hour < 24
                && p.overnight_end_hour < 24,
            || "physics: hours must be in 0..24".into(),
        )?;
        ensure(p.overnight_multiplier >= 1.0, || {
            "physics: overnight_multiplier must be at least 1.0".into()
        })?;
        ensure(
            1.0 <= p.bridge_multiplier && p.bridge_multiplier <= p.bridge_high_wind_multiplier,
            || "physics: 1.0 <= bridge_multiplier <= bridge_high_wind_multiplier".into(),
        )?;
        ensure(p.transition_band_low_c < p.transition_band_high_c, || {
            "physics: transition band must be non-empty".into()
        })?;
        ensure(
            p.estimated_surface_factor > 0.0 && p.low_wetness_factor > 0.0 && p.transition_band_factor > 0.0,
            || "physics: adjustment factors must be positive".into(),
        )?;

        let e = &self.ensemble;
        ensure(e.trials > 0 && e.trials <= MAX_ENSEMBLE_TRIALS, || {
            format!("ensemble: trials must be in 1..={MAX_ENSEMBLE_TRIALS}, got {}", e.trials)
        })?;
        unit(
            "ensemble.moisture_precipitation_correlation",
            e.moisture_precipitation_correlation,
        )?;
        let bw = &e.bucket_weights;
        ensure(
            [bw.temperature, bw.moisture, bw.wind_chill, bw.precipitation, bw.time_of_day]
                .iter()
                .all(|x| *x > 0.0),
            || "ensemble: bucket weights must be positive".into(),
        )?;
        ensure(e.bucket_edges.windows(2).all(|p| p[0] < p[1]), || {
            format!("ensemble: bucket_edges must be strictly increasing, got {:?}", e.bucket_edges)
        })?;
        let d = &e.dimensions;
        ensure(d.temperature_certain_c < d.temperature_unlikely_c, || {
            "ensemble.dimensions: temperature_certain_c must be below temperature_unlikely_c".into()
        })?;
        ensure(d.wind_chill_certain_c < d.wind_chill_zero_c, || {
            "ensemble.dimensions: wind_chill_certain_c must be below wind_chill_zero_c".into()
        })?;
        ensure(
            d.moisture_humidity_floor_pct >= 0.0
                && d.moisture_humidity_floor_pct < 100.0
                && d.moisture_spread_zero_c > 0.0
                && d.precipitation_certain_mm > 0.0,
            || "ensemble.dimensions: moisture and precipitation shapes must be positive ranges".into(),
        )?;
        ensure(d.temperature_p_min <= d.temperature_p_max, || {
            "ensemble.dimensions: temperature_p_min must not exceed temperature_p_max".into()
        })?;
        for (name, v) in [
            ("ensemble.dimensions.temperature_p_max", d.temperature_p_max),
            ("ensemble.dimensions.temperature_p_min", d.temperature_p_min),
            ("ensemble.dimensions.overnight_p", d.overnight_p),
            ("ensemble.dimensions.night_p", d.night_p),
            ("ensemble.dimensions.day_p", d.day_p),
        ] {
            unit(name, v)?;
        }

        let fu = &self.fusion;
        ensure(fu.factor_model || fu.physics_model, || {
            "fusion: at least one model must be enabled".into()
        })?;
        ensure(fu.factor_weight >= 0.0 && fu.physics_weight >= 0.0, || {
            "fusion: weights must be non-negative".into()
        })?;
        ensure(
            (fu.factor_weight + fu.physics_weight - 1.0).abs() < WEIGHT_EPSILON,
            || {
                format!(
                    "fusion: weights must sum to 1.0, got {}",
                    fu.factor_weight + fu.physics_weight
                )
            },
        )?;
        unit("fusion.single_source_confidence_cap", fu.single_source_confidence_cap)?;
        ensure(
            fu.factor_model || !p.require_measured_surface,
            || "fusion: the physics model alone cannot require measured surface temperature".into(),
        )?;

        let r = &self.route;
        ensure(r.max_concurrency > 0, || "route: max_concurrency must be positive".into())?;
        ensure(
            r.danger_threshold > 0.0 && r.danger_threshold <= 100.0,
            || "route: danger_threshold must be in (0, 100]".into(),
        )?;
        ensure(r.danger_zone_radius_km >= 0.0, || {
            "route: danger_zone_radius_km must be non-negative".into()
        })?;
        unit("route.degraded_confidence_cap", r.degraded_confidence_cap)?;
        let b = &r.safety_bands;
        ensure(
            0.0 < b.risky && b.risky < b.caution && b.caution < b.safe && b.safe <= 100.0,
            || "route: safety bands must satisfy 0 < risky < caution < safe <= 100".into(),
        )?;
        r.fallback
            .to_sample(Location::new(0.0, 0.0), DateTime::<Utc>::default())
            .validate()
            .map_err(|e| EngineError::Computation(format!("route.fallback: {e}")))?;

        Ok(())
    }
}
