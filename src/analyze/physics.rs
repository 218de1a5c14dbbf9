//! Hybrid physics model: `probability = pWet × pFreeze × locationMultiplier × uncertaintyAdjustment`.
//!
//! - `pWet` blends precipitation, humidity, dew-point spread and rapid cooling
//!   with configurable weights summing to 1.
//! - `pFreeze` comes from the (measured or estimated) surface temperature, then
//!   picks up additive bonuses for radiational, evaporative and wind-chill
//!   cooling and a multiplicative overnight boost. It is clamped to [0, 1].
//! - `locationMultiplier` applies bridge exposure.
//! - `uncertaintyAdjustment` accounts for estimated inputs.
//!
//! Every term is reported in `explanations` so the number can be audited.

use crate::assessment::{Components, RiskFactor};
use crate::config::PhysicsConfig;
use crate::error::EngineError;
use crate::weather::{delta_c_to_f, WeatherSample};

#[derive(Debug, Clone)]
pub struct HybridPhysicsModel {
    cfg: PhysicsConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsOutput {
    /// 0–100.
    pub probability: f64,
    pub components: Components,
    pub surface_temperature_c: f64,
    pub surface_measured: bool,
    pub rapid_cooling: bool,
    pub overnight: bool,
    pub factors: Vec<RiskFactor>,
    pub explanations: Vec<String>,
}

/// True when `hour` falls in `[start, end)`, wrapping past midnight when `start > end`.
pub fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Combine the four terms into a 0–100 probability.
pub fn combine(p_wet: f64, p_freeze: f64, location_multiplier: f64, adjustment: f64) -> f64 {
    (p_wet * p_freeze * location_multiplier * adjustment * 100.0).clamp(0.0, 100.0)
}

struct Wetness {
    p: f64,
    rapid_cooling: bool,
}

struct Freeze {
    p: f64,
    surface_c: f64,
    measured: bool,
    overnight: bool,
}

impl HybridPhysicsModel {
    pub const NAME: &'static str = "physics";

    pub fn new(cfg: PhysicsConfig) -> Self {
        Self { cfg }
    }

    /// Names of required inputs this sample lacks under the current configuration.
    pub fn missing_features(&self, sample: &WeatherSample) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.cfg.require_measured_surface && sample.surface_temperature_c.is_none() {
            missing.push("surface_temperature_c");
        }
        missing
    }

    pub fn evaluate(&self, sample: &WeatherSample) -> Result<PhysicsOutput, EngineError> {
        sample.validate()?;
        let missing = self.missing_features(sample);
        if !missing.is_empty() {
            return Err(EngineError::MissingFeatures {
                model: Self::NAME,
                features: missing,
            });
        }

        let mut factors = Vec::new();
        let mut explanations = Vec::new();

        let wet = self.wetness(sample, &mut factors, &mut explanations);
        let freeze = self.freeze(sample, &mut factors, &mut explanations);
        let location_multiplier = self.location_multiplier(sample, &mut factors, &mut explanations);
        let adjustment = self.uncertainty_adjustment(sample, &freeze, &mut explanations);

        let probability = combine(wet.p, freeze.p, location_multiplier, adjustment);
        explanations.push(format!(
            "probability = {:.3} × {:.3} × {:.2} × {:.3} × 100 = {probability:.1}",
            wet.p, freeze.p, location_multiplier, adjustment
        ));

        factors.sort_by(|a: &RiskFactor, b: &RiskFactor| b.contribution.total_cmp(&a.contribution));

        Ok(PhysicsOutput {
            probability,
            components: Components {
                p_wet: wet.p,
                p_freeze: freeze.p,
                location_multiplier,
                uncertainty_adjustment: adjustment,
            },
            surface_temperature_c: freeze.surface_c,
            surface_measured: freeze.measured,
            rapid_cooling: wet.rapid_cooling,
            overnight: freeze.overnight,
            factors,
            explanations,
        })
    }

    fn wetness(
        &self,
        s: &WeatherSample,
        factors: &mut Vec<RiskFactor>,
        explanations: &mut Vec<String>,
    ) -> Wetness {
        let c = &self.cfg;
        let w = &c.wet_weights;

        let derived = (s.recent_precipitation_mm / c.wet_precipitation_ref_mm).min(1.0);
        let supplied = s.precipitation_probability_pct.map(|p| p / 100.0).unwrap_or(0.0);
        let precipitation = derived.max(supplied);

        let humidity =
            ((s.humidity_pct - c.humidity_threshold_pct) / (100.0 - c.humidity_threshold_pct)).clamp(0.0, 1.0);

        let spread_f = delta_c_to_f(s.dew_point_spread_c());
        let dew_spread = ((c.dew_spread_zero_f - spread_f) / (c.dew_spread_zero_f - c.dew_spread_full_f))
            .clamp(0.0, 1.0);

        let cooling_f = s.cooling_rate_c_per_hour.map(delta_c_to_f);
        let rapid_cooling = cooling_f.is_some_and(|r| r > c.rapid_cooling_f_per_hour);
        let cooling = if rapid_cooling { 1.0 } else { 0.0 };

        let p = (w.precipitation * precipitation
            + w.humidity * humidity
            + w.dew_spread * dew_spread
            + w.cooling * cooling)
            .clamp(0.0, 1.0);

        explanations.push(format!(
            "pWet {p:.3}: precipitation {precipitation:.2}, humidity {humidity:.2}, dew spread {dew_spread:.2} ({spread_f:.1}°F), cooling {cooling:.0}"
        ));
        if rapid_cooling {
            factors.push(RiskFactor::new(
                "RapidCooling",
                w.cooling * 100.0,
                format!(
                    "Temperature falling {:.1}°F/hour",
                    cooling_f.unwrap_or_default()
                ),
            ));
        }

        Wetness { p, rapid_cooling }
    }

    fn freeze(
        &self,
        s: &WeatherSample,
        factors: &mut Vec<RiskFactor>,
        explanations: &mut Vec<String>,
    ) -> Freeze {
        let c = &self.cfg;
        let (surface_c, measured) = match s.surface_temperature_c {
            Some(t) => (t, true),
            None => (s.temperature_c + c.surface_offset_c, false),
        };

        let base = if surface_c <= c.freeze_threshold_c {
            c.freeze_prob_cold
        } else if surface_c >= c.warm_threshold_c {
            c.freeze_prob_warm
        } else {
            let frac = (surface_c - c.freeze_threshold_c) / (c.warm_threshold_c - c.freeze_threshold_c);
            c.freeze_prob_cold + (c.freeze_prob_warm - c.freeze_prob_cold) * frac
        };
        explanations.push(format!(
            "surface {surface_c:.1}°C ({}) gives base pFreeze {base:.3}",
            if measured { "measured" } else { "estimated" }
        ));

        let hour = s.local_hour();
        let mut p = base;

        let night = hour_in_window(hour, c.night_start_hour, c.night_end_hour);
        if night && s.cloud_cover_pct.is_some_and(|cc| cc < c.clear_sky_max_cloud_pct) {
            p += c.radiational_bonus;
            factors.push(RiskFactor::new(
                "RadiationalCooling",
                c.radiational_bonus * 100.0,
                "Clear night sky lets the road radiate heat away",
            ));
            explanations.push(format!("radiational cooling +{:.2}", c.radiational_bonus));
        }

        let wet_bulb = s.wet_bulb_c();
        if wet_bulb <= c.freeze_threshold_c && s.temperature_c > c.freeze_threshold_c {
            p += c.evaporative_bonus;
            factors.push(RiskFactor::new(
                "EvaporativeCooling",
                c.evaporative_bonus * 100.0,
                format!("Wet-bulb {wet_bulb:.1}°C: evaporation can freeze a wet surface above 0°C air"),
            ));
            explanations.push(format!("evaporative cooling +{:.2}", c.evaporative_bonus));
        }

        let chill = s.wind_chill_c();
        if s.wind_speed_ms >= c.wind_chill_min_ms
            && s.temperature_c <= c.wind_chill_max_air_c
            && chill <= c.freeze_threshold_c
        {
            p += c.wind_chill_bonus;
            factors.push(RiskFactor::new(
                "WindChill",
                c.wind_chill_bonus * 100.0,
                format!("Wind chill {chill:.1}°C strips heat from the surface"),
            ));
            explanations.push(format!("wind chill +{:.2}", c.wind_chill_bonus));
        }

        let overnight = hour_in_window(hour, c.overnight_start_hour, c.overnight_end_hour);
        if overnight {
            p *= c.overnight_multiplier;
            factors.push(RiskFactor::new(
                "OvernightCooling",
                (c.overnight_multiplier - 1.0) * 100.0,
                format!("Local hour {hour:02}: coldest part of the night"),
            ));
            explanations.push(format!("overnight ×{:.2}", c.overnight_multiplier));
        }

        let p = p.clamp(0.0, 1.0);
        explanations.push(format!("pFreeze {p:.3}"));

        Freeze {
            p,
            surface_c,
            measured,
            overnight,
        }
    }

    fn location_multiplier(
        &self,
        s: &WeatherSample,
        factors: &mut Vec<RiskFactor>,
        explanations: &mut Vec<String>,
    ) -> f64 {
        let c = &self.cfg;
        if !s.bridge() {
            return 1.0;
        }
        let m = if s.wind_speed_ms >= c.bridge_high_wind_ms {
            c.bridge_high_wind_multiplier
        } else {
            c.bridge_multiplier
        };
        factors.push(RiskFactor::new(
            "BridgeExposure",
            (m - 1.0) * 100.0,
            "Bridges lose heat from above and below and freeze first",
        ));
        explanations.push(format!("bridge ×{m:.2}"));
        m
    }

    fn uncertainty_adjustment(&self, s: &WeatherSample, f: &Freeze, explanations: &mut Vec<String>) -> f64 {
        let c = &self.cfg;
        let mut adj = 1.0;
        if !f.measured {
            adj *= c.estimated_surface_factor;
            if (c.transition_band_low_c..=c.transition_band_high_c).contains(&f.surface_c) {
                adj *= c.transition_band_factor;
            }
        }
        if s.precipitation_probability_pct.is_none() && s.recent_precipitation_mm == 0.0 {
            adj *= c.low_wetness_factor;
        }
        if adj != 1.0 {
            explanations.push(format!("uncertainty adjustment ×{adj:.3}"));
        }
        adj
    }
}
