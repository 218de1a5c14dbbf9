//! Empirical weighted-factor model.
//!
//! Five independently capped contributions (points):
//! - Temperature: triangular, peaking at the configured freezing point
//! - Humidity: linear above a threshold
//! - DewPointConvergence: full when air and dew point nearly meet
//! - WindSpeed: full in calm air, zero in a stiff breeze
//! - RecentPrecipitation: linear in the lookback amount, capped
//!
//! The point total is divided by `points_scale` and clamped to 0–100.

use crate::assessment::RiskFactor;
use crate::config::FactorConfig;
use crate::error::EngineError;
use crate::weather::WeatherSample;

#[derive(Debug, Clone)]
pub struct RiskFactorModel {
    cfg: FactorConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorOutput {
    /// 0–100.
    pub probability: f64,
    pub total_points: f64,
    /// Positive contributions only, largest first.
    pub factors: Vec<RiskFactor>,
}

impl RiskFactorModel {
    pub const NAME: &'static str = "factor";

    pub fn new(cfg: FactorConfig) -> Self {
        Self { cfg }
    }

    pub fn evaluate(&self, sample: &WeatherSample) -> Result<FactorOutput, EngineError> {
        sample.validate()?;
        let c = &self.cfg;

        let t = sample.temperature_c;
        let h = sample.humidity_pct;
        let spread = sample.dew_point_spread_c();
        let w = sample.wind_speed_ms;
        let p = sample.recent_precipitation_mm;

        let candidates = [
            RiskFactor::new(
                "Temperature",
                temperature_points(c, t),
                format!(
                    "Air temperature {t:.1}°C is inside the black-ice band ({:.0}°C to {:.0}°C)",
                    c.temperature_low_c, c.temperature_high_c
                ),
            ),
            RiskFactor::new(
                "Humidity",
                humidity_points(c, h),
                format!(
                    "Relative humidity {h:.0}% is above {:.0}%",
                    c.humidity_threshold_pct
                ),
            ),
            RiskFactor::new(
                "DewPointConvergence",
                dew_point_points(c, spread),
                format!("Dew point is within {spread:.1}°C of air temperature; condensation likely"),
            ),
            RiskFactor::new(
                "WindSpeed",
                wind_points(c, w),
                format!("Light wind ({w:.1} m/s) lets the surface cool undisturbed"),
            ),
            RiskFactor::new(
                "RecentPrecipitation",
                precipitation_points(c, p),
                format!("{p:.1} mm of recent precipitation leaves the road wet"),
            ),
        ];

        let total_points: f64 = candidates.iter().map(|f| f.contribution).sum();
        let probability = (total_points / c.points_scale).clamp(0.0, 100.0);

        let mut factors: Vec<RiskFactor> = candidates
            .into_iter()
            .filter(|f| f.contribution > 0.0)
            .collect();
        factors.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));

        Ok(FactorOutput {
            probability,
            total_points,
            factors,
        })
    }
}

/// Linear ramp: 0 at `zero`, 1 at `full` (either direction), clamped.
fn ramp(x: f64, zero: f64, full: f64) -> f64 {
    ((x - zero) / (full - zero)).clamp(0.0, 1.0)
}

pub fn temperature_points(c: &FactorConfig, t: f64) -> f64 {
    if t <= c.temperature_low_c || t >= c.temperature_high_c {
        0.0
    } else if t <= c.temperature_peak_c {
        c.temperature_max * ramp(t, c.temperature_low_c, c.temperature_peak_c)
    } else {
        c.temperature_max * ramp(t, c.temperature_high_c, c.temperature_peak_c)
    }
}

pub fn humidity_points(c: &FactorConfig, h: f64) -> f64 {
    c.humidity_max * ramp(h, c.humidity_threshold_pct, 100.0)
}

pub fn dew_point_points(c: &FactorConfig, spread: f64) -> f64 {
    c.dew_point_max * ramp(spread, c.dew_point_zero_spread_c, c.dew_point_full_spread_c)
}

pub fn wind_points(c: &FactorConfig, w: f64) -> f64 {
    c.wind_max * ramp(w, c.wind_zero_ms, c.wind_calm_ms)
}

pub fn precipitation_points(c: &FactorConfig, mm: f64) -> f64 {
    c.precipitation_max * ramp(mm, 0.0, c.precipitation_cap_mm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::Location;
    use chrono::{TimeZone, Utc};

    fn cfg() -> FactorConfig {
        FactorConfig::default()
    }

    fn sample(t: f64, h: f64, dp: f64, w: f64, p: f64) -> WeatherSample {
        WeatherSample::new(
            Location::new(45.0, 0.0),
            Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap(),
            t,
            h,
            dp,
            w,
            p,
        )
    }

    #[test]
    fn temperature_peaks_at_freezing() {
        let c = cfg();
        assert_eq!(temperature_points(&c, 0.0), 40.0);
        assert_eq!(temperature_points(&c, -5.0), 0.0);
        assert_eq!(temperature_points(&c, 2.0), 0.0);
        assert!((temperature_points(&c, -2.5) - 20.0).abs() < 1e-9);
        assert!((temperature_points(&c, 1.0) - 20.0).abs() < 1e-9);
        assert_eq!(temperature_points(&c, 10.0), 0.0);
    }

    #[test]
    fn humidity_is_linear_above_threshold() {
        let c = cfg();
        assert_eq!(humidity_points(&c, 80.0), 0.0);
        assert!((humidity_points(&c, 90.0) - 12.5).abs() < 1e-9);
        assert_eq!(humidity_points(&c, 100.0), 25.0);
    }

    #[test]
    fn dew_point_and_wind_shapes() {
        let c = cfg();
        assert_eq!(dew_point_points(&c, 1.5), 20.0);
        assert!((dew_point_points(&c, 4.0) - 10.0).abs() < 1e-9);
        assert_eq!(dew_point_points(&c, 9.0), 0.0);
        assert_eq!(wind_points(&c, 1.0), 15.0);
        assert!((wind_points(&c, 6.0) - 6.0).abs() < 1e-9);
        assert_eq!(wind_points(&c, 9.0), 0.0);
        assert_eq!(precipitation_points(&c, 10.0), 20.0);
    }

    #[test]
    fn maximal_conditions_reach_one_hundred() {
        let m = RiskFactorModel::new(cfg());
        let out = m.evaluate(&sample(0.0, 100.0, -0.5, 0.0, 5.0)).unwrap();
        assert!((out.total_points - 120.0).abs() < 1e-9);
        assert!((out.probability - 100.0).abs() < 1e-9);
        assert_eq!(out.factors.len(), 5);
    }

    #[test]
    fn factors_sorted_descending_and_positive_only() {
        let m = RiskFactorModel::new(cfg());
        let out = m.evaluate(&sample(10.0, 40.0, -2.0, 6.0, 0.0)).unwrap();
        assert_eq!(out.factors.len(), 1);
        assert_eq!(out.factors[0].name, "WindSpeed");
        assert!((out.probability - 5.0).abs() < 1e-9);

        let out = m.evaluate(&sample(-1.0, 92.0, -1.5, 2.0, 1.5)).unwrap();
        assert!(out
            .factors
            .windows(2)
            .all(|w| w[0].contribution >= w[1].contribution));
        assert_eq!(out.factors[0].name, "Temperature");
    }

    #[test]
    fn invalid_humidity_is_rejected() {
        let m = RiskFactorModel::new(cfg());
        let err = m.evaluate(&sample(0.0, 130.0, -1.0, 1.0, 0.0)).unwrap_err();
        assert!(matches!(err, EngineError::Validation { field: "humidity_pct", .. }));
    }
}
