//! # Weather samples
//! The per-location input every model consumes, plus the physical helpers
//! (wet-bulb, wind chill, local time) shared between them.
//!
//! Samples are produced by a [`WeatherProvider`] and validated before any
//! scoring happens. Required fields are never defaulted; the optional ones
//! follow the policy documented on each field.

pub mod provider;
pub mod providers;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub use provider::WeatherProvider;

// Physically plausible ranges for validation.
const TEMPERATURE_RANGE_C: (f64, f64) = (-60.0, 60.0);
const SURFACE_TEMPERATURE_RANGE_C: (f64, f64) = (-70.0, 80.0);
const DEW_POINT_RANGE_C: (f64, f64) = (-80.0, 60.0);
const WIND_RANGE_MS: (f64, f64) = (0.0, 120.0);
const PRECIPITATION_RANGE_MM: (f64, f64) = (0.0, 500.0);
const PERCENT_RANGE: (f64, f64) = (0.0, 100.0);
const COOLING_RATE_RANGE: (f64, f64) = (-20.0, 20.0);
const UTC_OFFSET_RANGE_MIN: (i32, i32) = (-840, 840);

/// Dew point may exceed air temperature by this much (sensor noise) before rejection.
const DEW_POINT_SLACK_C: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One observation of the conditions at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub location: Location,
    pub timestamp: DateTime<Utc>,
    /// Air temperature (°C).
    pub temperature_c: f64,
    /// Relative humidity (%).
    pub humidity_pct: f64,
    /// Dew point (°C).
    pub dew_point_c: f64,
    /// Wind speed (m/s).
    pub wind_speed_ms: f64,
    /// Precipitation accumulated over the lookback window (mm).
    pub recent_precipitation_mm: f64,
    /// Measured road surface temperature (°C). Estimated from air temperature when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_temperature_c: Option<f64>,
    /// Bridge or elevated roadway. Absent means "not flagged".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bridge: Option<bool>,
    /// Cloud cover (%). Absent disables the radiational-cooling adjustment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_cover_pct: Option<f64>,
    /// Forecast precipitation probability (%). Absent means derive wetness from recent precipitation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_probability_pct: Option<f64>,
    /// Recent cooling rate (°C/hour, positive when temperature is falling). Absent means no bonus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooling_rate_c_per_hour: Option<f64>,
    /// Offset of local time from UTC. Absent means local solar time from longitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
}

impl WeatherSample {
    /// Sample with the five required fields; optional fields start unset.
    pub fn new(
        location: Location,
        timestamp: DateTime<Utc>,
        temperature_c: f64,
        humidity_pct: f64,
        dew_point_c: f64,
        wind_speed_ms: f64,
        recent_precipitation_mm: f64,
    ) -> Self {
        Self {
            location,
            timestamp,
            temperature_c,
            humidity_pct,
            dew_point_c,
            wind_speed_ms,
            recent_precipitation_mm,
            surface_temperature_c: None,
            is_bridge: None,
            cloud_cover_pct: None,
            precipitation_probability_pct: None,
            cooling_rate_c_per_hour: None,
            utc_offset_minutes: None,
        }
    }

    pub fn with_surface_temperature(mut self, celsius: f64) -> Self {
        self.surface_temperature_c = Some(celsius);
        self
    }

    pub fn on_bridge(mut self) -> Self {
        self.is_bridge = Some(true);
        self
    }

    pub fn with_cloud_cover(mut self, pct: f64) -> Self {
        self.cloud_cover_pct = Some(pct);
        self
    }

    pub fn with_precipitation_probability(mut self, pct: f64) -> Self {
        self.precipitation_probability_pct = Some(pct);
        self
    }

    pub fn with_cooling_rate(mut self, c_per_hour: f64) -> Self {
        self.cooling_rate_c_per_hour = Some(c_per_hour);
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = Some(minutes);
        self
    }

    /// Reject non-finite or out-of-range fields. Nothing is coerced.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.location.is_valid() {
            return Err(EngineError::Validation {
                field: "location",
                value: if self.location.latitude.is_finite() {
                    self.location.longitude
                } else {
                    self.location.latitude
                },
                expected: "latitude in [-90, 90] and longitude in [-180, 180]".into(),
            });
        }

        check("temperature_c", self.temperature_c, TEMPERATURE_RANGE_C)?;
        check("humidity_pct", self.humidity_pct, PERCENT_RANGE)?;
        check("dew_point_c", self.dew_point_c, DEW_POINT_RANGE_C)?;
        if self.dew_point_c > self.temperature_c + DEW_POINT_SLACK_C {
            return Err(EngineError::Validation {
                field: "dew_point_c",
                value: self.dew_point_c,
                expected: format!(
                    "at most temperature_c + {DEW_POINT_SLACK_C} ({})",
                    self.temperature_c + DEW_POINT_SLACK_C
                ),
            });
        }
        check("wind_speed_ms", self.wind_speed_ms, WIND_RANGE_MS)?;
        check(
            "recent_precipitation_mm",
            self.recent_precipitation_mm,
            PRECIPITATION_RANGE_MM,
        )?;

        if let Some(v) = self.surface_temperature_c {
            check("surface_temperature_c", v, SURFACE_TEMPERATURE_RANGE_C)?;
        }
        if let Some(v) = self.cloud_cover_pct {
            check("cloud_cover_pct", v, PERCENT_RANGE)?;
        }
        if let Some(v) = self.precipitation_probability_pct {
            check("precipitation_probability_pct", v, PERCENT_RANGE)?;
        }
        if let Some(v) = self.cooling_rate_c_per_hour {
            check("cooling_rate_c_per_hour", v, COOLING_RATE_RANGE)?;
        }
        if let Some(m) = self.utc_offset_minutes {
            let (lo, hi) = UTC_OFFSET_RANGE_MIN;
            if !(lo..=hi).contains(&m) {
                return Err(EngineError::out_of_range(
                    "utc_offset_minutes",
                    f64::from(m),
                    f64::from(lo),
                    f64::from(hi),
                ));
            }
        }
        if self.local_time().is_none() {
            return Err(EngineError::Validation {
                field: "timestamp",
                value: self.timestamp.timestamp() as f64,
                expected: "a time whose local offset stays within the supported calendar".into(),
            });
        }
        Ok(())
    }

    pub fn bridge(&self) -> bool {
        self.is_bridge.unwrap_or(false)
    }

    /// Dew-point spread (°C), never negative.
    pub fn dew_point_spread_c(&self) -> f64 {
        (self.temperature_c - self.dew_point_c).abs()
    }

    fn offset_minutes(&self) -> i64 {
        self.utc_offset_minutes.map(i64::from).unwrap_or_else(|| {
            // Local solar time: 15° of longitude per hour.
            (self.location.longitude * 4.0).round() as i64
        })
    }

    /// Wall-clock time at the sample's location; `None` past chrono's range.
    pub fn local_time(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .checked_add_signed(Duration::minutes(self.offset_minutes()))
    }

    /// Hour of day (0–23) in local time. Falls back to the UTC hour when the
    /// shifted time is unrepresentable; `validate` rejects such samples.
    pub fn local_hour(&self) -> u32 {
        self.local_time().unwrap_or(self.timestamp).hour()
    }

    /// Wet-bulb temperature (°C) from air temperature and humidity.
    pub fn wet_bulb_c(&self) -> f64 {
        wet_bulb_c(self.temperature_c, self.humidity_pct)
    }

    /// Wind-chill temperature (°C); equals air temperature outside the formula's domain.
    pub fn wind_chill_c(&self) -> f64 {
        wind_chill_c(self.temperature_c, self.wind_speed_ms)
    }
}

fn check(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), EngineError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::out_of_range(field, value, min, max))
    }
}

/// Stull (2011) wet-bulb approximation.
///
/// The fit is valid for RH 5–99 %; humidity is pinned to that window for the
/// formula only, the sample itself is left untouched.
pub fn wet_bulb_c(temperature_c: f64, humidity_pct: f64) -> f64 {
    let t = temperature_c;
    let rh = humidity_pct.clamp(5.0, 99.0);
    t * (0.151_977 * (rh + 8.313_659).sqrt()).atan() + (t + rh).atan() - (rh - 1.676_331).atan()
        + 0.003_918_38 * rh.powf(1.5) * (0.023_101 * rh).atan()
        - 4.686_035
}

/// North American wind-chill index (°C). Defined for T ≤ 10 °C and wind > 4.8 km/h.
pub fn wind_chill_c(temperature_c: f64, wind_speed_ms: f64) -> f64 {
    let v_kmh = wind_speed_ms * 3.6;
    if temperature_c > 10.0 || v_kmh <= 4.8 {
        return temperature_c;
    }
    let v = v_kmh.powf(0.16);
    13.12 + 0.6215 * temperature_c - 11.37 * v + 0.3965 * temperature_c * v
}

/// Convert a temperature *difference* from °C to °F.
pub fn delta_c_to_f(delta_c: f64) -> f64 {
    delta_c * 1.8
}
