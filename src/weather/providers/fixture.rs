// src/weather/providers/fixture.rs
//! In-memory provider: serves the nearest stored sample within a radius.
//! Used by tests and for running the service offline.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;

use crate::error::EngineError;
use crate::route::geo::haversine_km;
use crate::weather::{Location, WeatherProvider, WeatherSample};

const DEFAULT_MAX_DISTANCE_KM: f64 = 25.0;

#[derive(Debug, Clone)]
pub struct FixtureProvider {
    samples: Vec<WeatherSample>,
    max_distance_km: f64,
}

impl FixtureProvider {
    pub fn from_samples(samples: Vec<WeatherSample>) -> Self {
        Self {
            samples,
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
        }
    }

    /// Parse a JSON array of samples.
    pub fn from_json(json: &str) -> Result<Self> {
        let samples: Vec<WeatherSample> =
            serde_json::from_str(json).context("parse fixture samples")?;
        Ok(Self::from_samples(samples))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading weather fixture from {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn with_max_distance_km(mut self, km: f64) -> Self {
        self.max_distance_km = km;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn nearest(&self, location: Location) -> Option<(&WeatherSample, f64)> {
        self.samples
            .iter()
            .map(|s| (s, haversine_km(s.location, location)))
            .filter(|(_, d)| *d <= self.max_distance_km)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[async_trait]
impl WeatherProvider for FixtureProvider {
    async fn sample(
        &self,
        location: Location,
        _lookback: Option<Duration>,
    ) -> Result<WeatherSample, EngineError> {
        match self.nearest(location) {
            Some((s, distance_km)) => {
                tracing::trace!(target: "weather", distance_km, "fixture sample matched");
                let mut out = s.clone();
                out.location = location;
                Ok(out)
            }
            None => {
                counter!("weather_fetch_errors_total", "provider" => "fixture").increment(1);
                Err(EngineError::DataUnavailable(format!(
                    "no fixture sample within {} km of ({}, {})",
                    self.max_distance_km, location.latitude, location.longitude
                )))
            }
        }
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(lat: f64, lon: f64, temp: f64) -> WeatherSample {
        WeatherSample::new(
            Location::new(lat, lon),
            Utc.with_ymd_and_hms(2025, 1, 10, 6, 0, 0).unwrap(),
            temp,
            80.0,
            temp - 2.0,
            2.0,
            0.0,
        )
    }

    #[tokio::test]
    async fn picks_nearest_sample_and_relocates_it() {
        let p = FixtureProvider::from_samples(vec![at(50.0, 14.0, 1.0), at(50.1, 14.0, 5.0)]);
        let wanted = Location::new(50.09, 14.0);
        let s = p.sample(wanted, None).await.unwrap();
        assert_eq!(s.temperature_c, 5.0);
        assert_eq!(s.location, wanted);
    }

    #[tokio::test]
    async fn far_locations_are_unavailable() {
        let p = FixtureProvider::from_samples(vec![at(50.0, 14.0, 1.0)]).with_max_distance_km(5.0);
        let err = p.sample(Location::new(48.0, 14.0), None).await.unwrap_err();
        assert!(matches!(err, EngineError::DataUnavailable(_)));
    }

    #[test]
    fn json_round_trip_keeps_optional_fields() {
        let json = r#"[{
            "location": {"latitude": 45.0, "longitude": 7.0},
            "timestamp": "2025-01-10T04:00:00Z",
            "temperature_c": -1.0,
            "humidity_pct": 95.0,
            "dew_point_c": -1.5,
            "wind_speed_ms": 1.0,
            "recent_precipitation_mm": 0.4,
            "surface_temperature_c": -2.5,
            "is_bridge": true
        }]"#;
        let p = FixtureProvider::from_json(json).unwrap();
        assert_eq!(p.len(), 1);
        let s = &p.samples[0];
        assert_eq!(s.surface_temperature_c, Some(-2.5));
        assert!(s.bridge());
        assert_eq!(s.cloud_cover_pct, None);
    }
}
