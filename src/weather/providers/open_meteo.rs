// src/weather/providers/open_meteo.rs
//! Open-Meteo forecast API adapter.
//!
//! One request per sample: current conditions plus hourly precipitation and
//! temperature covering the lookback window. Recent precipitation is the sum
//! over that window; the cooling rate is the temperature drop across it.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::error::EngineError;
use crate::weather::{Location, WeatherProvider, WeatherSample};

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";
const DEFAULT_LOOKBACK: Duration = Duration::from_secs(6 * 3600);

pub struct OpenMeteoProvider {
    http: reqwest::Client,
    base_url: String,
}

impl OpenMeteoProvider {
    pub fn new(base_url: Option<&str>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("black-ice-risk/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .context("build open-meteo http client")?;
        Ok(Self {
            http,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
        })
    }

    async fn fetch_body(&self, location: Location, past_hours: u64) -> anyhow::Result<String> {
        let query = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            (
                "current",
                "temperature_2m,relative_humidity_2m,dew_point_2m,wind_speed_10m,cloud_cover"
                    .to_string(),
            ),
            (
                "hourly",
                "precipitation,temperature_2m,precipitation_probability".to_string(),
            ),
            ("past_hours", past_hours.to_string()),
            ("forecast_hours", "1".to_string()),
            ("wind_speed_unit", "ms".to_string()),
            ("timezone", "auto".to_string()),
            ("timeformat", "unixtime".to_string()),
        ];
        let resp = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .context("open-meteo http get()")?
            .error_for_status()
            .context("open-meteo status")?;
        resp.text().await.context("open-meteo .text()")
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn sample(
        &self,
        location: Location,
        lookback: Option<Duration>,
    ) -> Result<WeatherSample, EngineError> {
        let lookback = lookback.unwrap_or(DEFAULT_LOOKBACK);
        let past_hours = lookback.as_secs().div_ceil(3600).max(1);

        let t0 = Instant::now();
        let body = match self.fetch_body(location, past_hours).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(target: "weather", error = ?e, provider = "open-meteo", "provider http error");
                counter!("weather_fetch_errors_total", "provider" => "open-meteo").increment(1);
                return Err(EngineError::DataUnavailable(format!("{e:#}")));
            }
        };
        histogram!("weather_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        parse_forecast(&body, location, lookback).inspect_err(|_| {
            counter!("weather_fetch_errors_total", "provider" => "open-meteo").increment(1);
        })
    }

    fn name(&self) -> &'static str {
        "open-meteo"
    }
}

#[derive(Debug, Deserialize)]
struct Forecast {
    #[serde(default)]
    utc_offset_seconds: Option<i32>,
    current: Current,
    #[serde(default)]
    hourly: Option<Hourly>,
}

#[derive(Debug, Deserialize)]
struct Current {
    time: i64,
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    dew_point_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    #[serde(default)]
    cloud_cover: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Hourly {
    #[serde(default)]
    time: Vec<i64>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
}

fn required(name: &'static str, v: Option<f64>) -> Result<f64, EngineError> {
    v.ok_or_else(|| EngineError::DataUnavailable(format!("open-meteo response lacks {name}")))
}

/// Build a sample from an Open-Meteo forecast body (`timeformat=unixtime`).
pub fn parse_forecast(
    body: &str,
    location: Location,
    lookback: Duration,
) -> Result<WeatherSample, EngineError> {
    let f: Forecast = serde_json::from_str(body)
        .map_err(|e| EngineError::DataUnavailable(format!("open-meteo body: {e}")))?;
    let cur = &f.current;

    let timestamp = DateTime::from_timestamp(cur.time, 0).ok_or_else(|| {
        EngineError::DataUnavailable(format!("open-meteo time out of range: {}", cur.time))
    })?;
    let temperature_c = required("temperature_2m", cur.temperature_2m)?;

    let mut sample = WeatherSample::new(
        location,
        timestamp,
        temperature_c,
        required("relative_humidity_2m", cur.relative_humidity_2m)?,
        required("dew_point_2m", cur.dew_point_2m)?,
        required("wind_speed_10m", cur.wind_speed_10m)?,
        0.0,
    );
    sample.cloud_cover_pct = cur.cloud_cover;
    sample.utc_offset_minutes = f.utc_offset_seconds.map(|s| s / 60);

    if let Some(h) = f.hourly.as_ref() {
        let window_start = cur.time - lookback.as_secs() as i64;
        let in_window: Vec<usize> = h
            .time
            .iter()
            .enumerate()
            .filter(|(_, t)| **t >= window_start && **t <= cur.time)
            .map(|(i, _)| i)
            .collect();

        sample.recent_precipitation_mm = in_window
            .iter()
            .filter_map(|&i| h.precipitation.get(i).copied().flatten())
            .sum();

        // Cooling rate: oldest in-window temperature vs. now.
        if let Some((t_then, temp_then)) = in_window
            .iter()
            .find_map(|&i| Some((h.time.get(i)?, h.temperature_2m.get(i).copied().flatten()?)))
        {
            let hours = (cur.time - t_then) as f64 / 3600.0;
            if hours >= 1.0 {
                sample.cooling_rate_c_per_hour = Some((temp_then - temperature_c) / hours);
            }
        }

        // Precipitation probability for the hour nearest to "now".
        sample.precipitation_probability_pct = h
            .time
            .iter()
            .enumerate()
            .filter_map(|(i, t)| Some(((t - cur.time).abs(), h.precipitation_probability.get(i).copied().flatten()?)))
            .min_by_key(|(d, _)| *d)
            .map(|(_, p)| p);
    }

    tracing::debug!(
        target: "weather",
        provider = "open-meteo",
        temperature_c,
        recent_precipitation_mm = sample.recent_precipitation_mm,
        "parsed forecast"
    );
    Ok(sample)
}
