// src/weather/provider.rs
use std::time::Duration;

use crate::error::EngineError;
use crate::weather::{Location, WeatherSample};

/// External source of weather samples. Owns provider selection, merging and caching.
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Conditions at `location`; `lookback` bounds the precipitation/cooling window.
    async fn sample(
        &self,
        location: Location,
        lookback: Option<Duration>,
    ) -> Result<WeatherSample, EngineError>;

    fn name(&self) -> &'static str;
}
