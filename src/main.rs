//! Black-ice risk service: binary entrypoint.
//! Loads config, picks a weather provider and serves the HTTP API.
//!
//! See `README.md` for the endpoints and environment variables.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use black_ice_risk::config;
use black_ice_risk::metrics::Metrics;
use black_ice_risk::weather::providers::{FixtureProvider, OpenMeteoProvider};
use black_ice_risk::{router, AppState, Engine, WeatherProvider};

const ENV_WEATHER_FIXTURE: &str = "BLACK_ICE_WEATHER_FIXTURE";
const ENV_OPEN_METEO_URL: &str = "OPEN_METEO_URL";
const ENV_BIND_ADDR: &str = "BIND_ADDR";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("engine=info,route=info,weather=info,api=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn weather_provider() -> anyhow::Result<Arc<dyn WeatherProvider>> {
    if let Ok(path) = std::env::var(ENV_WEATHER_FIXTURE) {
        let fixture = FixtureProvider::from_path(Path::new(&path))?;
        info!(target: "weather", path = %path, samples = fixture.len(), "using fixture weather");
        return Ok(Arc::new(fixture));
    }
    let url = std::env::var(ENV_OPEN_METEO_URL).ok();
    let provider = OpenMeteoProvider::new(url.as_deref())?;
    info!(target: "weather", "using open-meteo weather");
    Ok(Arc::new(provider))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Recorder first so every later metric lands in it.
    let metrics = Metrics::init()?;

    let cfg = config::load_default()?;
    let engine = Engine::new(cfg).context("engine config rejected")?;
    let weather = weather_provider()?;

    let app = router(AppState::new(engine, weather)).merge(metrics.router());

    let addr = std::env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(target: "api", %addr, "listening");

    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
