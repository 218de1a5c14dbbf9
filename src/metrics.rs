use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Register metric descriptions once per process.
pub fn ensure_metrics_described() {
    DESCRIBED.get_or_init(|| {
        describe_counter!("assessments_total", "Assessments computed, by risk level");
        describe_counter!(
            "assessment_missing_source_total",
            "Assessments where a model was unavailable or disabled"
        );
        describe_counter!(
            "route_segments_degraded_total",
            "Route segments assessed from fallback conditions"
        );
        describe_counter!("weather_fetch_errors_total", "Weather provider failures, by provider");
        describe_histogram!("ensemble_ms", Unit::Milliseconds, "Monte-Carlo ensemble run time");
        describe_histogram!("weather_fetch_ms", Unit::Milliseconds, "Weather provider round trip");
        describe_gauge!("route_last_safety_score", "Safety score of the most recent route");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once, before anything records.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
