use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::assessment::RiskAssessment;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::route::{RouteAnalysis, RouteOptions, Waypoint};
use crate::weather::{Location, WeatherProvider, WeatherSample};

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub weather: Arc<dyn WeatherProvider>,
}

impl AppState {
    pub fn new(engine: Engine, weather: Arc<dyn WeatherProvider>) -> Self {
        Self { engine, weather }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/assess", post(assess))
        .route("/assess/location", post(assess_location))
        .route("/route", post(route))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Engine errors mapped to HTTP statuses.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation { .. } | EngineError::MissingFeatures { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::InsufficientWaypoints(_) | EngineError::InvalidCoordinate { .. } => {
                StatusCode::BAD_REQUEST
            }
            EngineError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Computation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::info!(target: "api", status = status.as_u16(), error = %self.0, "request rejected");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn assess(
    State(state): State<AppState>,
    Json(sample): Json<WeatherSample>,
) -> Result<Json<RiskAssessment>, ApiError> {
    Ok(Json(state.engine.assess(&sample)?))
}

#[derive(Deserialize)]
struct LocationReq {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    lookback_hours: Option<u64>,
}

async fn assess_location(
    State(state): State<AppState>,
    Json(req): Json<LocationReq>,
) -> Result<Json<RiskAssessment>, ApiError> {
    let location = Location::new(req.latitude, req.longitude);
    let lookback = req.lookback_hours.map(hours);
    let a = state
        .engine
        .assess_location(state.weather.as_ref(), location, lookback)
        .await?;
    Ok(Json(a))
}

#[derive(Deserialize)]
struct RouteReq {
    waypoints: Vec<Waypoint>,
    #[serde(default)]
    lookback_hours: Option<u64>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

async fn route(
    State(state): State<AppState>,
    Json(req): Json<RouteReq>,
) -> Result<Json<RouteAnalysis>, ApiError> {
    let mut options = RouteOptions::default();
    if let Some(h) = req.lookback_hours {
        options = options.with_lookback(hours(h));
    }
    if let Some(ms) = req.timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }
    let analysis = state
        .engine
        .analyze_route(state.weather.clone(), &req.waypoints, options)
        .await?;
    Ok(Json(analysis))
}

fn hours(h: u64) -> Duration {
    Duration::from_secs(h.saturating_mul(3600))
}
