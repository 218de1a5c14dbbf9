// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod assessment;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod route;
pub mod weather;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::assessment::{RiskAssessment, RiskFactor, RiskLevel};
pub use crate::config::EngineConfig;
pub use crate::engine::{Engine, RiskAssessor};
pub use crate::error::EngineError;
pub use crate::route::{RouteAnalysis, RouteOptions, Waypoint};
pub use crate::weather::{Location, WeatherProvider, WeatherSample};
