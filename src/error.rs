//! Typed failures surfaced by the engine.
//!
//! Single-point calls propagate these directly. Route analysis only fails on
//! waypoint problems; per-segment data issues degrade the segment instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A weather field is non-finite or outside its physically plausible range.
    #[error("invalid {field}: {value} (expected {expected})")]
    Validation {
        field: &'static str,
        value: f64,
        expected: String,
    },

    /// The weather collaborator could not produce a sample.
    #[error("weather data unavailable: {0}")]
    DataUnavailable(String),

    /// A configuration invariant does not hold. Fatal at engine construction.
    #[error("configuration invariant violated: {0}")]
    Computation(String),

    #[error("route needs at least 2 waypoints, got {0}")]
    InsufficientWaypoints(usize),

    #[error("waypoint {index} has invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinate {
        index: usize,
        latitude: f64,
        longitude: f64,
    },

    /// No enabled model could evaluate the sample.
    #[error("{model} model is missing required features: {}", .features.join(", "))]
    MissingFeatures {
        model: &'static str,
        features: Vec<&'static str>,
    },
}

impl EngineError {
    pub(crate) fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::Validation {
            field,
            value,
            expected: format!("finite value in [{min}, {max}]"),
        }
    }

    /// True for input problems the caller can fix (as opposed to data or config failures).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::InsufficientWaypoints(_) | Self::InvalidCoordinate { .. }
        )
    }
}
