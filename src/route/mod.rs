// src/route/mod.rs
//! Route analysis: split a waypoint list into segments, assess each one
//! concurrently, and summarise the route.
//!
//! A route call only fails on bad waypoints. A segment whose weather cannot
//! be fetched or validated is assessed from conservative fallback conditions
//! and marked `degraded`, so the result always has one entry per segment.

pub mod aggregator;
pub mod geo;
pub mod segmenter;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::RiskAssessment;
use crate::config::SafetyBands;
use crate::weather::{Location, WeatherSample};

pub use aggregator::RouteAggregator;
pub use segmenter::{RouteSegmenter, SegmentPlan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Waypoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub index: usize,
    pub start: Waypoint,
    pub end: Waypoint,
    pub distance_km: f64,
    pub sample_point: Location,
    /// Weather the assessment was computed from (the fallback sample when degraded).
    pub sample: WeatherSample,
    pub assessment: RiskAssessment,
}

impl RouteSegment {
    pub fn probability(&self) -> f64 {
        self.assessment.probability
    }

    pub fn degraded(&self) -> bool {
        self.assessment.degraded
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DangerZone {
    pub segment_index: usize,
    pub center: Location,
    pub radius_km: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SafetyBand {
    Safe,
    Caution,
    Risky,
    Dangerous,
}

impl SafetyBand {
    pub fn from_score(score: f64, bands: &SafetyBands) -> Self {
        if score >= bands.safe {
            SafetyBand::Safe
        } else if score >= bands.caution {
            SafetyBand::Caution
        } else if score >= bands.risky {
            SafetyBand::Risky
        } else {
            SafetyBand::Dangerous
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAnalysis {
    /// One entry per consecutive waypoint pair, in input order.
    pub segments: Vec<RouteSegment>,
    pub danger_zones: Vec<DangerZone>,
    /// `100 − max segment probability`, in [0, 100].
    pub safety_score: f64,
    pub safety_band: SafetyBand,
    pub max_risk: f64,
    /// First segment reaching `max_risk`.
    pub max_risk_segment: Option<usize>,
    pub total_distance_km: f64,
    pub degraded_segments: Vec<usize>,
    pub recommendations: Vec<String>,
}

/// Per-call knobs for [`crate::engine::Engine::analyze_route`].
#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// Precipitation lookback; the configured default when `None`.
    pub lookback: Option<Duration>,
    /// Overall time budget, shared evenly between fetch rounds.
    pub timeout: Option<Duration>,
    /// Timestamp given to fallback samples.
    pub as_of: DateTime<Utc>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            lookback: None,
            timeout: None,
            as_of: Utc::now(),
        }
    }
}

impl RouteOptions {
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = Some(lookback);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn as_of(mut self, at: DateTime<Utc>) -> Self {
        self.as_of = at;
        self
    }
}
