// src/route/aggregator.rs
//! Reduce assessed segments to a route summary.

use metrics::gauge;

use super::{DangerZone, RouteAnalysis, RouteSegment, SafetyBand};
use crate::config::RouteConfig;

#[derive(Debug, Clone)]
pub struct RouteAggregator {
    cfg: RouteConfig,
}

impl RouteAggregator {
    pub fn new(cfg: RouteConfig) -> Self {
        Self { cfg }
    }

    pub fn aggregate(&self, segments: Vec<RouteSegment>) -> RouteAnalysis {
        // Strict `>` keeps the lowest index on ties.
        let mut max_risk = 0.0;
        let mut max_risk_segment = None;
        for s in &segments {
            if max_risk_segment.is_none() || s.probability() > max_risk {
                max_risk = s.probability();
                max_risk_segment = Some(s.index);
            }
        }

        let safety_score = (100.0 - max_risk).clamp(0.0, 100.0);
        let safety_band = SafetyBand::from_score(safety_score, &self.cfg.safety_bands);

        let danger_zones: Vec<DangerZone> = segments
            .iter()
            .filter(|s| s.probability() >= self.cfg.danger_threshold)
            .map(|s| DangerZone {
                segment_index: s.index,
                center: s.sample_point,
                radius_km: self.cfg.danger_zone_radius_km,
                probability: s.probability(),
            })
            .collect();

        let degraded_segments: Vec<usize> = segments
            .iter()
            .filter(|s| s.degraded())
            .map(|s| s.index)
            .collect();

        let total_distance_km = segments.iter().map(|s| s.distance_km).sum();

        let recommendations = self.recommendations(&segments, safety_band, &danger_zones, &degraded_segments);

        gauge!("route_last_safety_score").set(safety_score);
        tracing::info!(
            target: "route",
            segments = segments.len(),
            max_risk,
            safety_score,
            danger_zones = danger_zones.len(),
            degraded = degraded_segments.len(),
            "route aggregated"
        );

        RouteAnalysis {
            segments,
            danger_zones,
            safety_score,
            safety_band,
            max_risk,
            max_risk_segment,
            total_distance_km,
            degraded_segments,
            recommendations,
        }
    }

    fn recommendations(
        &self,
        segments: &[RouteSegment],
        band: SafetyBand,
        danger_zones: &[DangerZone],
        degraded: &[usize],
    ) -> Vec<String> {
        let mut out = vec![match band {
            SafetyBand::Safe => "Route looks safe; normal winter caution applies.".to_string(),
            SafetyBand::Caution => "Drive with caution: isolated icy stretches are possible.".to_string(),
            SafetyBand::Risky => "Risky route: reduce speed throughout and allow extra time.".to_string(),
            SafetyBand::Dangerous => "Dangerous route: consider delaying travel or choosing another road.".to_string(),
        }];

        if !danger_zones.is_empty() {
            let list = danger_zones
                .iter()
                .map(|z| (z.segment_index + 1).to_string())
                .collect::<Vec<_>>()
                .join(", ");
            out.push(format!(
                "{} danger zone(s) at segment(s) {list}; slow down well before them.",
                danger_zones.len()
            ));
        }
        if segments.iter().any(|s| s.assessment.flags.rapid_cooling) {
            out.push("Temperatures are falling fast along the route; conditions may worsen.".into());
        }
        if segments.iter().any(|s| s.assessment.flags.overnight) {
            out.push("Overnight hours carry the highest icing risk; prefer daytime travel.".into());
        }
        if !degraded.is_empty() {
            out.push(format!(
                "Weather data was unavailable for {} segment(s); their risk uses conservative estimates.",
                degraded.len()
            ));
        }
        out
    }
}
