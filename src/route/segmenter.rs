// src/route/segmenter.rs
//! Waypoints → segments, then one fetch + assessment per segment on a
//! bounded worker pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::geo::{haversine_km, midpoint};
use super::{RouteSegment, Waypoint};
use crate::assessment::RiskAssessment;
use crate::config::{RouteConfig, SamplePoint};
use crate::engine::RiskAssessor;
use crate::error::EngineError;
use crate::weather::{Location, WeatherProvider, WeatherSample};

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub index: usize,
    pub start: Waypoint,
    pub end: Waypoint,
    pub distance_km: f64,
    pub sample_point: Location,
}

#[derive(Debug, Clone)]
pub struct RouteSegmenter {
    cfg: RouteConfig,
}

impl RouteSegmenter {
    pub fn new(cfg: RouteConfig) -> Self {
        Self { cfg }
    }

    /// Validate waypoints and build the N−1 segment plans.
    pub fn plan(&self, waypoints: &[Waypoint]) -> Result<Vec<SegmentPlan>, EngineError> {
        if waypoints.len() < 2 {
            return Err(EngineError::InsufficientWaypoints(waypoints.len()));
        }
        if let Some((index, w)) = waypoints
            .iter()
            .enumerate()
            .find(|(_, w)| !w.location().is_valid())
        {
            return Err(EngineError::InvalidCoordinate {
                index,
                latitude: w.latitude,
                longitude: w.longitude,
            });
        }

        Ok(waypoints
            .windows(2)
            .enumerate()
            .map(|(index, pair)| {
                let (a, b) = (pair[0].location(), pair[1].location());
                SegmentPlan {
                    index,
                    start: pair[0].clone(),
                    end: pair[1].clone(),
                    distance_km: haversine_km(a, b),
                    sample_point: match self.cfg.sample_point {
                        SamplePoint::Midpoint => midpoint(a, b),
                        SamplePoint::Start => a,
                        SamplePoint::End => b,
                    },
                }
            })
            .collect())
    }

    /// Assess every planned segment. Never fails: problem segments come back degraded.
    pub async fn assess(
        &self,
        plans: Vec<SegmentPlan>,
        provider: Arc<dyn WeatherProvider>,
        assessor: Arc<dyn RiskAssessor>,
        lookback: Duration,
        timeout: Option<Duration>,
        as_of: DateTime<Utc>,
    ) -> Vec<RouteSegment> {
        let n = plans.len();
        let share = timeout.map(|t| t / u32::try_from(n.max(1)).unwrap_or(u32::MAX));
        let permits = Arc::new(Semaphore::new(self.cfg.max_concurrency.max(1)));
        let mut set = JoinSet::new();

        for plan in plans.iter().cloned() {
            let permits = permits.clone();
            let provider = provider.clone();
            let assessor = assessor.clone();
            let cfg = self.cfg.clone();
            set.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let index = plan.index;
                let fetched = fetch(provider.as_ref(), plan.sample_point, lookback, share).await;
                let result = fetched.and_then(|sample| {
                    let assessment = assessor.assess(&sample)?;
                    Ok((sample, assessment))
                });
                let segment = match result {
                    Ok((sample, assessment)) => segment_from(plan, sample, assessment),
                    Err(e) => {
                        warn!(target: "route", segment = index, error = %e, "segment degraded");
                        degraded_segment(plan, &cfg, assessor.as_ref(), as_of)
                    }
                };
                (index, segment)
            });
        }

        let mut slots: Vec<Option<RouteSegment>> = vec![None; n];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, segment)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(segment);
                    }
                }
                Err(e) => warn!(target: "route", error = %e, "segment worker failed"),
            }
        }

        // Workers that panicked left their slot empty.
        let mut segments = Vec::with_capacity(n);
        for (plan, slot) in plans.into_iter().zip(slots) {
            let segment = match slot {
                Some(segment) => segment,
                None => self.refill(plan, assessor.clone(), as_of).await,
            };
            segments.push(segment);
        }

        let degraded = segments.iter().filter(|s| s.degraded()).count();
        if degraded > 0 {
            counter!("route_segments_degraded_total").increment(degraded as u64);
        }
        debug!(target: "route", segments = n, degraded, "segments assessed");
        segments
    }

    /// Fallback for a slot whose worker died. Runs on its own task so a
    /// second panic in the assessor still yields a segment.
    async fn refill(
        &self,
        plan: SegmentPlan,
        assessor: Arc<dyn RiskAssessor>,
        as_of: DateTime<Utc>,
    ) -> RouteSegment {
        let cfg = self.cfg.clone();
        let task_plan = plan.clone();
        let handle = tokio::spawn(async move { degraded_segment(task_plan, &cfg, assessor.as_ref(), as_of) });
        match handle.await {
            Ok(segment) => segment,
            Err(e) => {
                warn!(target: "route", segment = plan.index, error = %e, "fallback assessment failed; using worst case");
                let sample = self.cfg.fallback.to_sample(plan.sample_point, as_of);
                segment_from(plan, sample, RiskAssessment::conservative_ceiling())
            }
        }
    }
}

async fn fetch(
    provider: &dyn WeatherProvider,
    location: Location,
    lookback: Duration,
    share: Option<Duration>,
) -> Result<WeatherSample, EngineError> {
    let fut = provider.sample(location, Some(lookback));
    match share {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            EngineError::DataUnavailable(format!(
                "{} exceeded its {limit:?} time share",
                provider.name()
            ))
        })?,
        None => fut.await,
    }
}

fn segment_from(plan: SegmentPlan, sample: WeatherSample, assessment: RiskAssessment) -> RouteSegment {
    RouteSegment {
        index: plan.index,
        start: plan.start,
        end: plan.end,
        distance_km: plan.distance_km,
        sample_point: plan.sample_point,
        sample,
        assessment,
    }
}

/// Assess the configured fallback conditions at the segment's sample point.
fn degraded_segment(
    plan: SegmentPlan,
    cfg: &RouteConfig,
    assessor: &dyn RiskAssessor,
    as_of: DateTime<Utc>,
) -> RouteSegment {
    let sample = cfg.fallback.to_sample(plan.sample_point, as_of);
    let assessment = match assessor.assess(&sample) {
        Ok(a) => a.degrade(cfg.degraded_confidence_cap),
        Err(e) => {
            warn!(target: "route", segment = plan.index, error = %e, "fallback sample rejected; using worst case");
            RiskAssessment::conservative_ceiling()
        }
    };
    segment_from(plan, sample, assessment)
}
