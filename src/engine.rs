//! # Risk Engine
//! Wires the models together behind one cheap-to-clone handle.
//!
//! `assess` is pure: the same sample and config always give the same
//! assessment. Location and route calls add the weather fetch on top.
//!
//! Nothing here is global. Each [`Engine`] owns its models, so tests can build
//! as many differently configured engines as they like.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use crate::analyze::{
    DayWindows, HybridPhysicsModel, ModelOutputs, RiskFactorModel, ScoreFusion, UncertaintyEnsemble,
};
use crate::assessment::RiskAssessment;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::route::{RouteAggregator, RouteAnalysis, RouteOptions, RouteSegmenter, Waypoint};
use crate::weather::{Location, WeatherProvider, WeatherSample};

/// Capability seam between route analysis and the scoring pipeline.
pub trait RiskAssessor: Send + Sync {
    fn assess(&self, sample: &WeatherSample) -> Result<RiskAssessment, EngineError>;
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

struct Inner {
    config: EngineConfig,
    factor: Option<RiskFactorModel>,
    physics: Option<HybridPhysicsModel>,
    ensemble: UncertaintyEnsemble,
    fusion: ScoreFusion,
    segmenter: RouteSegmenter,
    aggregator: RouteAggregator,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("factor_model", &self.inner.factor.is_some())
            .field("physics_model", &self.inner.physics.is_some())
            .field("trials", &self.inner.config.ensemble.trials)
            .finish()
    }
}

impl Engine {
    /// Build an engine. Rejects configs that fail [`EngineConfig::validate`].
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let inner = Inner {
            factor: config
                .fusion
                .factor_model
                .then(|| RiskFactorModel::new(config.factors.clone())),
            physics: config
                .fusion
                .physics_model
                .then(|| HybridPhysicsModel::new(config.physics.clone())),
            ensemble: UncertaintyEnsemble::new(config.ensemble.clone())
                .with_windows(DayWindows::from(&config.physics)),
            fusion: ScoreFusion::new(config.fusion.clone(), config.thresholds.clone()),
            segmenter: RouteSegmenter::new(config.route.clone()),
            aggregator: RouteAggregator::new(config.route.clone()),
            config,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Fused assessment of one sample.
    pub fn assess(&self, sample: &WeatherSample) -> Result<RiskAssessment, EngineError> {
        sample.validate()?;
        let inner = &self.inner;

        let factor = match &inner.factor {
            Some(m) => available(m.evaluate(sample))?,
            None => None,
        };
        let (physics, physics_missing) = match &inner.physics {
            Some(m) => match m.evaluate(sample) {
                Ok(p) => (Some(p), Vec::new()),
                Err(EngineError::MissingFeatures { features, .. }) => (None, features),
                Err(e) => return Err(e),
            },
            None => (None, Vec::new()),
        };

        let outputs = match (&factor, &physics) {
            (Some(f), Some(p)) => ModelOutputs::Both(f, p),
            (Some(f), None) => ModelOutputs::FactorOnly(f),
            (None, Some(p)) => ModelOutputs::PhysicsOnly(p),
            (None, None) => {
                counter!("assessment_missing_source_total").increment(1);
                return Err(EngineError::MissingFeatures {
                    model: "fusion",
                    features: physics_missing,
                });
            }
        };
        if !matches!(outputs, ModelOutputs::Both(..)) {
            counter!("assessment_missing_source_total").increment(1);
        }

        let ensemble = inner.ensemble.run(sample)?;
        let assessment = inner.fusion.fuse(outputs, &ensemble, sample.bridge());

        counter!("assessments_total", "level" => assessment.risk_level.label()).increment(1);
        debug!(
            target: "engine",
            probability = assessment.probability,
            level = assessment.risk_level.label(),
            confidence = assessment.confidence,
            sources = ?assessment.sources,
            "assessment computed"
        );
        Ok(assessment)
    }

    /// Fetch a sample for `location` and assess it.
    pub async fn assess_location(
        &self,
        provider: &dyn WeatherProvider,
        location: Location,
        lookback: Option<Duration>,
    ) -> Result<RiskAssessment, EngineError> {
        if !location.is_valid() {
            return Err(EngineError::InvalidCoordinate {
                index: 0,
                latitude: location.latitude,
                longitude: location.longitude,
            });
        }
        let lookback = lookback.unwrap_or_else(|| self.default_lookback());
        let sample = provider.sample(location, Some(lookback)).await.inspect_err(|e| {
            warn!(target: "engine", provider = provider.name(), error = %e, "weather fetch failed");
        })?;
        self.assess(&sample)
    }

    /// Assess every segment of a route and summarise it.
    ///
    /// Fails only on waypoint problems; segments without usable weather are degraded.
    pub async fn analyze_route(
        &self,
        provider: Arc<dyn WeatherProvider>,
        waypoints: &[Waypoint],
        options: RouteOptions,
    ) -> Result<RouteAnalysis, EngineError> {
        let inner = &self.inner;
        let plans = inner.segmenter.plan(waypoints)?;
        let lookback = options.lookback.unwrap_or_else(|| self.default_lookback());
        let assessor: Arc<dyn RiskAssessor> = Arc::new(self.clone());

        let segments = inner
            .segmenter
            .assess(plans, provider, assessor, lookback, options.timeout, options.as_of)
            .await;
        Ok(inner.aggregator.aggregate(segments))
    }

    fn default_lookback(&self) -> Duration {
        Duration::from_secs(self.inner.config.route.default_lookback_hours * 3600)
    }
}

impl RiskAssessor for Engine {
    fn assess(&self, sample: &WeatherSample) -> Result<RiskAssessment, EngineError> {
        Engine::assess(self, sample)
    }
}

/// Missing features make a model unavailable; every other error propagates.
fn available<T>(r: Result<T, EngineError>) -> Result<Option<T>, EngineError> {
    match r {
        Ok(v) => Ok(Some(v)),
        Err(EngineError::MissingFeatures { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{RiskLevel, Sources};
    use crate::config::FusionConfig;
    use chrono::{TimeZone, Utc};

    fn sample() -> WeatherSample {
        WeatherSample::new(
            Location::new(46.0, 0.0),
            Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap(),
            0.0,
            90.0,
            -0.5,
            1.0,
            2.0,
        )
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut cfg = EngineConfig::default();
        cfg.thresholds.low = 50.0;
        assert!(matches!(Engine::new(cfg), Err(EngineError::Computation(_))));
    }

    #[test]
    fn clones_share_models() {
        let e = Engine::new(EngineConfig::default()).unwrap();
        let c = e.clone();
        assert!(Arc::ptr_eq(&e.inner, &c.inner));
    }

    #[test]
    fn both_sources_by_default() {
        let e = Engine::new(EngineConfig::default()).unwrap();
        let a = e.assess(&sample()).unwrap();
        assert_eq!(a.sources, Sources::Both);
        assert!(a.risk_level >= RiskLevel::High);
    }

    #[test]
    fn strict_surface_requirement_falls_back_to_factor_model() {
        let mut cfg = EngineConfig::default();
        cfg.physics.require_measured_surface = true;
        let e = Engine::new(cfg).unwrap();
        let a = e.assess(&sample()).unwrap();
        assert_eq!(a.sources, Sources::FactorOnly);
        assert!(a.confidence <= 0.6);

        let b = e.assess(&sample().with_surface_temperature(-1.0)).unwrap();
        assert_eq!(b.sources, Sources::Both);
    }

    #[test]
    fn disabled_factor_model_uses_physics_only() {
        let cfg = EngineConfig {
            fusion: FusionConfig {
                factor_model: false,
                factor_weight: 0.0,
                physics_weight: 1.0,
                ..FusionConfig::default()
            },
            ..EngineConfig::default()
        };
        let e = Engine::new(cfg).unwrap();
        let a = e.assess(&sample()).unwrap();
        assert_eq!(a.sources, Sources::PhysicsOnly);
        assert!(a.confidence <= 0.6);
    }

    #[test]
    fn physics_and_ensemble_share_the_overnight_window() {
        let mut cfg = EngineConfig::default();
        cfg.physics.overnight_start_hour = 10;
        cfg.physics.overnight_end_hour = 14;
        let overnight_p = cfg.ensemble.dimensions.overnight_p;
        let e = Engine::new(cfg).unwrap();

        let a = e.assess(&sample()).unwrap();
        assert!(a.flags.overnight);
        let out = e.inner.ensemble.run(&sample()).unwrap();
        assert_eq!(out.dimensions.time_of_day, overnight_p);
    }

    #[test]
    fn validation_error_propagates() {
        let e = Engine::new(EngineConfig::default()).unwrap();
        let mut s = sample();
        s.humidity_pct = -4.0;
        assert!(e.assess(&s).unwrap_err().is_validation());
    }
}
