//! Fuse the deterministic models with the ensemble into one assessment.
//!
//! With both models present the probability is their weighted mean. With one
//! present it is used alone and confidence is capped; having neither is an
//! error raised by the caller before fusion.

use crate::assessment::{
    recommendations_for, AssessmentFlags, Components, RiskAssessment, RiskFactor, Sources,
};
use crate::config::{FusionConfig, RiskThresholds};

use super::ensemble::EnsembleOutput;
use super::factors::FactorOutput;
use super::physics::PhysicsOutput;

/// The deterministic model results available for one sample.
#[derive(Debug, Clone, Copy)]
pub enum ModelOutputs<'a> {
    Both(&'a FactorOutput, &'a PhysicsOutput),
    FactorOnly(&'a FactorOutput),
    PhysicsOnly(&'a PhysicsOutput),
}

impl<'a> ModelOutputs<'a> {
    pub fn sources(&self) -> Sources {
        match self {
            ModelOutputs::Both(..) => Sources::Both,
            ModelOutputs::FactorOnly(_) => Sources::FactorOnly,
            ModelOutputs::PhysicsOnly(_) => Sources::PhysicsOnly,
        }
    }

    fn physics(&self) -> Option<&'a PhysicsOutput> {
        match *self {
            ModelOutputs::Both(_, p) | ModelOutputs::PhysicsOnly(p) => Some(p),
            ModelOutputs::FactorOnly(_) => None,
        }
    }

    fn factor(&self) -> Option<&'a FactorOutput> {
        match *self {
            ModelOutputs::Both(f, _) | ModelOutputs::FactorOnly(f) => Some(f),
            ModelOutputs::PhysicsOnly(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoreFusion {
    fusion: FusionConfig,
    thresholds: RiskThresholds,
}

impl ScoreFusion {
    pub fn new(fusion: FusionConfig, thresholds: RiskThresholds) -> Self {
        Self { fusion, thresholds }
    }

    /// Fused 0–100 probability and, for a single source, the confidence cap.
    pub fn probability(&self, outputs: ModelOutputs<'_>) -> (f64, Option<f64>) {
        let cap = Some(self.fusion.single_source_confidence_cap);
        let (p, cap) = match outputs {
            ModelOutputs::Both(f, p) => (
                self.fusion.factor_weight * f.probability + self.fusion.physics_weight * p.probability,
                None,
            ),
            ModelOutputs::FactorOnly(f) => (f.probability, cap),
            ModelOutputs::PhysicsOnly(p) => (p.probability, cap),
        };
        (p.clamp(0.0, 100.0), cap)
    }

    pub fn fuse(&self, outputs: ModelOutputs<'_>, ensemble: &EnsembleOutput, bridge: bool) -> RiskAssessment {
        let (probability, cap) = self.probability(outputs);
        let risk_level = self.thresholds.level_for(probability);
        let confidence = match cap {
            Some(c) => ensemble.confidence.min(c),
            None => ensemble.confidence,
        };

        let physics = outputs.physics();
        let factors = merge_factors(
            outputs.factor().map(|f| f.factors.as_slice()).unwrap_or_default(),
            physics.map(|p| p.factors.as_slice()).unwrap_or_default(),
        );

        let mut explanations = Vec::new();
        if let ModelOutputs::Both(f, p) = outputs {
            explanations.push(format!(
                "fused {probability:.1} = {:.2} × factor {:.1} + {:.2} × physics {:.1}",
                self.fusion.factor_weight, f.probability, self.fusion.physics_weight, p.probability
            ));
        } else {
            explanations.push(format!(
                "single source ({:?}); confidence capped at {:.2}",
                outputs.sources(),
                self.fusion.single_source_confidence_cap
            ));
        }
        if let Some(p) = physics {
            explanations.extend(p.explanations.iter().cloned());
        }

        RiskAssessment {
            probability,
            risk_level,
            confidence,
            components: physics.map(|p| p.components).unwrap_or_default(),
            distribution: ensemble.distribution,
            entropy: ensemble.entropy,
            sources: outputs.sources(),
            factors,
            recommendations: recommendations_for(risk_level, bridge),
            explanations,
            flags: AssessmentFlags {
                bridge,
                rapid_cooling: physics.is_some_and(|p| p.rapid_cooling),
                overnight: physics.is_some_and(|p| p.overnight),
            },
            degraded: false,
        }
    }
}

/// Union by name keeping the larger contribution, largest first.
fn merge_factors(a: &[RiskFactor], b: &[RiskFactor]) -> Vec<RiskFactor> {
    let mut out: Vec<RiskFactor> = Vec::with_capacity(a.len() + b.len());
    for f in a.iter().chain(b.iter()) {
        match out.iter_mut().find(|o| o.name == f.name) {
            Some(existing) if existing.contribution < f.contribution => *existing = f.clone(),
            Some(_) => {}
            None => out.push(f.clone()),
        }
    }
    out.sort_by(|x, y| y.contribution.total_cmp(&x.contribution));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::ensemble::Dimensions;
    use crate::assessment::RiskLevel;

    fn factor(p: f64) -> FactorOutput {
        FactorOutput {
            probability: p,
            total_points: p * 1.2,
            factors: vec![RiskFactor::new("Temperature", 40.0, "t")],
        }
    }

    fn physics(p: f64) -> PhysicsOutput {
        PhysicsOutput {
            probability: p,
            components: Components {
                p_wet: 0.5,
                p_freeze: 0.5,
                location_multiplier: 1.3,
                uncertainty_adjustment: 1.0,
            },
            surface_temperature_c: -1.0,
            surface_measured: true,
            rapid_cooling: true,
            overnight: false,
            factors: vec![RiskFactor::new("BridgeExposure", 30.0, "b")],
            explanations: vec!["physics line".into()],
        }
    }

    fn ensemble(confidence: f64) -> EnsembleOutput {
        EnsembleOutput {
            distribution: [0.0, 0.0, 0.5, 0.5, 0.0],
            entropy: 1.0,
            confidence,
            most_probable: RiskLevel::High,
            dimensions: Dimensions {
                temperature: 0.5,
                moisture: 0.5,
                wind_chill: 0.5,
                precipitation: 0.5,
                time_of_day: 0.5,
            },
            trials: 2,
        }
    }

    fn fusion() -> ScoreFusion {
        ScoreFusion::new(FusionConfig::default(), RiskThresholds::default())
    }

    #[test]
    fn both_sources_average() {
        let (f, p) = (factor(80.0), physics(40.0));
        let a = fusion().fuse(ModelOutputs::Both(&f, &p), &ensemble(0.9), true);
        assert_eq!(a.probability, 60.0);
        assert_eq!(a.risk_level, RiskLevel::High);
        assert_eq!(a.confidence, 0.9);
        assert_eq!(a.sources, Sources::Both);
        assert_eq!(a.factors[0].name, "Temperature");
        assert_eq!(a.factors.len(), 2);
        assert!(a.flags.bridge && a.flags.rapid_cooling);
        assert!(a.recommendations.iter().any(|r| r.contains("Bridges")));
        assert!(a.explanations.iter().any(|e| e == "physics line"));
    }

    #[test]
    fn single_source_caps_confidence() {
        let f = factor(30.0);
        let a = fusion().fuse(ModelOutputs::FactorOnly(&f), &ensemble(0.9), false);
        assert_eq!(a.probability, 30.0);
        assert_eq!(a.confidence, 0.6);
        assert_eq!(a.sources, Sources::FactorOnly);
        assert_eq!(a.components, Components::default());

        let a = fusion().fuse(ModelOutputs::FactorOnly(&f), &ensemble(0.4), false);
        assert_eq!(a.confidence, 0.4);
    }

    #[test]
    fn custom_weights_apply() {
        let cfg = FusionConfig {
            factor_weight: 0.25,
            physics_weight: 0.75,
            ..FusionConfig::default()
        };
        let fu = ScoreFusion::new(cfg, RiskThresholds::default());
        let (f, p) = (factor(100.0), physics(0.0));
        assert_eq!(fu.probability(ModelOutputs::Both(&f, &p)), (25.0, None));
    }

    #[test]
    fn merge_keeps_larger_duplicate() {
        let a = [RiskFactor::new("X", 5.0, "a")];
        let b = [RiskFactor::new("X", 9.0, "b"), RiskFactor::new("Y", 1.0, "c")];
        let m = merge_factors(&a, &b);
        assert_eq!(m.len(), 2);
        assert_eq!(m[0].description, "b");
    }
}
