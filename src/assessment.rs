//! assessment.rs: the result shapes returned by the engine.
//!
//! A [`RiskAssessment`] is a plain value: a pure function of one weather sample
//! and the configuration, with no timestamps and no side effects. Callers
//! render or persist it themselves.

use serde::{Deserialize, Serialize};

/// Risk bucket derived from the 0–100 probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    None,
    Low,
    Moderate,
    High,
    Extreme,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::None,
        RiskLevel::Low,
        RiskLevel::Moderate,
        RiskLevel::High,
        RiskLevel::Extreme,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Extreme => "extreme",
        }
    }
}

/// One explained contribution to the risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    /// Points contributed; never negative.
    pub contribution: f64,
    pub description: String,
}

impl RiskFactor {
    pub fn new(name: impl Into<String>, contribution: f64, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contribution: contribution.max(0.0),
            description: description.into(),
        }
    }
}

/// Intermediate terms of the physics decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub p_wet: f64,
    pub p_freeze: f64,
    pub location_multiplier: f64,
    pub uncertainty_adjustment: f64,
}

impl Default for Components {
    fn default() -> Self {
        Self {
            p_wet: 0.0,
            p_freeze: 0.0,
            location_multiplier: 1.0,
            uncertainty_adjustment: 1.0,
        }
    }
}

/// Which models fed the fused probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sources {
    Both,
    FactorOnly,
    PhysicsOnly,
}

/// Conditions the route aggregator turns into route-level advice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentFlags {
    pub bridge: bool,
    pub rapid_cooling: bool,
    pub overnight: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Black-ice formation probability in [0, 100].
    pub probability: f64,
    pub risk_level: RiskLevel,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub components: Components,
    /// Ensemble distribution over [`RiskLevel::ALL`], summing to 1.
    pub distribution: [f64; 5],
    /// Shannon entropy (bits) of `distribution`.
    pub entropy: f64,
    pub sources: Sources,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub factors: Vec<RiskFactor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub explanations: Vec<String>,
    pub flags: AssessmentFlags,
    pub degraded: bool,
}

impl RiskAssessment {
    /// Mark as computed from fallback data and cap the confidence.
    pub fn degrade(mut self, confidence_cap: f64) -> Self {
        self.degraded = true;
        self.confidence = self.confidence.min(confidence_cap);
        self
    }

    /// Worst-case stand-in used when even the fallback sample cannot be assessed.
    pub fn conservative_ceiling() -> Self {
        Self {
            probability: 100.0,
            risk_level: RiskLevel::Extreme,
            confidence: 0.0,
            components: Components::default(),
            distribution: [0.0, 0.0, 0.0, 0.0, 1.0],
            entropy: 0.0,
            sources: Sources::Both,
            factors: Vec::new(),
            recommendations: recommendations_for(RiskLevel::Extreme, false),
            explanations: vec!["No usable weather data; assuming the worst case.".into()],
            flags: AssessmentFlags::default(),
            degraded: true,
        }
    }
}

/// Deterministic advice keyed by risk level, plus bridge context from Moderate upwards.
pub fn recommendations_for(level: RiskLevel, bridge: bool) -> Vec<String> {
    let base: &[&str] = match level {
        RiskLevel::None => &["No black-ice risk expected; normal winter driving applies."],
        RiskLevel::Low => &["Low black-ice risk; stay alert on shaded and low-lying stretches."],
        RiskLevel::Moderate => &[
            "Moderate black-ice risk; reduce speed and increase following distance.",
            "Avoid sudden braking, acceleration or steering.",
        ],
        RiskLevel::High => &[
            "High black-ice risk; drive well below the limit and keep extra distance.",
            "Postpone non-essential travel if possible.",
        ],
        RiskLevel::Extreme => &[
            "Extreme black-ice risk; avoid travel unless it is essential.",
            "Treat every wet-looking surface as ice.",
        ],
    };
    let mut out: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    if bridge && level >= RiskLevel::Moderate {
        out.push("Bridges and overpasses freeze before the road: slow down before elevated sections.".into());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn levels_are_ordered() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::High < RiskLevel::Extreme);
        for (i, l) in RiskLevel::ALL.iter().enumerate() {
            assert_eq!(l.index(), i);
        }
    }

    #[test]
    fn factor_contribution_is_never_negative() {
        assert_eq!(RiskFactor::new("x", -3.0, "").contribution, 0.0);
    }

    #[test]
    fn bridge_advice_only_from_moderate() {
        let low = recommendations_for(RiskLevel::Low, true);
        assert!(!low.iter().any(|r| r.contains("Bridges")));
        let moderate = recommendations_for(RiskLevel::Moderate, true);
        assert!(moderate.iter().any(|r| r.contains("Bridges")));
        let no_bridge = recommendations_for(RiskLevel::Extreme, false);
        assert!(!no_bridge.iter().any(|r| r.contains("Bridges")));
    }

    #[test]
    fn degrade_caps_confidence() {
        let a = RiskAssessment::conservative_ceiling();
        let mut b = a.clone();
        b.confidence = 0.9;
        b.degraded = false;
        let d = b.degrade(0.3);
        assert!(d.degraded);
        assert_eq!(d.confidence, 0.3);
    }

    #[test]
    fn serialized_shape_uses_uppercase_levels() {
        let a = RiskAssessment::conservative_ceiling();
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["risk_level"], json!("EXTREME"));
        assert_eq!(v["degraded"], json!(true));
        assert!(v["recommendations"].is_array());
        assert!(v.get("factors").is_none());
    }
}
