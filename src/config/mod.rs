// src/config/mod.rs
pub mod engine;

pub use engine::{
    BucketWeights, DimensionShapes, EngineConfig, EnsembleConfig, FactorConfig, FallbackSample, FusionConfig,
    PhysicsConfig, RiskThresholds, RouteConfig, SafetyBands, SamplePoint, WetWeights,
};

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENGINE_CONFIG_PATH: &str = "config/engine.toml";
pub const ENV_ENGINE_CONFIG_PATH: &str = "BLACK_ICE_CONFIG_PATH";

/// Parse and validate a TOML document. Missing keys take their defaults.
pub fn from_toml_str(s: &str) -> Result<EngineConfig> {
    let cfg: EngineConfig = toml::from_str(s).context("parse engine config TOML")?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<EngineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading engine config from {}", path.display()))?;
    from_toml_str(&content).with_context(|| format!("loading {}", path.display()))
}

/// Load configuration using env var + fallbacks:
/// 1) $BLACK_ICE_CONFIG_PATH
/// 2) config/engine.toml
/// 3) built-in defaults
pub fn load_default() -> Result<EngineConfig> {
    if let Ok(p) = std::env::var(ENV_ENGINE_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!(
                "{ENV_ENGINE_CONFIG_PATH} points to non-existent path {}",
                pb.display()
            ));
        }
    }
    let default_p = PathBuf::from(DEFAULT_ENGINE_CONFIG_PATH);
    if default_p.exists() {
        return load_from(&default_p);
    }
    tracing::info!(target: "engine", "no engine config file found, using built-in defaults");
    Ok(EngineConfig::default())
}
