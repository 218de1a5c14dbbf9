// tests/engine_config.rs
//
// Config loading from TOML files and the env override, plus the invariants
// an Engine refuses to start without.

use std::path::Path;
use std::{env, fs};

use black_ice_risk::config::{self, SamplePoint, ENV_ENGINE_CONFIG_PATH};
use black_ice_risk::{Engine, EngineConfig, EngineError};

#[test]
fn checked_in_config_matches_builtin_defaults() {
    let p = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/engine.toml");
    let cfg = config::load_from(&p).expect("config/engine.toml loads");
    assert_eq!(cfg, EngineConfig::default());
}

#[test]
fn overrides_flow_into_engine() {
    let cfg = config::from_toml_str(
        r#"
        [thresholds]
        high = 55.0

        [route]
        sample_point = "end"
        max_concurrency = 8
        "#,
    )
    .unwrap();
    assert_eq!(cfg.thresholds.high, 55.0);
    assert_eq!(cfg.route.sample_point, SamplePoint::End);
    let e = Engine::new(cfg).unwrap();
    assert_eq!(e.config().route.max_concurrency, 8);
}

#[test]
fn too_many_trials_are_rejected() {
    let err = config::from_toml_str("[ensemble]\ntrials = 500000\n").unwrap_err();
    assert!(format!("{err:#}").contains("trials"), "{err:#}");
}

#[test]
fn disabling_both_models_is_rejected() {
    let mut cfg = EngineConfig::default();
    cfg.fusion.factor_model = false;
    cfg.fusion.physics_model = false;
    assert!(matches!(Engine::new(cfg), Err(EngineError::Computation(m)) if m.contains("at least one model")));
}

#[test]
fn malformed_toml_is_an_error() {
    assert!(config::from_toml_str("[route\nmax_concurrency = ").is_err());
    assert!(config::from_toml_str("[route]\nsample_point = \"sideways\"\n").is_err());
}

#[serial_test::serial]
#[test]
fn env_path_takes_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("engine.toml");
    fs::write(&p, "[fusion]\nfactor_weight = 0.3\nphysics_weight = 0.7\n").unwrap();

    env::set_var(ENV_ENGINE_CONFIG_PATH, &p);
    let cfg = config::load_default();
    env::remove_var(ENV_ENGINE_CONFIG_PATH);

    let cfg = cfg.unwrap();
    assert_eq!(cfg.fusion.factor_weight, 0.3);
    assert_eq!(cfg.fusion.physics_weight, 0.7);
}
