// tests/providers_fixture.rs
//
// Weather providers as the engine sees them: the JSON fixture provider and
// the Open-Meteo response parser fed from checked-in bodies.

use std::path::Path;
use std::time::Duration;

use black_ice_risk::weather::providers::open_meteo::parse_forecast;
use black_ice_risk::weather::providers::FixtureProvider;
use black_ice_risk::{Engine, EngineConfig, EngineError, Location, RiskLevel, WeatherProvider};

fn fixture() -> FixtureProvider {
    let p = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/samples.json");
    FixtureProvider::from_path(&p).expect("samples.json parses")
}

#[test]
fn fixture_file_has_valid_samples() {
    let f = fixture();
    assert_eq!(f.len(), 3);
    assert!(!f.is_empty());
}

#[tokio::test]
async fn samples_from_fixture_validate() {
    let f = fixture();
    for lat in [46.0, 46.1, 46.2] {
        let s = f.sample(Location::new(lat, 0.0), None).await.unwrap();
        s.validate().unwrap();
    }
}

#[tokio::test]
async fn assess_location_end_to_end() {
    let e = Engine::new(EngineConfig::default()).unwrap();
    let f = fixture();

    let warm = e
        .assess_location(&f, Location::new(46.0, 0.0), None)
        .await
        .unwrap();
    assert_eq!(warm.risk_level, RiskLevel::None);

    let bridge = e
        .assess_location(&f, Location::new(46.1, 0.0), Some(Duration::from_secs(3600)))
        .await
        .unwrap();
    assert!(bridge.risk_level >= RiskLevel::High);
    assert!(bridge.flags.bridge);
}

#[tokio::test]
async fn invalid_location_is_rejected_before_fetch() {
    let e = Engine::new(EngineConfig::default()).unwrap();
    let err = e
        .assess_location(&fixture(), Location::new(-91.0, 0.0), None)
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn open_meteo_body_becomes_assessable_sample() {
    let body = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/open_meteo.json"));
    let s = parse_forecast(body, Location::new(47.37, 8.54), Duration::from_secs(6 * 3600)).unwrap();
    assert!(s.cooling_rate_c_per_hour.is_some());
    // 01:00 UTC with a +60 min offset.
    assert_eq!(s.local_hour(), 2);

    let a = Engine::new(EngineConfig::default()).unwrap().assess(&s).unwrap();
    assert!(a.probability > 0.0);
}

#[test]
fn open_meteo_error_body_is_data_unavailable() {
    let body = r#"{"error":true,"reason":"bad"}"#;
    let err = parse_forecast(body, Location::new(0.0, 0.0), Duration::from_secs(3600)).unwrap_err();
    assert!(matches!(err, EngineError::DataUnavailable(_)));
}
