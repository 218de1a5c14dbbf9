// tests/route_analysis.rs
//
// Route analysis against scripted weather providers.
//
// Covered:
// - a freezing bridge between warm, dry segments is the only danger zone
// - a provider failure degrades just that segment and the call succeeds
// - panicking and slow providers degrade their segment too
// - results come back in waypoint order with bounded concurrency
// - waypoint validation errors

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use black_ice_risk::route::SafetyBand;
use black_ice_risk::{
    Engine, EngineConfig, EngineError, Location, RouteOptions, WeatherProvider, WeatherSample,
    Waypoint,
};
use chrono::{DateTime, TimeZone, Utc};

type Script = dyn Fn(Location) -> Result<WeatherSample, EngineError> + Send + Sync;

/// Provider driven by a closure, with an optional per-call delay.
struct Scripted {
    script: Box<Script>,
    delay: Box<dyn Fn(Location) -> Duration + Send + Sync>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Scripted {
    fn new(script: impl Fn(Location) -> Result<WeatherSample, EngineError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: Box::new(|_| Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: impl Fn(Location) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }
}

#[async_trait]
impl WeatherProvider for Scripted {
    async fn sample(&self, location: Location, _lookback: Option<Duration>) -> Result<WeatherSample, EngineError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let d = (self.delay)(location);
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.script)(location)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

fn warm(loc: Location) -> WeatherSample {
    WeatherSample::new(loc, noon(), 12.0, 45.0, 0.0, 5.0, 0.0)
}

fn icy_bridge(loc: Location) -> WeatherSample {
    WeatherSample::new(loc, noon(), -1.0, 92.0, -1.5, 2.0, 1.5)
        .with_surface_temperature(-3.0)
        .on_bridge()
}

fn near(loc: Location, lat: f64) -> bool {
    (loc.latitude - lat).abs() < 1e-6
}

/// Four waypoints on the prime meridian; segment midpoints at 46.00, 46.10, 46.20.
fn three_segments() -> Vec<Waypoint> {
    vec![
        Waypoint::new(45.95, 0.0).named("A"),
        Waypoint::new(46.05, 0.0),
        Waypoint::new(46.15, 0.0),
        Waypoint::new(46.25, 0.0).named("B"),
    ]
}

fn engine() -> Engine {
    Engine::new(EngineConfig::default()).unwrap()
}

fn options() -> RouteOptions {
    RouteOptions::default().as_of(noon())
}

#[tokio::test]
async fn freezing_bridge_is_the_only_danger_zone() {
    let provider = Arc::new(Scripted::new(|loc| {
        Ok(if near(loc, 46.10) { icy_bridge(loc) } else { warm(loc) })
    }));

    let r = engine()
        .analyze_route(provider, &three_segments(), options())
        .await
        .unwrap();

    assert_eq!(r.segments.len(), 3);
    let zones: Vec<usize> = r.danger_zones.iter().map(|z| z.segment_index).collect();
    assert_eq!(zones, vec![1]);
    assert_eq!(r.max_risk_segment, Some(1));
    assert_eq!(r.max_risk, r.segments[1].assessment.probability);
    assert_eq!(r.safety_score, 100.0 - r.segments[1].assessment.probability);
    assert!(r.segments[0].assessment.probability < 20.0);
    assert!(r.segments[2].assessment.probability < 20.0);
    assert!(r.degraded_segments.is_empty());
    assert!(matches!(r.safety_band, SafetyBand::Dangerous));
    assert!((r.total_distance_km - 3.0 * 11.1195).abs() < 0.05);
}

#[tokio::test]
async fn provider_failure_degrades_only_that_segment() {
    let provider = Arc::new(Scripted::new(|loc| {
        if near(loc, 46.10) {
            Err(EngineError::DataUnavailable("upstream 502".into()))
        } else {
            Ok(warm(loc))
        }
    }));

    let cfg = EngineConfig::default();
    let fallback = cfg.route.fallback.clone();
    let r = Engine::new(cfg)
        .unwrap()
        .analyze_route(provider, &three_segments(), options())
        .await
        .expect("route call still succeeds");

    assert_eq!(r.segments.len(), 3);
    assert_eq!(r.degraded_segments, vec![1]);

    let s = &r.segments[1];
    assert!(s.assessment.degraded);
    assert!(s.assessment.confidence <= 0.3);
    assert_eq!(s.sample.temperature_c, fallback.temperature_c);
    assert_eq!(s.sample.humidity_pct, fallback.humidity_pct);
    assert_eq!(s.sample.timestamp, noon());
    assert_eq!(s.sample.location, s.sample_point);

    assert!(!r.segments[0].assessment.degraded);
    assert!(!r.segments[2].assessment.degraded);
    assert!(r.recommendations.iter().any(|l| l.contains("unavailable")));
}

#[tokio::test]
async fn invalid_provider_sample_degrades_segment() {
    let provider = Arc::new(Scripted::new(|loc| {
        let mut s = warm(loc);
        if near(loc, 46.00) {
            s.humidity_pct = 180.0;
        }
        Ok(s)
    }));
    let r = engine()
        .analyze_route(provider, &three_segments(), options())
        .await
        .unwrap();
    assert_eq!(r.degraded_segments, vec![0]);
}

#[tokio::test]
async fn panicking_worker_degrades_segment() {
    let provider = Arc::new(Scripted::new(|loc| {
        if near(loc, 46.20) {
            panic!("provider bug");
        }
        Ok(warm(loc))
    }));
    let r = engine()
        .analyze_route(provider, &three_segments(), options())
        .await
        .unwrap();
    assert_eq!(r.segments.len(), 3);
    assert_eq!(r.degraded_segments, vec![2]);
    assert_eq!(r.segments[2].index, 2);
}

#[tokio::test]
async fn slow_segment_exceeding_its_time_share_degrades() {
    let provider = Arc::new(
        Scripted::new(|loc| Ok(warm(loc))).with_delay(|loc| {
            if near(loc, 46.10) {
                Duration::from_secs(5)
            } else {
                Duration::ZERO
            }
        }),
    );
    let opts = options().with_timeout(Duration::from_millis(600));
    let r = engine()
        .analyze_route(provider, &three_segments(), opts)
        .await
        .unwrap();
    assert_eq!(r.degraded_segments, vec![1]);
}

#[tokio::test]
async fn segments_keep_waypoint_order_and_bounded_concurrency() {
    let mut cfg = EngineConfig::default();
    cfg.route.max_concurrency = 2;
    let e = Engine::new(cfg).unwrap();

    // Earlier segments finish last.
    let provider = Arc::new(
        Scripted::new(|loc| Ok(warm(loc)))
            .with_delay(|loc| Duration::from_millis(((47.0 - loc.latitude) * 100.0).max(0.0) as u64)),
    );
    let waypoints: Vec<Waypoint> = (0..7).map(|i| Waypoint::new(46.0 + i as f64 * 0.1, 0.0)).collect();

    let r = e
        .analyze_route(provider.clone(), &waypoints, options())
        .await
        .unwrap();

    assert_eq!(r.segments.len(), waypoints.len() - 1);
    for (i, s) in r.segments.iter().enumerate() {
        assert_eq!(s.index, i);
        assert_eq!(s.start, waypoints[i]);
        assert_eq!(s.end, waypoints[i + 1]);
    }
    assert!(provider.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn waypoint_errors_fail_the_call() {
    let provider: Arc<dyn WeatherProvider> = Arc::new(Scripted::new(|loc| Ok(warm(loc))));
    let e = engine();

    let err = e
        .analyze_route(provider.clone(), &[Waypoint::new(46.0, 0.0)], options())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::InsufficientWaypoints(1));

    let bad = [Waypoint::new(46.0, 0.0), Waypoint::new(46.1, 200.0)];
    let err = e.analyze_route(provider, &bad, options()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidCoordinate { index: 1, .. }));
}
