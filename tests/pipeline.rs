//! End-to-end pipeline tests against in-memory stores and a mocked BMRS feed.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use gb_wind_forecaster::config::{ComparatorConfig, Config, TrainingConfig};
use gb_wind_forecaster::controller::{FeedStatus, ForecastController};
use gb_wind_forecaster::domain::{
    BmUnit, BmUnitMap, GenerationReading, RampSeverity, TradingSignal, WeatherObservation,
    WindFarm,
};
use gb_wind_forecaster::forecast::features::{feature_names, wind_feature_vector};
use gb_wind_forecaster::forecast::ElexonWindForecastFeed;
use gb_wind_forecaster::ml::{
    DirectoryRegistry, FarmModel, InMemoryRegistry, LinearRegressionModel, MLModel,
    ModelRegistry, Regressor, TrainingWindow, ValidationMetrics,
};
use gb_wind_forecaster::repo::{InMemoryStore, Stores};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 5, 12, 10, 0).unwrap()
}

fn observation(farm: &str, at: DateTime<Utc>, speed: f64) -> WeatherObservation {
    WeatherObservation {
        farm_name: farm.into(),
        timestamp_utc: at,
        wind_speed_100m: speed,
        wind_direction_10m: 240.0,
        wind_gusts_10m: 14.0,
        temperature: Some(9.5),
        pressure: Some(1008.0),
    }
}

fn constant_model(farm: &str, mw: f64) -> FarmModel {
    FarmModel {
        farm_name: farm.into(),
        model_id: format!("{}-fixed", farm),
        trained_at: now(),
        feature_names: feature_names(),
        window: TrainingWindow {
            first_hour: now(),
            last_hour: now(),
            cutoff: now(),
            train_rows: 100,
            test_rows: 10,
        },
        metrics: ValidationMetrics::new(0.0, 0.0, 0.0, 1.0, 10),
        regressor: Regressor::Linear(LinearRegressionModel::constant(6, mw)),
    }
}

async fn windfor_server(points: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/datasets/WINDFOR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(points))
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer) -> Config {
    Config {
        comparator: ComparatorConfig {
            base_url: server.uri(),
            max_retries: 0,
            ..ComparatorConfig::default()
        },
        ..Config::default()
    }
}

#[tokio::test]
async fn test_cycle_signals_short_and_raises_ramp_alert() {
    let server = windfor_server(serde_json::json!({
        "data": [
            {"publishTime": "2025-11-05T09:00:00Z", "startTime": "2025-11-05T12:00:00Z", "generation": 8000},
            {"publishTime": "2025-11-05T10:30:00Z", "startTime": "2025-11-05T12:00:00Z", "generation": 8400},
            {"publishTime": "2025-11-05T10:30:00Z", "startTime": "2025-11-05T13:00:00Z", "generation": 8700}
        ]
    }))
    .await;

    let farms = vec![
        WindFarm::new("Hornsea Two", 5000.0, 53.9, 1.8),
        WindFarm::new("Walney", 6000.0, 54.0, -3.5),
    ];
    let weather = vec![
        observation("Hornsea Two", now() - Duration::minutes(40), 12.0),
        observation("Walney", now() - Duration::minutes(60), 10.0),
        observation("Walney", now() - Duration::minutes(5), 170.0),
    ];
    let stores = Stores::from_memory(InMemoryStore::new(farms, BmUnitMap::new(), weather, vec![]));

    let registry = Arc::new(InMemoryRegistry::new());
    registry.put(constant_model("Hornsea Two", 4000.0)).await.unwrap();
    registry.put(constant_model("Walney", 5000.0)).await.unwrap();

    let cfg = config_for(&server);
    let feed = Arc::new(ElexonWindForecastFeed::new(&cfg.comparator).unwrap());
    let controller = ForecastController::new(cfg, stores, registry, feed);

    let report = controller.run_cycle(now()).await.unwrap();

    assert_eq!(report.forecast.total_mw, 9000.0);
    assert_eq!(report.external_feed, FeedStatus::Matched);
    let comparison = report.comparison.unwrap();
    assert_eq!(comparison.external_forecast_mw, 8400.0);
    assert_eq!(comparison.delta_mw, 600.0);
    assert!((comparison.delta_pct.unwrap() - 7.142857).abs() < 1e-4);
    assert_eq!(comparison.signal, Some(TradingSignal::Short));

    assert_eq!(report.ranked.top[0].farm_name, "Walney");
    assert_eq!(report.ramp_alerts.len(), 1);
    assert_eq!(report.ramp_alerts[0].farm_name, "Walney");
    assert_eq!(report.ramp_alerts[0].severity, RampSeverity::Critical);
    assert_eq!(report.ramp_alerts[0].event.kind(), "WIND_RAMP");
}

#[tokio::test]
async fn test_ramp_alert_is_raised_by_one_cycle_only() {
    let server = windfor_server(serde_json::json!({ "data": [] })).await;
    let farms = vec![WindFarm::new("Walney", 1026.0, 54.0, -3.5)];
    let weather = vec![
        observation("Walney", now() - Duration::minutes(60), 10.0),
        observation("Walney", now() - Duration::minutes(5), 170.0),
    ];
    let stores = Stores::from_memory(InMemoryStore::new(farms, BmUnitMap::new(), weather, vec![]));
    let registry = Arc::new(InMemoryRegistry::new());
    registry.put(constant_model("Walney", 500.0)).await.unwrap();

    let cfg = config_for(&server);
    let cadence = Duration::minutes(cfg.realtime.cadence_minutes as i64);
    let feed = Arc::new(ElexonWindForecastFeed::new(&cfg.comparator).unwrap());
    let controller = ForecastController::new(cfg, stores, registry, feed);

    let first = controller.run_cycle(now()).await.unwrap();
    assert_eq!(first.ramp_alerts.len(), 1);

    // Both observations are still inside the lookback on the next tick
    let next = controller.run_cycle(now() + cadence).await.unwrap();
    assert!(next.ramp_alerts.is_empty());
}

#[tokio::test]
async fn test_corrupt_model_file_excludes_only_that_farm() {
    let server = windfor_server(serde_json::json!({ "data": [] })).await;
    let farms = vec![
        WindFarm::new("Walney", 1026.0, 54.0, -3.5),
        WindFarm::new("Rampion", 400.0, 50.7, -0.3),
    ];
    let weather = vec![
        observation("Walney", now() - Duration::minutes(30), 12.0),
        observation("Rampion", now() - Duration::minutes(30), 12.0),
    ];
    let stores = Stores::from_memory(InMemoryStore::new(farms, BmUnitMap::new(), weather, vec![]));

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(DirectoryRegistry::open(dir.path()).await.unwrap());
    registry.put(constant_model("Walney", 700.0)).await.unwrap();
    std::fs::write(dir.path().join("Rampion.model"), b"garbage").unwrap();

    let cfg = config_for(&server);
    let feed = Arc::new(ElexonWindForecastFeed::new(&cfg.comparator).unwrap());
    let controller = ForecastController::new(cfg, stores, registry, feed);

    let report = controller.run_cycle(now()).await.unwrap();
    assert_eq!(report.forecast.farms_scored(), 1);
    assert_eq!(report.forecast.total_mw, 700.0);
    assert_eq!(report.exclusions.len(), 1);
    assert_eq!(report.exclusions[0].farm_name, "Rampion");
    assert_eq!(report.exclusions[0].kind, "Model");
}

#[tokio::test]
async fn test_feed_outage_still_produces_forecast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let farms = vec![WindFarm::new("Hornsea Two", 1386.0, 53.9, 1.8)];
    let weather = vec![observation("Hornsea Two", now() - Duration::hours(2), 25.0)];
    let stores = Stores::from_memory(InMemoryStore::new(farms, BmUnitMap::new(), weather, vec![]));

    let registry = Arc::new(InMemoryRegistry::new());
    registry.put(constant_model("Hornsea Two", 1500.0)).await.unwrap();

    let cfg = config_for(&server);
    let feed = Arc::new(ElexonWindForecastFeed::new(&cfg.comparator).unwrap());
    let controller = ForecastController::new(cfg, stores, registry, feed);

    let report = controller.run_cycle(now()).await.unwrap();
    assert_eq!(report.forecast.total_mw, 1386.0);
    assert!(report.comparison.is_none());
    assert!(matches!(report.external_feed, FeedStatus::Unavailable { .. }));
}

#[tokio::test]
async fn test_trained_model_survives_directory_reload() {
    let cutoff = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let farms = vec![WindFarm::new("Beatrice", 588.0, 58.1, -3.1)];
    let mut mapping = BmUnitMap::new();
    mapping.insert("Beatrice", BmUnit { unit_id: "T_BEATO-1".into(), unit_capacity_mw: 588.0 });

    let mut weather = Vec::new();
    let mut generation = Vec::new();
    for i in -140i64..24 {
        let at = cutoff + Duration::hours(i);
        let speed = 3.0 + i.rem_euclid(18) as f64;
        weather.push(observation("Beatrice", at, speed));
        generation.push(GenerationReading {
            unit_id: "T_BEATO-1".into(),
            timestamp: at,
            generation_mw: (speed * 35.0).min(588.0),
        });
    }
    let stores = Stores::from_memory(InMemoryStore::new(farms, mapping, weather, generation));

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(DirectoryRegistry::open(dir.path()).await.unwrap());
    let cfg = Config {
        training: TrainingConfig {
            n_trees: 12,
            ..TrainingConfig::default()
        },
        ..Config::default()
    };
    let server = MockServer::start().await;
    let feed = Arc::new(ElexonWindForecastFeed::new(&config_for(&server).comparator).unwrap());
    let controller = ForecastController::new(cfg, stores, registry.clone(), feed);

    let report = controller.train().await.unwrap();
    assert_eq!(report.trained.len(), 1);
    assert_eq!(report.trained[0].window.test_rows, 24);

    let features = wind_feature_vector(12.0, 240.0, 14.0, now());
    let live = registry.get("Beatrice").await.unwrap().predict(&features).unwrap();

    let reopened = DirectoryRegistry::open(dir.path()).await.unwrap();
    let reloaded = reopened.get("Beatrice").await.unwrap();
    assert_eq!(reloaded.predict(&features).unwrap(), live);

    // Refitting with the same seed reproduces the forest
    let rows: Vec<Vec<f64>> = (0..24)
        .map(|h| wind_feature_vector(4.0 + h as f64, 240.0, 14.0, now()).features)
        .collect();
    let refit_report = controller.train().await.unwrap();
    assert_ne!(refit_report.trained[0].model_id, report.trained[0].model_id);
    let refit = registry.get("Beatrice").await.unwrap();
    assert_eq!(
        reloaded.regressor.predict_rows(&rows).unwrap(),
        refit.regressor.predict_rows(&rows).unwrap()
    );
}
