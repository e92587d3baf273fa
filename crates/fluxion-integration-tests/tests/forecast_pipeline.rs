// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use chrono::TimeDelta;
use fluxion_forecast::{
    FeatureEngine, ForecastError, PredictionRun, RegimeSignals, classify,
    store::{FeatureStore, PredictionStore},
};
use fluxion_integration_tests::{
    Harness, hourly_history, observation, parameters, price_at_hour, spiky_history, start,
    temp_store,
};
use fluxion_types::{Horizon, Regime, RegimeThresholds, WeatherForecast};

/// Two weeks of history plus the observation at the prediction hour
const HISTORY_HOURS: i64 = 337;

fn prediction_hour() -> chrono::DateTime<chrono::Utc> {
    start() + TimeDelta::hours(HISTORY_HOURS - 1)
}

fn seeded(horizons: Vec<Horizon>) -> (tempfile::TempDir, Harness) {
    let (dir, store) = temp_store().unwrap();
    store
        .append_observations(&hourly_history(HISTORY_HOURS))
        .unwrap();
    (dir, Harness::new(store, horizons))
}

#[tokio::test]
async fn one_hour_forecast_stays_near_history() {
    let (_dir, harness) = seeded(vec![Horizon::try_from(1).unwrap()]);
    harness.store.publish_parameters(&parameters("v1")).unwrap();

    let as_of = prediction_hour() + TimeDelta::minutes(5);
    harness.features.run(as_of).unwrap();
    let run = harness.prediction.run(as_of).await.unwrap();

    let PredictionRun::Persisted { ids, .. } = run else {
        panic!("expected a new batch, got {run:?}");
    };
    assert_eq!(ids.len(), 1);

    let stored = harness.store.predictions_made_at(prediction_hour()).unwrap();
    assert_eq!(stored.len(), 1);
    let p = &stored[0].prediction;

    assert_eq!(p.prediction_timestamp, prediction_hour());
    assert_eq!(p.target_timestamp, prediction_hour() + TimeDelta::hours(1));
    assert!((0.0..=100.0).contains(&p.predicted_price));
    assert!(p.confidence_score >= 0.95);
    assert_eq!(p.regime, Regime::Normal);
    assert_eq!(p.model_version, "v1");
    assert!(p.features_used.contains_key("estimate.lag"));
}

#[tokio::test]
async fn full_batch_respects_band_and_score_ordering() {
    let (_dir, harness) = seeded(Horizon::ALL.to_vec());
    harness.store.publish_parameters(&parameters("v1")).unwrap();

    harness.features.run(prediction_hour()).unwrap();
    harness.prediction.run(prediction_hour()).await.unwrap();

    let mut batch: Vec<_> = harness
        .store
        .predictions_made_at(prediction_hour())
        .unwrap()
        .into_iter()
        .map(|s| s.prediction)
        .collect();
    batch.sort_by_key(|p| p.horizon_hours);

    let hours: Vec<u32> = batch.iter().map(|p| p.horizon_hours).collect();
    assert_eq!(hours, vec![1, 6, 12, 24]);

    for p in &batch {
        assert!(p.confidence_lower <= p.predicted_price);
        assert!(p.predicted_price <= p.confidence_upper);
        assert!(p.confidence_lower >= 0.0);
        assert_eq!(
            p.target_timestamp - p.prediction_timestamp,
            TimeDelta::hours(i64::from(p.horizon_hours))
        );
        assert!(p.target_timestamp > p.prediction_timestamp);
    }

    for pair in batch.windows(2) {
        assert!(pair[0].confidence_score > pair[1].confidence_score);
        let upper_width = |p: &fluxion_types::Prediction| p.confidence_upper - p.predicted_price;
        assert!(upper_width(&pair[0]) < upper_width(&pair[1]));
    }
}

#[tokio::test]
async fn rerun_for_same_hour_is_a_no_op() {
    let (_dir, harness) = seeded(Horizon::ALL.to_vec());
    harness.store.publish_parameters(&parameters("v1")).unwrap();
    harness.features.run(prediction_hour()).unwrap();

    let first = harness.prediction.run(prediction_hour()).await.unwrap();
    assert!(matches!(first, PredictionRun::Persisted { .. }));

    let second = harness
        .prediction
        .run(prediction_hour() + TimeDelta::minutes(40))
        .await
        .unwrap();
    assert_eq!(
        second,
        PredictionRun::AlreadyPresent {
            prediction_timestamp: prediction_hour(),
            model_version: "v1".to_owned(),
        }
    );
    assert_eq!(
        harness
            .store
            .predictions_made_at(prediction_hour())
            .unwrap()
            .len(),
        4
    );
}

#[tokio::test]
async fn new_parameter_version_gets_its_own_batch() {
    let (_dir, harness) = seeded(Horizon::ALL.to_vec());
    harness.store.publish_parameters(&parameters("v1")).unwrap();
    harness.features.run(prediction_hour()).unwrap();
    harness.prediction.run(prediction_hour()).await.unwrap();

    let mut retrained = parameters("v2");
    retrained.published_at = start() + TimeDelta::days(1);
    harness.store.publish_parameters(&retrained).unwrap();

    let run = harness.prediction.run(prediction_hour()).await.unwrap();
    let PredictionRun::Persisted { model_version, .. } = run else {
        panic!("expected a new batch, got {run:?}");
    };
    assert_eq!(model_version, "v2");
    assert_eq!(
        harness
            .store
            .predictions_made_at(prediction_hour())
            .unwrap()
            .len(),
        8
    );
}

#[tokio::test]
async fn missing_parameters_persist_nothing() {
    let (_dir, harness) = seeded(Horizon::ALL.to_vec());
    harness.features.run(prediction_hour()).unwrap();

    let err = harness.prediction.run(prediction_hour()).await.unwrap_err();
    assert!(matches!(err, ForecastError::Configuration(_)), "{err}");
    assert!(
        harness
            .store
            .predictions_made_at(prediction_hour())
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn unknown_estimator_weight_is_a_configuration_error() {
    let (_dir, harness) = seeded(Horizon::ALL.to_vec());
    let mut bundle = parameters("v1");
    let lag = bundle.default_weights.remove("lag").unwrap();
    bundle.default_weights.insert("arima".to_owned(), lag);
    harness.store.publish_parameters(&bundle).unwrap();
    harness.features.run(prediction_hour()).unwrap();

    let err = harness.prediction.run(prediction_hour()).await.unwrap_err();
    assert!(matches!(err, ForecastError::Configuration(_)), "{err}");
}

#[test]
fn weights_not_summing_to_one_are_rejected_at_publish() {
    let (_dir, store) = temp_store().unwrap();
    let mut bundle = parameters("v1");
    bundle.default_weights.insert("lag".to_owned(), 0.3);

    assert!(store.publish_parameters(&bundle).is_err());
}

#[tokio::test]
async fn stale_features_block_prediction() {
    let (_dir, harness) = seeded(Horizon::ALL.to_vec());
    harness.store.publish_parameters(&parameters("v1")).unwrap();
    harness.features.run(prediction_hour()).unwrap();

    let later = prediction_hour() + TimeDelta::hours(12);
    let err = harness.prediction.run(later).await.unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientHistory(_)), "{err}");
}

#[test]
fn gap_in_observations_leaves_gap_in_features() {
    let (_dir, store) = temp_store().unwrap();
    let observations: Vec<_> = (0..96)
        .filter(|hour| !(30..36).contains(hour))
        .map(observation)
        .collect();
    store.append_observations(&observations).unwrap();

    let harness = Harness::new(store, Horizon::ALL.to_vec());
    let report = harness.features.run(start() + TimeDelta::hours(95)).unwrap();
    assert_eq!(report.records_written, 90);

    let in_gap = harness
        .store
        .features_between(start() + TimeDelta::hours(30), start() + TimeDelta::hours(35))
        .unwrap();
    assert!(in_gap.is_empty());

    let after_gap = harness
        .store
        .features_between(start() + TimeDelta::hours(36), start() + TimeDelta::hours(60))
        .unwrap();
    let at = |hour: i64| {
        after_gap
            .iter()
            .find(|r| r.timestamp == start() + TimeDelta::hours(hour))
            .unwrap()
    };

    assert_eq!(at(36).lag_1h, None);
    assert_eq!(at(36).lag_24h, Some(price_at_hour(12)));
    assert_eq!(at(54).lag_24h, None);
    assert_eq!(at(60).lag_24h, Some(price_at_hour(36)));
}

#[test]
fn feature_job_recomputes_only_the_lateness_window() {
    let (_dir, store) = temp_store().unwrap();
    store.append_observations(&hourly_history(72)).unwrap();
    let harness = Harness::new(store, Horizon::ALL.to_vec());

    let first = harness.features.run(start() + TimeDelta::hours(71)).unwrap();
    assert_eq!(first.records_written, 72);

    harness.store.append_observations(&[observation(72)]).unwrap();
    let second = harness.features.run(start() + TimeDelta::hours(72)).unwrap();
    assert_eq!(second.recomputed_from, start() + TimeDelta::hours(65));
    assert_eq!(second.records_written, 8);

    let all = harness
        .store
        .features_between(start(), start() + TimeDelta::hours(72))
        .unwrap();
    assert_eq!(all.len(), 73);
    assert_eq!(
        harness.store.latest_feature_timestamp().unwrap(),
        Some(start() + TimeDelta::hours(72))
    );
}

#[test]
fn rerun_without_new_data_rewrites_identical_features() {
    let (_dir, store) = temp_store().unwrap();
    let observations = spiky_history(600);
    store.append_observations(&observations).unwrap();
    let harness = Harness::new(store, Horizon::ALL.to_vec());
    let as_of = start() + TimeDelta::hours(599);
    let range = || {
        harness
            .store
            .features_between(start(), as_of)
            .unwrap()
    };

    harness.features.run(as_of).unwrap();
    let first = range();
    let report = harness.features.run(as_of).unwrap();
    assert_eq!(report.recomputed_from, as_of - TimeDelta::hours(6));
    let second = range();

    assert_eq!(first.len(), 600);
    assert_eq!(first, second);

    // Incremental recompute agrees with a full rescan of the whole history
    let rescan = FeatureEngine::new(chrono_tz::America::Edmonton).compute(&observations, None);
    assert_eq!(second, rescan);
}

#[test]
fn late_observation_within_tolerance_is_picked_up() {
    let (_dir, store) = temp_store().unwrap();
    let observations: Vec<_> = (0..72).filter(|hour| *hour != 70).map(observation).collect();
    store.append_observations(&observations).unwrap();
    let harness = Harness::new(store, Horizon::ALL.to_vec());

    harness.features.run(start() + TimeDelta::hours(71)).unwrap();
    let before = harness
        .store
        .features_between(start() + TimeDelta::hours(70), start() + TimeDelta::hours(71))
        .unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].lag_1h, None);

    // Hour 70 arrives one hour late, well inside the six hour tolerance
    harness.store.append_observations(&[observation(70)]).unwrap();
    harness.features.run(start() + TimeDelta::hours(72)).unwrap();

    let after = harness
        .store
        .features_between(start() + TimeDelta::hours(70), start() + TimeDelta::hours(71))
        .unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].timestamp, start() + TimeDelta::hours(70));
    assert_eq!(after[0].price, price_at_hour(70));
    assert_eq!(after[1].lag_1h, Some(price_at_hour(70)));
    assert_eq!(
        after[1].momentum_1h,
        Some(price_at_hour(71) - price_at_hour(70))
    );
}

#[test]
fn observation_later_than_tolerance_stays_a_gap() {
    let (_dir, store) = temp_store().unwrap();
    let observations: Vec<_> = (0..72).filter(|hour| *hour != 60).map(observation).collect();
    store.append_observations(&observations).unwrap();
    let harness = Harness::new(store, Horizon::ALL.to_vec());

    harness.features.run(start() + TimeDelta::hours(71)).unwrap();

    // Hour 60 arrives eleven hours late, past the recompute window starting at hour 65
    harness.store.append_observations(&[observation(60)]).unwrap();
    let report = harness.features.run(start() + TimeDelta::hours(71)).unwrap();
    assert_eq!(report.recomputed_from, start() + TimeDelta::hours(65));

    let around_gap = harness
        .store
        .features_between(start() + TimeDelta::hours(59), start() + TimeDelta::hours(61))
        .unwrap();
    let hours: Vec<_> = around_gap.iter().map(|r| r.timestamp).collect();
    assert_eq!(
        hours,
        vec![start() + TimeDelta::hours(59), start() + TimeDelta::hours(61)]
    );
    assert_eq!(around_gap[1].lag_1h, None);
}

#[tokio::test]
async fn weather_forecast_issued_during_the_hour_is_used() {
    let (_dir, harness) = seeded(vec![Horizon::try_from(1).unwrap()]);
    let harness = harness.with_weather_location("calgary");
    harness.store.publish_parameters(&parameters("v1")).unwrap();
    harness.features.run(prediction_hour()).unwrap();

    let target = prediction_hour() + TimeDelta::hours(1);
    let forecast = |issued_minutes: i64, temperature: f64| WeatherForecast {
        location: "calgary".to_owned(),
        target_timestamp: target,
        issued_at: prediction_hour() + TimeDelta::minutes(issued_minutes),
        temperature_c: Some(temperature),
        wind_speed_ms: None,
    };
    harness
        .store
        .append_weather_forecasts(&[forecast(20, 25.0), forecast(45, 30.0)])
        .unwrap();

    harness
        .prediction
        .run(prediction_hour() + TimeDelta::minutes(30))
        .await
        .unwrap();

    let stored = harness.store.predictions_made_at(prediction_hour()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored[0].prediction.features_used.get("temperature_c"),
        Some(&25.0)
    );
}

#[tokio::test]
async fn empty_horizon_list_is_rejected() {
    let (_dir, harness) = seeded(Vec::new());
    harness.store.publish_parameters(&parameters("v1")).unwrap();
    harness.features.run(prediction_hour()).unwrap();

    let err = harness.prediction.run(prediction_hour()).await.unwrap_err();
    assert!(matches!(err, ForecastError::Configuration(_)), "{err}");
    assert!(
        harness
            .store
            .predictions_made_at(prediction_hour())
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn actual_within_match_window_is_scored_once() {
    let (_dir, harness) = seeded(vec![Horizon::try_from(1).unwrap()]);
    harness.store.publish_parameters(&parameters("v1")).unwrap();
    harness.features.run(prediction_hour()).unwrap();
    harness.prediction.run(prediction_hour()).await.unwrap();

    let stored = harness.store.predictions_made_at(prediction_hour()).unwrap();
    let predicted = &stored[0].prediction;
    let target = predicted.target_timestamp;

    // Nothing has arrived for the target hour yet
    let early = harness.validation.run(target + TimeDelta::minutes(5)).unwrap();
    assert_eq!(early.recorded, 0);
    assert_eq!(early.deferred, 1);

    let mut actual = observation(HISTORY_HOURS);
    actual.timestamp = target + TimeDelta::minutes(10);
    actual.price = predicted.predicted_price + 2.0;
    harness.store.append_observations(&[actual]).unwrap();

    let now = target + TimeDelta::hours(1);
    let report = harness.validation.run(now).unwrap();
    assert_eq!(report.recorded, 1);
    assert_eq!(report.expired, 0);

    let scored = harness
        .store
        .accuracy_between(start(), target + TimeDelta::days(1))
        .unwrap();
    assert_eq!(scored.len(), 1);
    let (prediction, record) = &scored[0];
    assert_eq!(record.prediction_id, prediction.id);
    assert_eq!(record.actual_timestamp, target + TimeDelta::minutes(10));
    assert!((record.absolute_error - 2.0).abs() < 1e-9);
    assert_eq!(
        record.within_confidence,
        predicted.covers(predicted.predicted_price + 2.0)
    );
    assert!(record.within_confidence);

    let again = harness.validation.run(now + TimeDelta::hours(1)).unwrap();
    assert_eq!(again.recorded, 0);
    assert_eq!(
        harness
            .store
            .accuracy_between(start(), target + TimeDelta::days(1))
            .unwrap()
            .len(),
        1
    );

    let summary = harness
        .validation
        .summary(start(), target + TimeDelta::days(1))
        .unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].horizon_hours, 1);
    assert_eq!(summary[0].count, 1);
    assert!((summary[0].coverage - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn prediction_without_actual_expires_after_lateness() {
    let (_dir, harness) = seeded(vec![Horizon::try_from(1).unwrap()]);
    harness.store.publish_parameters(&parameters("v1")).unwrap();
    harness.features.run(prediction_hour()).unwrap();
    harness.prediction.run(prediction_hour()).await.unwrap();

    let target = prediction_hour() + TimeDelta::hours(1);
    let report = harness.validation.run(target + TimeDelta::hours(8)).unwrap();
    assert_eq!(report.expired, 1);
    assert!(
        harness
            .store
            .pending_validations(target + TimeDelta::days(1))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn classification_is_deterministic_and_ordered() {
    let signals = RegimeSignals {
        demand_mw: Some(12_000.0),
        reserve_margin: Some(0.2),
        renewable_share: Some(0.7),
        volatility_6h: Some(10.0),
    };
    let mut thresholds = RegimeThresholds {
        peak_demand_mw: Some(11_500.0),
        high_renewable_share: Some(0.6),
        ..RegimeThresholds::default()
    };

    let first = classify(&signals, &thresholds);
    for _ in 0..10 {
        assert_eq!(classify(&signals, &thresholds), first);
    }
    assert_eq!(first, Regime::PeakDemand);

    thresholds.priority = vec![Regime::HighRenewable, Regime::PeakDemand];
    assert_eq!(classify(&signals, &thresholds), Regime::HighRenewable);

    assert_eq!(
        classify(&RegimeSignals::default(), &thresholds),
        Regime::Normal
    );
}
