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

//! Fixtures shared by the pipeline tests: synthetic market history,
//! a published parameter bundle and store/job wiring.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use fluxion_forecast::{
    EnsembleConfig, EnsembleEngine, FeatureConfig, FeatureEngine, FeatureJob, PredictionJob,
    ValidationJob, ValidationTracker,
};
use fluxion_store::SqliteStore;
use fluxion_types::{
    GenerationMix, Horizon, ModelParameters, RawObservation, RegimeThresholds, Reserves, Weather,
};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Arc;

/// Monday 2025-03-03 00:00 UTC
#[must_use]
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap()
}

/// Daily price cycle between 20 and 80 $/MWh
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn price_at_hour(hour: i64) -> f64 {
    50.0 + 30.0 * (2.0 * PI * (hour % 24) as f64 / 24.0).sin()
}

/// One fully populated hourly observation `hour` hours after [`start`]
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn observation(hour: i64) -> RawObservation {
    let phase = 2.0 * PI * (hour % 24) as f64 / 24.0;
    let demand = 9_500.0 + 800.0 * phase.sin();
    RawObservation::new(start() + TimeDelta::hours(hour), price_at_hour(hour))
        .with_demand(demand)
        .with_generation(GenerationMix {
            gas_mw: Some(6_000.0),
            coal_mw: Some(1_500.0),
            hydro_mw: Some(400.0),
            wind_mw: Some(1_200.0 + 300.0 * phase.cos()),
            solar_mw: Some(200.0),
            other_mw: Some(200.0),
        })
        .with_weather(Weather {
            temperature_c: Some(-5.0),
            wind_speed_ms: Some(6.0),
            cloud_cover_pct: Some(40.0),
        })
        .with_reserves(Reserves {
            operating_reserve_mw: Some(600.0),
            available_capacity_mw: Some(12_000.0),
        })
}

/// Hourly observations for `hours` consecutive hours from [`start`]
#[must_use]
pub fn hourly_history(hours: i64) -> Vec<RawObservation> {
    (0..hours).map(observation).collect()
}

/// A valid bundle with thresholds the synthetic history never crosses
#[must_use]
pub fn parameters(version: &str) -> ModelParameters {
    let default_weights: BTreeMap<String, f64> = [
        ("lag", 0.4),
        ("decomposition", 0.3),
        ("volatility", 0.2),
        ("regime", 0.1),
    ]
    .into_iter()
    .map(|(name, weight)| (name.to_owned(), weight))
    .collect();

    ModelParameters {
        version: version.to_owned(),
        published_at: start(),
        feature_correlations: BTreeMap::new(),
        feature_statistics: BTreeMap::new(),
        feature_scaling: BTreeMap::new(),
        regime_thresholds: RegimeThresholds {
            peak_demand_mw: Some(11_500.0),
            tight_reserve_margin: Some(0.05),
            high_renewable_share: Some(0.6),
            volatility_threshold: Some(500.0),
            ..RegimeThresholds::default()
        },
        ensemble_weights: BTreeMap::new(),
        default_weights,
        outlier_threshold: 3.0,
        residual_std_dev: 5.0,
        confidence_widening: 0.5,
    }
}

/// File-backed store in a temporary directory dropped with the returned guard
pub fn temp_store() -> anyhow::Result<(tempfile::TempDir, Arc<SqliteStore>)> {
    let dir = tempfile::tempdir()?;
    let store = SqliteStore::open(dir.path().join("forecast.db"))?;
    Ok((dir, Arc::new(store)))
}

/// The three jobs wired to one store with default configuration
#[derive(Debug)]
pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub features: FeatureJob,
    pub prediction: PredictionJob,
    pub validation: ValidationJob,
}

impl Harness {
    #[must_use]
    pub fn new(store: Arc<SqliteStore>, horizons: Vec<Horizon>) -> Self {
        let timezone = chrono_tz::America::Edmonton;
        let features = FeatureJob::new(
            store.clone(),
            store.clone(),
            FeatureEngine::new(timezone),
            FeatureConfig::default(),
        );
        let engine = Arc::new(EnsembleEngine::new(timezone, EnsembleConfig::default()));
        let prediction = PredictionJob::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            engine,
            horizons,
        );
        let tracker = ValidationTracker::new(
            TimeDelta::minutes(30),
            FeatureConfig::default().lateness_tolerance(),
        );
        let validation = ValidationJob::new(store.clone(), store.clone(), tracker);

        Self {
            store,
            features,
            prediction,
            validation,
        }
    }

    /// Read forecast temperatures for `location` when predicting
    #[must_use]
    pub fn with_weather_location(mut self, location: &str) -> Self {
        self.prediction = self.prediction.with_weather_location(location);
        self
    }
}

/// Hourly observations with a sharp spike every 17 hours
#[must_use]
pub fn spiky_history(hours: i64) -> Vec<RawObservation> {
    (0..hours)
        .map(|hour| {
            let mut obs = observation(hour);
            if hour % 17 == 0 {
                obs.price = 987.654_321 + price_at_hour(hour);
            }
            obs
        })
        .collect()
}
