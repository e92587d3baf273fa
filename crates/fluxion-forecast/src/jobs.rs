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

//! Batch jobs for the three pipeline stages.
//!
//! Each job reads the latest committed state of its upstream stage through
//! the storage traits and is safe to rerun wholesale after a failure.

use chrono::{DateTime, TimeDelta, Utc};
use fluxion_types::{AccuracySummary, Horizon, truncate_to_hour};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::FeatureConfig;
use crate::ensemble::EnsembleEngine;
use crate::error::{ForecastError, Result};
use crate::features::FeatureEngine;
use crate::store::{FeatureStore, ObservationSource, ParameterSource, PredictionStore};
use crate::validation::{ValidationOutcome, ValidationTracker, summarize};

/// Extra leading history loaded so lags and weekly windows are populated
const FEATURE_CONTEXT_HOURS: i64 = 168;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureRunReport {
    /// Earliest hour recomputed in this run
    pub recomputed_from: DateTime<Utc>,
    pub records_written: usize,
}

/// Recomputes feature records for new and late-arriving observations
pub struct FeatureJob {
    observations: Arc<dyn ObservationSource>,
    store: Arc<dyn FeatureStore>,
    engine: FeatureEngine,
    config: FeatureConfig,
}

impl FeatureJob {
    #[must_use]
    pub fn new(
        observations: Arc<dyn ObservationSource>,
        store: Arc<dyn FeatureStore>,
        engine: FeatureEngine,
        config: FeatureConfig,
    ) -> Self {
        Self {
            observations,
            store,
            engine,
            config,
        }
    }

    /// Recompute every hour from `latest feature - lateness tolerance` up to `as_of`
    pub fn run(&self, as_of: DateTime<Utc>) -> Result<FeatureRunReport> {
        let latest = self
            .store
            .latest_feature_timestamp()
            .map_err(|e| ForecastError::persistence(&e))?;
        let recomputed_from = latest.map_or(DateTime::<Utc>::UNIX_EPOCH, |ts| {
            (ts - self.config.lateness_tolerance()).min(as_of)
        });
        let context_start = recomputed_from - TimeDelta::hours(FEATURE_CONTEXT_HOURS);

        let observations = self
            .observations
            .observations_between(context_start, as_of)
            .map_err(|e| ForecastError::persistence(&e))?;
        let exogenous = match &self.config.exogenous_series {
            Some(name) => Some(
                self.observations
                    .exogenous_between(name, context_start, as_of)
                    .map_err(|e| ForecastError::persistence(&e))?,
            ),
            None => None,
        };

        let records: Vec<_> = self
            .engine
            .compute(&observations, exogenous.as_ref())
            .into_iter()
            .filter(|r| r.timestamp >= recomputed_from)
            .collect();

        let records_written = self
            .store
            .upsert_features(&records)
            .map_err(|e| ForecastError::persistence(&e))?;

        info!(
            from = %recomputed_from,
            records = records_written,
            "Feature records updated"
        );

        Ok(FeatureRunReport {
            recomputed_from,
            records_written,
        })
    }
}

impl std::fmt::Debug for FeatureJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureJob")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionRun {
    /// A new batch was committed
    Persisted {
        prediction_timestamp: DateTime<Utc>,
        model_version: String,
        ids: Vec<i64>,
    },
    /// This hour was already forecast with this model version
    AlreadyPresent {
        prediction_timestamp: DateTime<Utc>,
        model_version: String,
    },
}

/// Produces and atomically persists one forecast batch per prediction hour
pub struct PredictionJob {
    observations: Arc<dyn ObservationSource>,
    parameters: Arc<dyn ParameterSource>,
    features: Arc<dyn FeatureStore>,
    predictions: Arc<dyn PredictionStore>,
    engine: Arc<EnsembleEngine>,
    horizons: Vec<Horizon>,
    weather_location: Option<String>,
}

impl PredictionJob {
    #[must_use]
    pub fn new(
        observations: Arc<dyn ObservationSource>,
        parameters: Arc<dyn ParameterSource>,
        features: Arc<dyn FeatureStore>,
        predictions: Arc<dyn PredictionStore>,
        engine: Arc<EnsembleEngine>,
        horizons: Vec<Horizon>,
    ) -> Self {
        Self {
            observations,
            parameters,
            features,
            predictions,
            engine,
            horizons,
            weather_location: None,
        }
    }

    /// Use forecast temperatures for this location when available
    #[must_use]
    pub fn with_weather_location(mut self, location: impl Into<String>) -> Self {
        self.weather_location = Some(location.into());
        self
    }

    /// Forecast every configured horizon for the hour containing `as_of`.
    ///
    /// Weather forecasts issued up to `as_of` itself are eligible, including
    /// ones issued after the start of the prediction hour.
    pub async fn run(&self, as_of: DateTime<Utc>) -> Result<PredictionRun> {
        if self.horizons.is_empty() {
            return Err(ForecastError::Configuration(
                "no forecast horizons configured".to_owned(),
            ));
        }
        let prediction_timestamp = truncate_to_hour(as_of);

        // Pin one parameter version for the whole invocation
        let params = self
            .parameters
            .latest_parameters()
            .map_err(|e| ForecastError::persistence(&e))?
            .map(Arc::new);

        if let Some(params) = &params
            && self
                .predictions
                .has_batch(prediction_timestamp, &params.version)
                .map_err(|e| ForecastError::persistence(&e))?
        {
            info!(
                at = %prediction_timestamp,
                version = %params.version,
                "Forecast batch already present, skipping"
            );
            return Ok(PredictionRun::AlreadyPresent {
                prediction_timestamp,
                model_version: params.version.clone(),
            });
        }

        let history_start = prediction_timestamp - self.engine.config().history_window();
        let history = self
            .features
            .features_between(history_start, prediction_timestamp)
            .map_err(|e| ForecastError::persistence(&e))?;
        let forecast_temperature = self.forecast_temperature(prediction_timestamp, as_of)?;

        let ctx = Arc::new(self.engine.prepare(
            prediction_timestamp,
            params,
            history,
            forecast_temperature,
        )?);
        let model_version = ctx.params.version.clone();

        let predictions = self
            .engine
            .predict_parallel(Arc::clone(&ctx), &self.horizons)
            .await?;

        let ids = self
            .predictions
            .insert_prediction_batch(&predictions)
            .map_err(|e| ForecastError::persistence(&e))?;

        for p in &predictions {
            info!(
                "📈 {}h -> {}: {:.2} [{:.2}, {:.2}] ({})",
                p.horizon_hours,
                p.target_timestamp,
                p.predicted_price,
                p.confidence_lower,
                p.confidence_upper,
                p.regime
            );
        }

        Ok(PredictionRun::Persisted {
            prediction_timestamp,
            model_version,
            ids,
        })
    }

    fn forecast_temperature(
        &self,
        prediction_timestamp: DateTime<Utc>,
        issued_by: DateTime<Utc>,
    ) -> Result<BTreeMap<DateTime<Utc>, f64>> {
        let Some(location) = &self.weather_location else {
            return Ok(BTreeMap::new());
        };
        let Some(longest) = self.horizons.iter().max() else {
            return Ok(BTreeMap::new());
        };

        let forecasts = self
            .observations
            .weather_forecasts(
                location,
                issued_by,
                prediction_timestamp,
                prediction_timestamp + longest.duration(),
            )
            .map_err(|e| ForecastError::persistence(&e))?;

        if forecasts.is_empty() {
            debug!(location, "No weather forecast available, using last known values");
        }

        Ok(forecasts
            .into_iter()
            .filter_map(|f| Some((truncate_to_hour(f.target_timestamp), f.temperature_c?)))
            .collect())
    }
}

impl std::fmt::Debug for PredictionJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionJob")
            .field("engine", &self.engine)
            .field("horizons", &self.horizons)
            .field("weather_location", &self.weather_location)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub recorded: usize,
    pub deferred: usize,
    pub expired: usize,
}

/// Scores due predictions against now-available actuals
pub struct ValidationJob {
    observations: Arc<dyn ObservationSource>,
    predictions: Arc<dyn PredictionStore>,
    tracker: ValidationTracker,
}

impl ValidationJob {
    #[must_use]
    pub fn new(
        observations: Arc<dyn ObservationSource>,
        predictions: Arc<dyn PredictionStore>,
        tracker: ValidationTracker,
    ) -> Self {
        Self {
            observations,
            predictions,
            tracker,
        }
    }

    pub fn run(&self, now: DateTime<Utc>) -> Result<ValidationReport> {
        let pending = self
            .predictions
            .pending_validations(now)
            .map_err(|e| ForecastError::persistence(&e))?;

        let mut report = ValidationReport::default();
        let mut expired = Vec::new();

        for prediction in &pending {
            let (start, end) = self.tracker.search_range(prediction);
            let candidates = self
                .observations
                .observations_between(start, end)
                .map_err(|e| ForecastError::persistence(&e))?;

            match self.tracker.evaluate(prediction, &candidates, now) {
                ValidationOutcome::Recorded(record) => {
                    let inserted = self
                        .predictions
                        .record_accuracy(&record)
                        .map_err(|e| ForecastError::persistence(&e))?;
                    if inserted {
                        report.recorded += 1;
                    } else {
                        debug!(id = prediction.id, "Accuracy already recorded");
                    }
                }
                ValidationOutcome::Deferred => report.deferred += 1,
                ValidationOutcome::Expired => expired.push(prediction.id),
            }
        }

        if !expired.is_empty() {
            warn!(
                count = expired.len(),
                "Predictions expired without an actual observation"
            );
            report.expired = self
                .predictions
                .mark_expired(&expired)
                .map_err(|e| ForecastError::persistence(&e))?;
        }

        info!(
            recorded = report.recorded,
            deferred = report.deferred,
            expired = report.expired,
            "Validation pass finished"
        );
        Ok(report)
    }

    /// Per-horizon accuracy of predictions targeting `[start, end]`
    pub fn summary(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<AccuracySummary>> {
        let scored = self
            .predictions
            .accuracy_between(start, end)
            .map_err(|e| ForecastError::persistence(&e))?;
        Ok(summarize(&scored))
    }
}

impl std::fmt::Debug for ValidationJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationJob")
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}
