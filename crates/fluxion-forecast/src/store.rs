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

//! Storage seams between the pipeline stages.
//!
//! Stages only talk to each other through these traits, so every job reads
//! the latest committed state of its upstream stage. The SQLite
//! implementation lives in `fluxion-store`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use fluxion_types::{
    AccuracyRecord, ExogenousSeries, FeatureRecord, ModelParameters, Prediction, RawObservation,
    StoredPrediction, WeatherForecast,
};

/// Read side of the raw market feeds
pub trait ObservationSource: Send + Sync {
    /// Observations with `start <= timestamp <= end`, ordered by time
    fn observations_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawObservation>>;

    /// Values of an exogenous series with `start <= hour <= end`
    fn exogenous_between(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ExogenousSeries>;

    /// For each target hour in `[start, end]`, the most recently issued
    /// forecast with `issued_at <= issued_by`
    fn weather_forecasts(
        &self,
        location: &str,
        issued_by: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeatherForecast>>;
}

/// Latest published model parameters
pub trait ParameterSource: Send + Sync {
    fn latest_parameters(&self) -> Result<Option<ModelParameters>>;
}

/// Idempotent feature record storage keyed by hour
pub trait FeatureStore: Send + Sync {
    /// Insert or replace records; returns the number written
    fn upsert_features(&self, records: &[FeatureRecord]) -> Result<usize>;

    /// Records with `start <= timestamp <= end`, ordered by time
    fn features_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FeatureRecord>>;

    fn latest_feature_timestamp(&self) -> Result<Option<DateTime<Utc>>>;
}

/// Prediction batches and their accuracy records
pub trait PredictionStore: Send + Sync {
    /// Whether a batch for this prediction hour and model version exists
    fn has_batch(&self, prediction_timestamp: DateTime<Utc>, model_version: &str) -> Result<bool>;

    /// Persist the whole batch in one transaction; returns the assigned ids
    fn insert_prediction_batch(&self, predictions: &[Prediction]) -> Result<Vec<i64>>;

    fn predictions_made_at(&self, prediction_timestamp: DateTime<Utc>)
    -> Result<Vec<StoredPrediction>>;

    /// Predictions neither validated nor expired with `target_timestamp <= due_by`
    fn pending_validations(&self, due_by: DateTime<Utc>) -> Result<Vec<StoredPrediction>>;

    /// Store the record unless one exists for the prediction; returns whether it was inserted
    fn record_accuracy(&self, record: &AccuracyRecord) -> Result<bool>;

    /// Mark predictions whose actual never arrived
    fn mark_expired(&self, prediction_ids: &[i64]) -> Result<usize>;

    /// Scored predictions with `start <= target_timestamp <= end`
    fn accuracy_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(StoredPrediction, AccuracyRecord)>>;
}
