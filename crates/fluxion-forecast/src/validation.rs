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

//! Closed-loop scoring of past predictions against actual prices.

use chrono::{DateTime, TimeDelta, Utc};
use fluxion_types::{AccuracyRecord, AccuracySummary, RawObservation, StoredPrediction};
use std::collections::BTreeMap;

/// What happened when a prediction was checked against actuals
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// An actual was found and scored
    Recorded(AccuracyRecord),
    /// No actual yet; retry on a later pass
    Deferred,
    /// No actual arrived within the lateness tolerance; permanent gap
    Expired,
}

/// Matches predictions to the nearest actual observation inside a window
#[derive(Debug, Clone, Copy)]
pub struct ValidationTracker {
    match_window: TimeDelta,
    lateness_tolerance: TimeDelta,
}

impl ValidationTracker {
    #[must_use]
    pub fn new(match_window: TimeDelta, lateness_tolerance: TimeDelta) -> Self {
        Self {
            match_window,
            lateness_tolerance,
        }
    }

    #[must_use]
    pub fn match_window(&self) -> TimeDelta {
        self.match_window
    }

    /// Observation window `[target - w, target + w]` to query for a prediction
    #[must_use]
    pub fn search_range(&self, prediction: &StoredPrediction) -> (DateTime<Utc>, DateTime<Utc>) {
        let target = prediction.prediction.target_timestamp;
        (target - self.match_window, target + self.match_window)
    }

    /// Instant after which a missing actual is treated as a permanent gap
    #[must_use]
    pub fn expires_at(&self, prediction: &StoredPrediction) -> DateTime<Utc> {
        prediction.prediction.target_timestamp + self.match_window + self.lateness_tolerance
    }

    /// Nearest observation to `target` within the match window; ties go to the earlier one
    #[must_use]
    pub fn nearest<'a>(
        &self,
        target: DateTime<Utc>,
        candidates: &'a [RawObservation],
    ) -> Option<&'a RawObservation> {
        candidates
            .iter()
            .filter(|obs| obs.price.is_finite())
            .map(|obs| ((obs.timestamp - target).abs(), obs))
            .filter(|(distance, _)| *distance <= self.match_window)
            .min_by_key(|(distance, obs)| (*distance, obs.timestamp))
            .map(|(_, obs)| obs)
    }

    /// Score one prediction against the candidates available at `now`
    #[must_use]
    pub fn evaluate(
        &self,
        prediction: &StoredPrediction,
        candidates: &[RawObservation],
        now: DateTime<Utc>,
    ) -> ValidationOutcome {
        if let Some(actual) = self.nearest(prediction.prediction.target_timestamp, candidates) {
            ValidationOutcome::Recorded(score(prediction, actual, now))
        } else if now > self.expires_at(prediction) {
            ValidationOutcome::Expired
        } else {
            ValidationOutcome::Deferred
        }
    }
}

/// Error metrics of one prediction against its actual
#[must_use]
pub fn score(
    prediction: &StoredPrediction,
    actual: &RawObservation,
    validated_at: DateTime<Utc>,
) -> AccuracyRecord {
    let predicted = prediction.prediction.predicted_price;
    let absolute_error = (predicted - actual.price).abs();
    let percent_error =
        (actual.price != 0.0).then(|| absolute_error / actual.price.abs() * 100.0);

    AccuracyRecord {
        prediction_id: prediction.id,
        actual_timestamp: actual.timestamp,
        actual_price: actual.price,
        absolute_error,
        percent_error,
        within_confidence: prediction.prediction.covers(actual.price),
        validated_at,
    }
}

/// Per-horizon MAE, MAPE, RMSE and band coverage
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn summarize(scored: &[(StoredPrediction, AccuracyRecord)]) -> Vec<AccuracySummary> {
    let mut by_horizon: BTreeMap<u32, Vec<&AccuracyRecord>> = BTreeMap::new();
    for (prediction, record) in scored {
        by_horizon
            .entry(prediction.prediction.horizon_hours)
            .or_default()
            .push(record);
    }

    by_horizon
        .into_iter()
        .map(|(horizon_hours, records)| {
            let n = records.len() as f64;
            let mae = records.iter().map(|r| r.absolute_error).sum::<f64>() / n;
            let rmse = (records
                .iter()
                .map(|r| r.absolute_error * r.absolute_error)
                .sum::<f64>()
                / n)
                .sqrt();
            let percents: Vec<f64> = records.iter().filter_map(|r| r.percent_error).collect();
            let mape = (!percents.is_empty())
                .then(|| percents.iter().sum::<f64>() / percents.len() as f64);
            let covered = records.iter().filter(|r| r.within_confidence).count();

            AccuracySummary {
                horizon_hours,
                count: records.len(),
                mean_absolute_error: mae,
                mean_absolute_percent_error: mape,
                root_mean_squared_error: rmse,
                coverage: covered as f64 / n,
            }
        })
        .collect()
}
