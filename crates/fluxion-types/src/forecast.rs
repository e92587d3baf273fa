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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::regime::Regime;

/// Point forecast with confidence band for one horizon.
///
/// Invariants: `target_timestamp = prediction_timestamp + horizon_hours` and
/// `confidence_lower <= predicted_price <= confidence_upper`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Hour the forecast was produced for (latest known hour)
    pub prediction_timestamp: DateTime<Utc>,
    pub target_timestamp: DateTime<Utc>,
    pub horizon_hours: u32,
    pub predicted_price: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
    /// 0.5 - 1.0, decreasing with horizon
    pub confidence_score: f64,
    pub regime: Regime,
    pub model_version: String,
    /// Feature values used, plus raw estimator outputs under `estimate.<name>`
    pub features_used: BTreeMap<String, f64>,
}

impl Prediction {
    #[must_use]
    pub fn band_width(&self) -> f64 {
        self.confidence_upper - self.confidence_lower
    }

    /// Whether an actual price falls inside the confidence band (inclusive)
    #[must_use]
    pub fn covers(&self, actual_price: f64) -> bool {
        (self.confidence_lower..=self.confidence_upper).contains(&actual_price)
    }
}

/// A persisted prediction with its store id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrediction {
    pub id: i64,
    #[serde(flatten)]
    pub prediction: Prediction,
}

/// Outcome of scoring one prediction against the actual price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    pub prediction_id: i64,
    /// Timestamp of the matched observation
    pub actual_timestamp: DateTime<Utc>,
    pub actual_price: f64,
    pub absolute_error: f64,
    /// Percent of the actual price, `None` when the actual price is zero
    pub percent_error: Option<f64>,
    pub within_confidence: bool,
    pub validated_at: DateTime<Utc>,
}

/// Aggregate accuracy for one horizon over a reporting period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub horizon_hours: u32,
    pub count: usize,
    pub mean_absolute_error: f64,
    /// `None` when every actual price in the period was zero
    pub mean_absolute_percent_error: Option<f64>,
    pub root_mean_squared_error: f64,
    /// Fraction of actuals that fell inside the confidence band
    pub coverage: f64,
}
