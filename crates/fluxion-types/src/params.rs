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

/// Summary statistics of one feature over the training set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl FeatureStatistics {
    /// Standardize a value against these statistics, `None` for a degenerate spread
    #[must_use]
    pub fn z_score(&self, value: f64) -> Option<f64> {
        (self.std_dev > 0.0).then(|| (value - self.mean) / self.std_dev)
    }
}

/// Thresholds and evaluation order for regime classification.
///
/// A threshold left unset disables its rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    /// Rule evaluation order; the first matching regime wins
    #[serde(default = "default_priority")]
    pub priority: Vec<Regime>,

    /// Demand at or above this level is peak demand (MW)
    #[serde(default)]
    pub peak_demand_mw: Option<f64>,

    /// Reserve margin at or below this ratio is peak demand
    #[serde(default)]
    pub tight_reserve_margin: Option<f64>,

    /// Renewable share at or above this ratio is high-renewable
    #[serde(default)]
    pub high_renewable_share: Option<f64>,

    /// 6h price volatility at or above this level is volatile ($/MWh)
    #[serde(default)]
    pub volatility_threshold: Option<f64>,
}

fn default_priority() -> Vec<Regime> {
    vec![Regime::PeakDemand, Regime::Volatile, Regime::HighRenewable]
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            peak_demand_mw: None,
            tight_reserve_margin: None,
            high_renewable_share: None,
            volatility_threshold: None,
        }
    }
}

/// Versioned bundle of learned coefficients published by offline training.
///
/// Bundles are immutable; a retrain publishes a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub version: String,
    pub published_at: DateTime<Utc>,

    /// Correlation of each feature with the target price
    #[serde(default)]
    pub feature_correlations: BTreeMap<String, f64>,

    #[serde(default)]
    pub feature_statistics: BTreeMap<String, FeatureStatistics>,

    /// Free-form scaling coefficients consumed by the estimators
    #[serde(default)]
    pub feature_scaling: BTreeMap<String, f64>,

    #[serde(default)]
    pub regime_thresholds: RegimeThresholds,

    /// Estimator weights per regime, each vector summing to 1
    #[serde(default)]
    pub ensemble_weights: BTreeMap<Regime, BTreeMap<String, f64>>,

    /// Weights used for a regime without its own vector
    pub default_weights: BTreeMap<String, f64>,

    /// Winsorization width in residual standard deviations
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold: f64,

    /// Standard deviation of historical forecast errors ($/MWh)
    pub residual_std_dev: f64,

    /// Band widening factor `k` in `residual_std_dev * (1 + horizon / 24 * k)`
    #[serde(default = "default_confidence_widening")]
    pub confidence_widening: f64,
}

fn default_outlier_threshold() -> f64 {
    3.0
}

fn default_confidence_widening() -> f64 {
    0.5
}

impl ModelParameters {
    /// Weight vector for a regime, falling back to the default vector
    #[must_use]
    pub fn weights_for(&self, regime: Regime) -> &BTreeMap<String, f64> {
        self.ensemble_weights
            .get(&regime)
            .unwrap_or(&self.default_weights)
    }
}
