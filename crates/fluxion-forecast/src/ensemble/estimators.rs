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

//! Price estimators combined by the ensemble.
//!
//! Each estimator is a pure function of the target feature vector and the
//! pinned parameter bundle. New estimators only need to be registered; the
//! combiner looks them up by name from the regime weight vectors.

use fluxion_types::{ModelParameters, Regime};
use std::fmt;

use super::target::TargetFeatures;

/// Single price model inside the ensemble
pub trait PriceEstimator: Send + Sync {
    /// Name used as key in the ensemble weight vectors
    fn name(&self) -> &str;

    /// Point price estimate for the target hour ($/MWh)
    fn estimate(&self, features: &TargetFeatures, params: &ModelParameters) -> f64;
}

/// Ordered set of estimators consulted by the combiner
pub struct EstimatorRegistry {
    estimators: Vec<Box<dyn PriceEstimator>>,
}

impl EstimatorRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            estimators: Vec::new(),
        }
    }

    /// Lag, decomposition, volatility and regime estimators, in that order
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(LagEstimator));
        registry.register(Box::new(DecompositionEstimator));
        registry.register(Box::new(VolatilityEstimator));
        registry.register(Box::new(RegimeEstimator));
        registry
    }

    /// Append an estimator; a later estimator with the same name replaces the earlier one
    pub fn register(&mut self, estimator: Box<dyn PriceEstimator>) {
        if let Some(slot) = self
            .estimators
            .iter_mut()
            .find(|e| e.name() == estimator.name())
        {
            *slot = estimator;
        } else {
            self.estimators.push(estimator);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn PriceEstimator> {
        self.estimators
            .iter()
            .find(|e| e.name() == name)
            .map(AsRef::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn PriceEstimator> {
        self.estimators.iter().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.estimators.iter().map(|e| e.name()).collect()
    }
}

impl fmt::Debug for EstimatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimatorRegistry")
            .field("estimators", &self.names())
            .finish()
    }
}

fn horizon(features: &TargetFeatures) -> f64 {
    f64::from(features.horizon_hours)
}

fn scaling(params: &ModelParameters, key: &str, default: f64) -> f64 {
    params.feature_scaling.get(key).copied().unwrap_or(default)
}

/// Persistence blended with same-hour lags.
///
/// Weights are absolute feature correlations; persistence decays as
/// `exp(-horizon / 24)`.
#[derive(Debug, Clone, Copy)]
pub struct LagEstimator;

impl PriceEstimator for LagEstimator {
    fn name(&self) -> &str {
        "lag"
    }

    fn estimate(&self, features: &TargetFeatures, params: &ModelParameters) -> f64 {
        let correlation = |name: &str, default: f64| {
            params
                .feature_correlations
                .get(name)
                .map_or(default, |c| c.abs())
        };
        let persistence_decay = (-horizon(features) / 24.0).exp();

        let terms = [
            (
                Some(features.last_price),
                correlation("lag_1h", 0.9) * persistence_decay,
            ),
            (features.lag_24h, correlation("lag_24h", 0.6)),
            (features.lag_168h, correlation("lag_168h", 0.4)),
        ];

        let (weighted, total) = terms
            .iter()
            .filter_map(|(value, weight)| value.map(|v| (v, *weight)))
            .fold((0.0, 0.0), |(acc, total), (v, w)| (acc + v * w, total + w));

        if total > 0.0 {
            weighted / total
        } else {
            features.last_price
        }
    }
}

/// Weekly level plus hour-of-day seasonal offset plus damped daily trend
#[derive(Debug, Clone, Copy)]
pub struct DecompositionEstimator;

impl PriceEstimator for DecompositionEstimator {
    fn name(&self) -> &str {
        "decomposition"
    }

    fn estimate(&self, features: &TargetFeatures, params: &ModelParameters) -> f64 {
        let level = features
            .rolling_avg_7d
            .or(features.rolling_avg_24h)
            .unwrap_or(features.history_mean);
        let seasonal = features
            .seasonal_hour_mean
            .map_or(0.0, |m| m - features.history_mean);
        let trend = match (features.rolling_avg_24h, features.rolling_avg_7d) {
            (Some(day), Some(week)) => {
                (day - week) * scaling(params, "decomposition.trend_damping", 0.5)
            }
            _ => 0.0,
        };

        level + seasonal + trend
    }
}

/// Mean reversion toward the 24h average, faster when volatility is elevated,
/// plus short-lived momentum
#[derive(Debug, Clone, Copy)]
pub struct VolatilityEstimator;

impl PriceEstimator for VolatilityEstimator {
    fn name(&self) -> &str {
        "volatility"
    }

    fn estimate(&self, features: &TargetFeatures, params: &ModelParameters) -> f64 {
        let h = horizon(features);
        let mean = features.rolling_avg_24h.unwrap_or(features.history_mean);
        let ratio = match (features.volatility_6h, features.rolling_std_24h) {
            (Some(short), Some(long)) if long > 0.0 => (short / long).clamp(0.25, 2.0),
            _ => 1.0,
        };
        let speed = scaling(params, "volatility.reversion_hours", 12.0).max(1.0);
        let reversion = 1.0 - (-h * ratio / speed).exp();
        let momentum = features.momentum_1h.unwrap_or(0.0) * (-h / 3.0).exp();

        features.last_price + (mean - features.last_price) * reversion + momentum
    }
}

/// Daily mean scaled by the regime multiplier and shifted by standardized
/// exogenous sensitivities
#[derive(Debug, Clone, Copy)]
pub struct RegimeEstimator;

/// Features with a learnable sensitivity under `sensitivity.<name>`
const SENSITIVE_FEATURES: [&str; 5] = [
    "demand_mw",
    "temperature_c",
    "renewable_share",
    "reserve_margin",
    "fuel_price",
];

fn default_regime_multiplier(regime: Regime) -> f64 {
    match regime {
        Regime::Normal => 1.0,
        Regime::HighRenewable => 0.85,
        Regime::PeakDemand => 1.2,
        Regime::Volatile => 1.05,
    }
}

impl PriceEstimator for RegimeEstimator {
    fn name(&self) -> &str {
        "regime"
    }

    fn estimate(&self, features: &TargetFeatures, params: &ModelParameters) -> f64 {
        let base = features.rolling_avg_24h.unwrap_or(features.history_mean);
        let multiplier = scaling(
            params,
            &format!("regime.{}", features.regime),
            default_regime_multiplier(features.regime),
        );

        let adjustment: f64 = SENSITIVE_FEATURES
            .iter()
            .filter_map(|name| {
                let sensitivity = params.feature_scaling.get(&format!("sensitivity.{name}"))?;
                let z = params
                    .feature_statistics
                    .get(*name)?
                    .z_score(features.value(name)?)?;
                Some(sensitivity * z)
            })
            .sum();

        base * multiplier + adjustment
    }
}
