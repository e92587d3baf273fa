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

//! Consistency checks for published model parameter bundles

use fluxion_types::{ModelParameters, Regime};
use std::collections::BTreeMap;

use crate::error::{ForecastError, Result};

/// Allowed deviation of an ensemble weight vector sum from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Reject bundles the ensemble engine cannot consume safely.
///
/// Every weight vector must be non-empty, non-negative and sum to 1 within
/// [`WEIGHT_SUM_TOLERANCE`]. Spread parameters must be finite and non-negative.
pub fn validate(params: &ModelParameters) -> Result<()> {
    if params.version.trim().is_empty() {
        return Err(ForecastError::Configuration(
            "model parameters have an empty version".to_owned(),
        ));
    }

    check_non_negative("residual_std_dev", params.residual_std_dev)?;
    check_non_negative("outlier_threshold", params.outlier_threshold)?;
    check_non_negative("confidence_widening", params.confidence_widening)?;

    check_weights("default", &params.default_weights)?;
    for (regime, weights) in &params.ensemble_weights {
        check_weights(regime.as_str(), weights)?;
    }

    let mut seen = Vec::with_capacity(Regime::ALL.len());
    for regime in &params.regime_thresholds.priority {
        if seen.contains(regime) {
            return Err(ForecastError::Configuration(format!(
                "regime '{regime}' listed twice in threshold priority"
            )));
        }
        seen.push(*regime);
    }

    Ok(())
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ForecastError::Configuration(format!(
            "{field} must be finite and non-negative, got {value}"
        )))
    }
}

fn check_weights(label: &str, weights: &BTreeMap<String, f64>) -> Result<()> {
    if weights.is_empty() {
        return Err(ForecastError::Configuration(format!(
            "{label} weight vector is empty"
        )));
    }

    if let Some((name, weight)) = weights
        .iter()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(ForecastError::Configuration(format!(
            "{label} weight for '{name}' must be finite and non-negative, got {weight}"
        )));
    }

    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ForecastError::Configuration(format!(
            "{label} weights sum to {sum}, expected 1.0"
        )));
    }

    Ok(())
}
