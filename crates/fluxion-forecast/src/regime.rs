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

//! Deterministic regime classification.

use fluxion_types::{FeatureRecord, Regime, RegimeThresholds};

/// Inputs the classifier looks at, taken from a feature record or a
/// synthesized target vector
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegimeSignals {
    pub demand_mw: Option<f64>,
    pub reserve_margin: Option<f64>,
    pub renewable_share: Option<f64>,
    pub volatility_6h: Option<f64>,
}

impl From<&FeatureRecord> for RegimeSignals {
    fn from(record: &FeatureRecord) -> Self {
        Self {
            demand_mw: record.demand_mw,
            reserve_margin: record.reserve_margin,
            renewable_share: record.renewable_share,
            volatility_6h: record.volatility_6h,
        }
    }
}

/// Label the signals with exactly one regime.
///
/// Rules run in `thresholds.priority` order and the first match wins. A rule
/// whose threshold or input is missing never matches. No match is `Normal`.
#[must_use]
pub fn classify(signals: &RegimeSignals, thresholds: &RegimeThresholds) -> Regime {
    thresholds
        .priority
        .iter()
        .copied()
        .find(|regime| matches_rule(*regime, signals, thresholds))
        .unwrap_or(Regime::Normal)
}

fn matches_rule(regime: Regime, signals: &RegimeSignals, thresholds: &RegimeThresholds) -> bool {
    let at_least = |value: Option<f64>, threshold: Option<f64>| {
        matches!((value, threshold), (Some(v), Some(t)) if v >= t)
    };

    match regime {
        Regime::PeakDemand => {
            at_least(signals.demand_mw, thresholds.peak_demand_mw)
                || matches!(
                    (signals.reserve_margin, thresholds.tight_reserve_margin),
                    (Some(v), Some(t)) if v <= t
                )
        }
        Regime::HighRenewable => {
            at_least(signals.renewable_share, thresholds.high_renewable_share)
        }
        Regime::Volatile => at_least(signals.volatility_6h, thresholds.volatility_threshold),
        // Normal is the fallback, listing it in the priority ends evaluation
        Regime::Normal => true,
    }
}
