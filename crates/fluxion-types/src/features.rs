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

/// Enriched feature vector derived from one raw observation and its trailing history.
///
/// Optional fields are `None` when the history needed to compute them is
/// missing. They are never zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Hour of the source observation (UTC, truncated to the hour)
    pub timestamp: DateTime<Utc>,

    /// Pool price of the source observation
    pub price: f64,
    pub demand_mw: Option<f64>,

    // ============= Calendar (market-local time) =============
    pub hour_of_day: u32,
    /// 0 = Monday
    pub day_of_week: u32,
    pub is_weekend: bool,

    // ============= Lags =============
    pub lag_1h: Option<f64>,
    pub lag_24h: Option<f64>,
    pub lag_168h: Option<f64>,

    // ============= Rolling statistics =============
    pub rolling_avg_3h: Option<f64>,
    pub rolling_avg_6h: Option<f64>,
    pub rolling_avg_24h: Option<f64>,
    pub rolling_std_24h: Option<f64>,
    pub rolling_avg_7d: Option<f64>,
    pub rolling_std_7d: Option<f64>,
    /// Sample standard deviation of price over the trailing 6 hours
    pub volatility_6h: Option<f64>,
    pub demand_avg_24h: Option<f64>,

    // ============= Momentum (position based) =============
    pub momentum_1h: Option<f64>,
    pub momentum_3h: Option<f64>,

    // ============= Market state =============
    /// Wind + solar share of total generation
    pub renewable_share: Option<f64>,
    /// (available capacity - demand) / demand
    pub reserve_margin: Option<f64>,
    pub temperature_c: Option<f64>,
    /// Exogenous fuel price for the hour
    pub fuel_price: Option<f64>,

    // ============= Interactions =============
    pub demand_temperature: Option<f64>,
    pub renewable_demand: Option<f64>,
    pub fuel_demand: Option<f64>,
}
