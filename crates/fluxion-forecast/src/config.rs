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

//! Tunables for the pipeline stages, deserialized from the `[features]`,
//! `[ensemble]` and `[validation]` sections of the application config.

use chrono::TimeDelta;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    /// How late an observation may arrive and still be picked up (hours)
    #[serde(default = "default_lateness_tolerance_hours")]
    pub lateness_tolerance_hours: u32,

    /// Exogenous series joined in as `fuel_price`
    #[serde(default)]
    pub exogenous_series: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    /// Hourly records of history handed to the engine
    #[serde(default = "default_history_window_hours")]
    pub history_window_hours: u32,

    /// Fewer records than this fails the run as insufficient history
    #[serde(default = "default_min_history_records")]
    pub min_history_records: usize,

    /// Newest record older than this fails the run as insufficient history
    #[serde(default = "default_max_history_staleness_hours")]
    pub max_history_staleness_hours: u32,

    /// Clamp the lower confidence bound at zero. Wholesale markets can clear
    /// negative, so this is a policy choice.
    #[serde(default = "default_floor_lower_bound_at_zero")]
    pub floor_lower_bound_at_zero: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Half-width of the window searched for an actual observation (minutes)
    #[serde(default = "default_match_window_minutes")]
    pub match_window_minutes: u32,
}

fn default_lateness_tolerance_hours() -> u32 {
    6
}

fn default_history_window_hours() -> u32 {
    336
}

fn default_min_history_records() -> usize {
    24
}

fn default_max_history_staleness_hours() -> u32 {
    6
}

fn default_floor_lower_bound_at_zero() -> bool {
    true
}

fn default_match_window_minutes() -> u32 {
    30
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lateness_tolerance_hours: default_lateness_tolerance_hours(),
            exogenous_series: None,
        }
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            history_window_hours: default_history_window_hours(),
            min_history_records: default_min_history_records(),
            max_history_staleness_hours: default_max_history_staleness_hours(),
            floor_lower_bound_at_zero: default_floor_lower_bound_at_zero(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            match_window_minutes: default_match_window_minutes(),
        }
    }
}

impl FeatureConfig {
    #[must_use]
    pub fn lateness_tolerance(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.lateness_tolerance_hours))
    }
}

impl EnsembleConfig {
    #[must_use]
    pub fn history_window(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.history_window_hours))
    }

    #[must_use]
    pub fn max_history_staleness(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.max_history_staleness_hours))
    }
}

impl ValidationConfig {
    #[must_use]
    pub fn match_window(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.match_window_minutes))
    }
}
