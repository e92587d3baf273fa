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

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Market condition bucket used to select ensemble weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Regime {
    Normal,
    HighRenewable,
    PeakDemand,
    Volatile,
}

impl Regime {
    pub const ALL: [Self; 4] = [
        Self::Normal,
        Self::HighRenewable,
        Self::PeakDemand,
        Self::Volatile,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::HighRenewable => "high-renewable",
            Self::PeakDemand => "peak-demand",
            Self::Volatile => "volatile",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown regime label: {0}")]
pub struct UnknownRegime(pub String);

impl FromStr for Regime {
    type Err = UnknownRegime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|regime| regime.as_str() == s)
            .ok_or_else(|| UnknownRegime(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported forecast horizon: {0}h (supported: 1, 6, 12, 24)")]
pub struct UnsupportedHorizon(pub u32);

/// Forecast horizon in hours, restricted to the published set {1, 6, 12, 24}
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Horizon(u32);

impl Horizon {
    pub const SUPPORTED_HOURS: [u32; 4] = [1, 6, 12, 24];

    pub const ALL: [Self; 4] = [Self(1), Self(6), Self(12), Self(24)];

    #[must_use]
    pub fn hours(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn duration(self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.0))
    }
}

impl TryFrom<u32> for Horizon {
    type Error = UnsupportedHorizon;

    fn try_from(hours: u32) -> Result<Self, Self::Error> {
        if Self::SUPPORTED_HOURS.contains(&hours) {
            Ok(Self(hours))
        } else {
            Err(UnsupportedHorizon(hours))
        }
    }
}

impl From<Horizon> for u32 {
    fn from(horizon: Horizon) -> Self {
        horizon.0
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regime_labels_round_trip_through_str() {
        for regime in Regime::ALL {
            assert_eq!(regime.as_str().parse::<Regime>().unwrap(), regime);
        }
        assert!("calm".parse::<Regime>().is_err());
    }

    #[test]
    fn regime_serializes_as_kebab_case() {
        let json = serde_json::to_string(&Regime::HighRenewable).unwrap();
        assert_eq!(json, "\"high-renewable\"");
    }

    #[test]
    fn horizon_accepts_only_published_set() {
        assert_eq!(Horizon::try_from(6).unwrap().hours(), 6);
        assert_eq!(Horizon::try_from(3), Err(UnsupportedHorizon(3)));
        assert!(serde_json::from_str::<Horizon>("48").is_err());
        assert_eq!(serde_json::from_str::<Horizon>("12").unwrap(), Horizon::ALL[2]);
    }
}
