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

/// Truncate a timestamp to the start of its UTC hour.
///
/// Market hours are keyed by their start, so every lookup in the pipeline
/// goes through this function first.
#[must_use]
pub fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0).unwrap_or(ts)
}

/// Generation output per fuel type in MW.
///
/// Each field is `None` when the operator did not report that fuel for the hour.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationMix {
    pub gas_mw: Option<f64>,
    pub coal_mw: Option<f64>,
    pub hydro_mw: Option<f64>,
    pub wind_mw: Option<f64>,
    pub solar_mw: Option<f64>,
    pub other_mw: Option<f64>,
}

impl GenerationMix {
    /// Variable renewable output (wind + solar). Both must be reported.
    #[must_use]
    pub fn renewable_mw(&self) -> Option<f64> {
        Some(self.wind_mw? + self.solar_mw?)
    }

    /// Sum of all reported fuels, `None` when nothing was reported
    #[must_use]
    pub fn total_mw(&self) -> Option<f64> {
        [
            self.gas_mw,
            self.coal_mw,
            self.hydro_mw,
            self.wind_mw,
            self.solar_mw,
            self.other_mw,
        ]
        .into_iter()
        .flatten()
        .fold(None, |acc, mw| Some(acc.unwrap_or(0.0) + mw))
    }

    /// Share of variable renewables in total generation (0.0 - 1.0)
    #[must_use]
    pub fn renewable_share(&self) -> Option<f64> {
        let total = self.total_mw()?;
        if total <= 0.0 {
            return None;
        }
        Some(self.renewable_mw()? / total)
    }
}

/// Weather conditions observed at the market's reference location
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Weather {
    pub temperature_c: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub cloud_cover_pct: Option<f64>,
}

/// System reserve state reported by the market operator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reserves {
    /// Contingency reserve currently dispatched or held (MW)
    pub operating_reserve_mw: Option<f64>,

    /// Capacity offered into the market for the hour (MW)
    pub available_capacity_mw: Option<f64>,
}

/// One hourly market record as published by the operator.
///
/// Immutable once appended. Only `timestamp` and `price` are mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Settlement time of the record (UTC)
    pub timestamp: DateTime<Utc>,

    /// Pool price for the hour ($/MWh)
    pub price: f64,

    /// Average system demand for the hour (MW)
    pub demand_mw: Option<f64>,

    #[serde(default)]
    pub generation: GenerationMix,

    #[serde(default)]
    pub weather: Weather,

    #[serde(default)]
    pub reserves: Reserves,
}

impl RawObservation {
    /// Create an observation carrying only a price
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            price,
            demand_mw: None,
            generation: GenerationMix::default(),
            weather: Weather::default(),
            reserves: Reserves::default(),
        }
    }

    #[must_use]
    pub fn with_demand(mut self, demand_mw: f64) -> Self {
        self.demand_mw = Some(demand_mw);
        self
    }

    #[must_use]
    pub fn with_generation(mut self, generation: GenerationMix) -> Self {
        self.generation = generation;
        self
    }

    #[must_use]
    pub fn with_weather(mut self, weather: Weather) -> Self {
        self.weather = weather;
        self
    }

    #[must_use]
    pub fn with_reserves(mut self, reserves: Reserves) -> Self {
        self.reserves = reserves;
        self
    }

    /// Headroom of available capacity over demand, as a fraction of demand
    #[must_use]
    pub fn reserve_margin(&self) -> Option<f64> {
        let demand = self.demand_mw?;
        if demand <= 0.0 {
            return None;
        }
        Some((self.reserves.available_capacity_mw? - demand) / demand)
    }
}

/// A forecast of weather at one target hour, as issued at `issued_at`.
///
/// Several forecasts may exist for the same target hour; consumers pick the
/// most recently issued one that was available at prediction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecast {
    pub location: String,
    pub target_timestamp: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub temperature_c: Option<f64>,
    pub wind_speed_ms: Option<f64>,
}

/// Hour-keyed external series, e.g. natural gas price
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExogenousSeries {
    pub name: String,
    pub values: BTreeMap<DateTime<Utc>, f64>,
}

impl ExogenousSeries {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Insert a value at the hour containing `ts`
    pub fn insert(&mut self, ts: DateTime<Utc>, value: f64) {
        self.values.insert(truncate_to_hour(ts), value);
    }

    /// Value for the hour containing `ts`
    #[must_use]
    pub fn value_at(&self, ts: DateTime<Utc>) -> Option<f64> {
        self.values.get(&truncate_to_hour(ts)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn truncates_to_hour_start() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 14, 37, 12).unwrap();
        assert_eq!(
            truncate_to_hour(ts),
            Utc.with_ymd_and_hms(2025, 3, 1, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn renewable_share_requires_wind_and_solar() {
        let mix = GenerationMix {
            gas_mw: Some(600.0),
            wind_mw: Some(300.0),
            solar_mw: Some(100.0),
            ..GenerationMix::default()
        };
        assert!((mix.renewable_share().unwrap() - 0.4).abs() < 1e-12);

        let no_solar = GenerationMix {
            solar_mw: None,
            ..mix
        };
        assert_eq!(no_solar.renewable_share(), None);
        assert_eq!(GenerationMix::default().total_mw(), None);
    }

    #[test]
    fn reserve_margin_needs_positive_demand() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let obs = RawObservation::new(ts, 50.0)
            .with_demand(10_000.0)
            .with_reserves(Reserves {
                operating_reserve_mw: Some(500.0),
                available_capacity_mw: Some(11_500.0),
            });
        assert!((obs.reserve_margin().unwrap() - 0.15).abs() < 1e-12);

        let zero = RawObservation::new(ts, 50.0).with_demand(0.0);
        assert_eq!(zero.reserve_margin(), None);
    }

    #[test]
    fn exogenous_lookup_is_hour_keyed() {
        let mut gas = ExogenousSeries::new("natural_gas");
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 5, 0, 0).unwrap();
        gas.insert(ts, 2.75);
        assert_eq!(gas.value_at(ts + chrono::TimeDelta::minutes(20)), Some(2.75));
        assert_eq!(gas.value_at(ts + chrono::TimeDelta::hours(1)), None);
    }
}
