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

//! Feature engineering: raw hourly observations in, feature records out.

mod window;

pub use window::{RollingWindow, Series, WindowArena};

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use fluxion_types::{ExogenousSeries, FeatureRecord, RawObservation, truncate_to_hour};
use std::collections::HashMap;
use tracing::debug;

const SECS_PER_HOUR: i64 = 3600;

/// Trailing price windows maintained by the engine (hours)
pub const PRICE_WINDOWS_HOURS: [u32; 4] = [3, 6, 24, 168];

const DEMAND_WINDOW_HOURS: u32 = 24;

const DEMAND_TEMPERATURE_SCALE: f64 = 1e-3;
const RENEWABLE_DEMAND_SCALE: f64 = 1e-6;
const FUEL_DEMAND_SCALE: f64 = 1e-3;

/// Hour-of-day and day-of-week of a timestamp in market-local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    pub hour_of_day: u32,
    /// 0 = Monday
    pub day_of_week: u32,
    pub is_weekend: bool,
}

/// Stateless feature engine bound to the market time zone.
///
/// `compute` is a pure function of its input: the same observation set
/// always yields the same records, bit for bit.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    timezone: Tz,
}

impl FeatureEngine {
    #[must_use]
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    #[must_use]
    pub fn calendar(&self, ts: DateTime<Utc>) -> Calendar {
        let local = ts.with_timezone(&self.timezone);
        let day_of_week = local.weekday().num_days_from_monday();
        Calendar {
            hour_of_day: local.hour(),
            day_of_week,
            is_weekend: day_of_week >= 5,
        }
    }

    /// Truncate to the hour, order by time and keep the first record per hour.
    ///
    /// Observations without a finite price carry nothing to learn from and are dropped.
    #[must_use]
    pub fn normalize(observations: &[RawObservation]) -> Vec<RawObservation> {
        let mut normalized: Vec<RawObservation> = observations
            .iter()
            .filter(|obs| {
                let usable = obs.price.is_finite();
                if !usable {
                    debug!(timestamp = %obs.timestamp, "Dropping observation with non-finite price");
                }
                usable
            })
            .map(|obs| RawObservation {
                timestamp: truncate_to_hour(obs.timestamp),
                ..obs.clone()
            })
            .collect();

        // Stable sort keeps arrival order within an hour, so dedup keeps the first
        normalized.sort_by_key(|obs| obs.timestamp);
        normalized.dedup_by_key(|obs| obs.timestamp);
        normalized
    }

    /// Compute one feature record per distinct observation hour
    #[must_use]
    pub fn compute(
        &self,
        observations: &[RawObservation],
        exogenous: Option<&ExogenousSeries>,
    ) -> Vec<FeatureRecord> {
        let observations = Self::normalize(observations);

        let price_by_hour: HashMap<i64, f64> = observations
            .iter()
            .map(|obs| (obs.timestamp.timestamp(), obs.price))
            .collect();
        let lag = |key: i64, hours: i64| price_by_hour.get(&(key - hours * SECS_PER_HOUR)).copied();

        let mut arena = PRICE_WINDOWS_HOURS
            .iter()
            .fold(WindowArena::new(), |arena, &hours| {
                arena.with_window(Series::Price, hours)
            })
            .with_window(Series::Demand, DEMAND_WINDOW_HOURS);

        let mut records = Vec::with_capacity(observations.len());
        for (i, obs) in observations.iter().enumerate() {
            let key = obs.timestamp.timestamp();
            arena.advance(Series::Price, key, Some(obs.price));
            arena.advance(Series::Demand, key, obs.demand_mw);

            let calendar = self.calendar(obs.timestamp);
            let demand = obs.demand_mw;
            let temperature = obs.weather.temperature_c;
            let fuel_price = exogenous.and_then(|series| series.value_at(obs.timestamp));

            let momentum = |back: usize| {
                i.checked_sub(back)
                    .and_then(|j| observations.get(j))
                    .map(|prev| obs.price - prev.price)
            };

            records.push(FeatureRecord {
                timestamp: obs.timestamp,
                price: obs.price,
                demand_mw: demand,
                hour_of_day: calendar.hour_of_day,
                day_of_week: calendar.day_of_week,
                is_weekend: calendar.is_weekend,
                lag_1h: lag(key, 1),
                lag_24h: lag(key, 24),
                lag_168h: lag(key, 168),
                rolling_avg_3h: arena.mean(Series::Price, 3),
                rolling_avg_6h: arena.mean(Series::Price, 6),
                rolling_avg_24h: arena.mean(Series::Price, 24),
                rolling_std_24h: arena.sample_std(Series::Price, 24),
                rolling_avg_7d: arena.mean(Series::Price, 168),
                rolling_std_7d: arena.sample_std(Series::Price, 168),
                volatility_6h: arena.sample_std(Series::Price, 6),
                demand_avg_24h: arena.mean(Series::Demand, DEMAND_WINDOW_HOURS),
                momentum_1h: momentum(1),
                momentum_3h: momentum(3),
                renewable_share: obs.generation.renewable_share(),
                reserve_margin: obs.reserve_margin(),
                temperature_c: temperature,
                fuel_price,
                demand_temperature: interaction(demand, temperature, DEMAND_TEMPERATURE_SCALE),
                renewable_demand: interaction(
                    obs.generation.renewable_mw(),
                    demand,
                    RENEWABLE_DEMAND_SCALE,
                ),
                fuel_demand: interaction(fuel_price, demand, FUEL_DEMAND_SCALE),
            });
        }

        debug!(
            records = records.len(),
            "Computed feature records from observations"
        );
        records
    }
}

/// Scaled product of two features; missing operands propagate
fn interaction(a: Option<f64>, b: Option<f64>, scale: f64) -> Option<f64> {
    Some(a? * b? * scale)
}
