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

//! History window and target-time feature synthesis

use chrono::{DateTime, Utc};
use fluxion_types::{FeatureRecord, Horizon, Regime};
use std::collections::HashMap;

use crate::features::Calendar;
use crate::regime::RegimeSignals;

const SECS_PER_HOUR: i64 = 3600;

/// Ordered, de-duplicated slice of recent feature records
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    records: Vec<FeatureRecord>,
    price_by_hour: HashMap<i64, f64>,
    summary: Option<PriceSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PriceSummary {
    min: f64,
    max: f64,
    mean: f64,
}

impl HistoryWindow {
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn new(mut records: Vec<FeatureRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        records.dedup_by_key(|r| r.timestamp);

        let price_by_hour = records
            .iter()
            .map(|r| (r.timestamp.timestamp(), r.price))
            .collect();

        let summary = (!records.is_empty()).then(|| {
            let (min, max, sum) = records.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY, 0.0),
                |(min, max, sum), r| (min.min(r.price), max.max(r.price), sum + r.price),
            );
            PriceSummary {
                min,
                max,
                mean: sum / records.len() as f64,
            }
        });

        Self {
            records,
            price_by_hour,
            summary,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    #[must_use]
    pub fn latest(&self) -> Option<&FeatureRecord> {
        self.records.last()
    }

    /// Price recorded for the exact hour `ts`
    #[must_use]
    pub fn price_at(&self, ts: DateTime<Utc>) -> Option<f64> {
        self.price_by_hour.get(&ts.timestamp()).copied()
    }

    /// Mean price of all records at a market-local hour of day
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn hour_of_day_mean(&self, hour_of_day: u32) -> Option<f64> {
        let (sum, count) = self
            .records
            .iter()
            .filter(|r| r.hour_of_day == hour_of_day)
            .fold((0.0, 0_usize), |(sum, count), r| (sum + r.price, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// Most recent non-missing value of a field
    fn last_known(&self, field: impl Fn(&FeatureRecord) -> Option<f64>) -> Option<f64> {
        self.records.iter().rev().find_map(field)
    }
}

/// Feature vector describing the target hour of one forecast
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFeatures {
    pub prediction_timestamp: DateTime<Utc>,
    pub target_timestamp: DateTime<Utc>,
    pub horizon_hours: u32,
    pub calendar: Calendar,

    /// Latest known price (persistence value)
    pub last_price: f64,
    /// Price 24h before the target, when inside the history
    pub lag_24h: Option<f64>,
    /// Price 168h before the target, when inside the history
    pub lag_168h: Option<f64>,

    pub rolling_avg_24h: Option<f64>,
    pub rolling_std_24h: Option<f64>,
    pub rolling_avg_7d: Option<f64>,
    pub rolling_std_7d: Option<f64>,
    pub volatility_6h: Option<f64>,
    pub momentum_1h: Option<f64>,
    pub momentum_3h: Option<f64>,

    pub demand_mw: Option<f64>,
    pub renewable_share: Option<f64>,
    pub reserve_margin: Option<f64>,
    /// Forecast temperature for the target, else the last observed one
    pub temperature_c: Option<f64>,
    pub fuel_price: Option<f64>,

    /// Mean historical price at the target's hour of day
    pub seasonal_hour_mean: Option<f64>,
    pub history_mean: f64,
    pub history_min: f64,
    pub history_max: f64,

    /// Set by the engine after classification
    pub regime: Regime,
}

impl TargetFeatures {
    /// Build the vector for `prediction_timestamp + horizon`.
    ///
    /// Returns `None` for an empty history.
    #[must_use]
    pub fn synthesize(
        history: &HistoryWindow,
        prediction_timestamp: DateTime<Utc>,
        horizon: Horizon,
        calendar: Calendar,
        forecast_temperature: Option<f64>,
    ) -> Option<Self> {
        let latest = history.latest()?;
        let summary = history.summary?;
        let target_timestamp = prediction_timestamp + horizon.duration();
        let lag = |hours: i64| {
            let ts = target_timestamp.timestamp() - hours * SECS_PER_HOUR;
            history.price_by_hour.get(&ts).copied()
        };

        Some(Self {
            prediction_timestamp,
            target_timestamp,
            horizon_hours: horizon.hours(),
            calendar,
            last_price: latest.price,
            lag_24h: lag(24),
            lag_168h: lag(168),
            rolling_avg_24h: history.last_known(|r| r.rolling_avg_24h),
            rolling_std_24h: history.last_known(|r| r.rolling_std_24h),
            rolling_avg_7d: history.last_known(|r| r.rolling_avg_7d),
            rolling_std_7d: history.last_known(|r| r.rolling_std_7d),
            volatility_6h: history.last_known(|r| r.volatility_6h),
            momentum_1h: latest.momentum_1h,
            momentum_3h: latest.momentum_3h,
            demand_mw: history.last_known(|r| r.demand_mw),
            renewable_share: history.last_known(|r| r.renewable_share),
            reserve_margin: history.last_known(|r| r.reserve_margin),
            temperature_c: forecast_temperature.or_else(|| history.last_known(|r| r.temperature_c)),
            fuel_price: history.last_known(|r| r.fuel_price),
            seasonal_hour_mean: history.hour_of_day_mean(calendar.hour_of_day),
            history_mean: summary.mean,
            history_min: summary.min,
            history_max: summary.max,
            regime: Regime::Normal,
        })
    }

    #[must_use]
    pub fn signals(&self) -> RegimeSignals {
        RegimeSignals {
            demand_mw: self.demand_mw,
            reserve_margin: self.reserve_margin,
            renewable_share: self.renewable_share,
            volatility_6h: self.volatility_6h,
        }
    }

    /// Value of a named feature, used for statistics-driven adjustments
    #[must_use]
    pub fn value(&self, name: &str) -> Option<f64> {
        match name {
            "last_price" => Some(self.last_price),
            "lag_24h" => self.lag_24h,
            "lag_168h" => self.lag_168h,
            "rolling_avg_24h" => self.rolling_avg_24h,
            "rolling_std_24h" => self.rolling_std_24h,
            "rolling_avg_7d" => self.rolling_avg_7d,
            "rolling_std_7d" => self.rolling_std_7d,
            "volatility_6h" => self.volatility_6h,
            "momentum_1h" => self.momentum_1h,
            "momentum_3h" => self.momentum_3h,
            "demand_mw" => self.demand_mw,
            "renewable_share" => self.renewable_share,
            "reserve_margin" => self.reserve_margin,
            "temperature_c" => self.temperature_c,
            "fuel_price" => self.fuel_price,
            "seasonal_hour_mean" => self.seasonal_hour_mean,
            "hour_of_day" => Some(f64::from(self.calendar.hour_of_day)),
            "day_of_week" => Some(f64::from(self.calendar.day_of_week)),
            _ => None,
        }
    }

    /// Every present feature value, for the `features_used` audit trail
    #[must_use]
    pub fn present_values(&self) -> Vec<(&'static str, f64)> {
        FEATURE_NAMES
            .iter()
            .filter_map(|name| self.value(name).map(|v| (*name, v)))
            .collect()
    }
}

const FEATURE_NAMES: [&str; 18] = [
    "last_price",
    "lag_24h",
    "lag_168h",
    "rolling_avg_24h",
    "rolling_std_24h",
    "rolling_avg_7d",
    "rolling_std_7d",
    "volatility_6h",
    "momentum_1h",
    "momentum_3h",
    "demand_mw",
    "renewable_share",
    "reserve_margin",
    "temperature_c",
    "fuel_price",
    "seasonal_hour_mean",
    "hour_of_day",
    "day_of_week",
];

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::FeatureEngine;
    use chrono::{TimeDelta, TimeZone};
    use fluxion_types::{RawObservation, Weather};

    pub(crate) fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 0, 0, 0).unwrap()
    }

    /// Two weeks of a daily price cycle between 20 and 80
    pub(crate) fn oscillating_history(hours: i64) -> Vec<FeatureRecord> {
        let obs: Vec<RawObservation> = (0..hours)
            .map(|h| {
                #[expect(clippy::cast_precision_loss)]
                let phase = (h % 24) as f64 / 24.0 * std::f64::consts::TAU;
                RawObservation::new(start() + TimeDelta::hours(h), 50.0 + 30.0 * phase.sin())
                    .with_weather(Weather {
                        temperature_c: Some(-5.0),
                        ..Weather::default()
                    })
            })
            .collect();
        FeatureEngine::new(chrono_tz::UTC).compute(&obs, None)
    }

    #[test]
    fn lags_are_relative_to_target() {
        let history = HistoryWindow::new(oscillating_history(336));
        let prediction_ts = history.latest().unwrap().timestamp;
        let engine = FeatureEngine::new(chrono_tz::UTC);
        let horizon = Horizon::try_from(6).unwrap();
        let target = prediction_ts + horizon.duration();

        let tf = TargetFeatures::synthesize(
            &history,
            prediction_ts,
            horizon,
            engine.calendar(target),
            None,
        )
        .unwrap();

        assert_eq!(tf.target_timestamp, target);
        assert_eq!(tf.lag_24h, history.price_at(target - TimeDelta::hours(24)));
        assert_eq!(tf.lag_168h, history.price_at(target - TimeDelta::hours(168)));
        assert!(tf.lag_24h.is_some());
        assert_eq!(tf.temperature_c, Some(-5.0));
        assert!(tf.history_min >= 20.0 - 1e-9 && tf.history_max <= 80.0 + 1e-9);
    }

    #[test]
    fn forecast_temperature_overrides_last_known() {
        let history = HistoryWindow::new(oscillating_history(48));
        let prediction_ts = history.latest().unwrap().timestamp;
        let horizon = Horizon::try_from(1).unwrap();
        let calendar = FeatureEngine::new(chrono_tz::UTC).calendar(prediction_ts);
        let tf =
            TargetFeatures::synthesize(&history, prediction_ts, horizon, calendar, Some(12.5))
                .unwrap();
        assert_eq!(tf.temperature_c, Some(12.5));
    }

    #[test]
    fn empty_history_yields_nothing() {
        let history = HistoryWindow::new(Vec::new());
        let calendar = FeatureEngine::new(chrono_tz::UTC).calendar(start());
        assert!(
            TargetFeatures::synthesize(&history, start(), Horizon::ALL[0], calendar, None)
                .is_none()
        );
    }

    #[test]
    fn seasonal_mean_uses_matching_hours() {
        let history = HistoryWindow::new(oscillating_history(72));
        // Hour 0 of the cycle is always exactly 50
        assert!((history.hour_of_day_mean(0).unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(history.hour_of_day_mean(25), None);
    }
}
