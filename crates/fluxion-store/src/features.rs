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

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fluxion_forecast::FeatureStore;
use fluxion_types::FeatureRecord;
use rusqlite::{OptionalExtension, Row, params};

use crate::{SqliteStore, to_utc};

const SELECT_FEATURES: &str = "SELECT
    timestamp, price, demand_mw, hour_of_day, day_of_week, is_weekend,
    lag_1h, lag_24h, lag_168h,
    rolling_avg_3h, rolling_avg_6h, rolling_avg_24h, rolling_std_24h,
    rolling_avg_7d, rolling_std_7d, volatility_6h, demand_avg_24h,
    momentum_1h, momentum_3h,
    renewable_share, reserve_margin, temperature_c, fuel_price,
    demand_temperature, renewable_demand, fuel_demand
 FROM features";

const UPSERT_FEATURE: &str = "INSERT INTO features (
    timestamp, price, demand_mw, hour_of_day, day_of_week, is_weekend,
    lag_1h, lag_24h, lag_168h,
    rolling_avg_3h, rolling_avg_6h, rolling_avg_24h, rolling_std_24h,
    rolling_avg_7d, rolling_std_7d, volatility_6h, demand_avg_24h,
    momentum_1h, momentum_3h,
    renewable_share, reserve_margin, temperature_c, fuel_price,
    demand_temperature, renewable_demand, fuel_demand, computed_at
 ) VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
    ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
 )
 ON CONFLICT(timestamp) DO UPDATE SET
    price = excluded.price,
    demand_mw = excluded.demand_mw,
    hour_of_day = excluded.hour_of_day,
    day_of_week = excluded.day_of_week,
    is_weekend = excluded.is_weekend,
    lag_1h = excluded.lag_1h,
    lag_24h = excluded.lag_24h,
    lag_168h = excluded.lag_168h,
    rolling_avg_3h = excluded.rolling_avg_3h,
    rolling_avg_6h = excluded.rolling_avg_6h,
    rolling_avg_24h = excluded.rolling_avg_24h,
    rolling_std_24h = excluded.rolling_std_24h,
    rolling_avg_7d = excluded.rolling_avg_7d,
    rolling_std_7d = excluded.rolling_std_7d,
    volatility_6h = excluded.volatility_6h,
    demand_avg_24h = excluded.demand_avg_24h,
    momentum_1h = excluded.momentum_1h,
    momentum_3h = excluded.momentum_3h,
    renewable_share = excluded.renewable_share,
    reserve_margin = excluded.reserve_margin,
    temperature_c = excluded.temperature_c,
    fuel_price = excluded.fuel_price,
    demand_temperature = excluded.demand_temperature,
    renewable_demand = excluded.renewable_demand,
    fuel_demand = excluded.fuel_demand,
    computed_at = excluded.computed_at";

fn feature_from_row(row: &Row<'_>) -> rusqlite::Result<FeatureRecord> {
    Ok(FeatureRecord {
        timestamp: to_utc(0, row.get(0)?)?,
        price: row.get(1)?,
        demand_mw: row.get(2)?,
        hour_of_day: row.get(3)?,
        day_of_week: row.get(4)?,
        is_weekend: row.get(5)?,
        lag_1h: row.get(6)?,
        lag_24h: row.get(7)?,
        lag_168h: row.get(8)?,
        rolling_avg_3h: row.get(9)?,
        rolling_avg_6h: row.get(10)?,
        rolling_avg_24h: row.get(11)?,
        rolling_std_24h: row.get(12)?,
        rolling_avg_7d: row.get(13)?,
        rolling_std_7d: row.get(14)?,
        volatility_6h: row.get(15)?,
        demand_avg_24h: row.get(16)?,
        momentum_1h: row.get(17)?,
        momentum_3h: row.get(18)?,
        renewable_share: row.get(19)?,
        reserve_margin: row.get(20)?,
        temperature_c: row.get(21)?,
        fuel_price: row.get(22)?,
        demand_temperature: row.get(23)?,
        renewable_demand: row.get(24)?,
        fuel_demand: row.get(25)?,
    })
}

impl FeatureStore for SqliteStore {
    fn upsert_features(&self, records: &[FeatureRecord]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let computed_at = Utc::now().timestamp();
        let mut written = 0;
        {
            let mut stmt = tx.prepare(UPSERT_FEATURE)?;
            for r in records {
                written += stmt.execute(params![
                    r.timestamp.timestamp(),
                    r.price,
                    r.demand_mw,
                    r.hour_of_day,
                    r.day_of_week,
                    r.is_weekend,
                    r.lag_1h,
                    r.lag_24h,
                    r.lag_168h,
                    r.rolling_avg_3h,
                    r.rolling_avg_6h,
                    r.rolling_avg_24h,
                    r.rolling_std_24h,
                    r.rolling_avg_7d,
                    r.rolling_std_7d,
                    r.volatility_6h,
                    r.demand_avg_24h,
                    r.momentum_1h,
                    r.momentum_3h,
                    r.renewable_share,
                    r.reserve_margin,
                    r.temperature_c,
                    r.fuel_price,
                    r.demand_temperature,
                    r.renewable_demand,
                    r.fuel_demand,
                    computed_at,
                ])?;
            }
        }
        tx.commit().context("Failed to commit feature records")?;
        Ok(written)
    }

    fn features_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FeatureRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_FEATURES} WHERE timestamp >= ?1 AND timestamp <= ?2 ORDER BY timestamp ASC"
        ))?;
        let records = stmt
            .query_map(params![start.timestamp(), end.timestamp()], feature_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn latest_feature_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock();
        let latest: Option<i64> = conn
            .query_row("SELECT MAX(timestamp) FROM features", [], |row| row.get(0))
            .optional()?
            .flatten();
        latest
            .map(|secs| to_utc(0, secs).map_err(anyhow::Error::from))
            .transpose()
    }
}
