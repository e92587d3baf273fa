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
use fluxion_forecast::ObservationSource;
use fluxion_types::{
    ExogenousSeries, GenerationMix, RawObservation, Reserves, Weather, WeatherForecast,
    truncate_to_hour,
};
use rusqlite::params;
use tracing::debug;

use crate::{SqliteStore, to_utc};

impl SqliteStore {
    /// Append observations from the market feed.
    ///
    /// The feed is append-only: an observation for an already stored
    /// timestamp is ignored. Returns the number of new rows.
    pub fn append_observations(&self, observations: &[RawObservation]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let received_at = Utc::now().timestamp();
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO observations (
                    timestamp, price, demand_mw,
                    gas_mw, coal_mw, hydro_mw, wind_mw, solar_mw, other_mw,
                    temperature_c, wind_speed_ms, cloud_cover_pct,
                    operating_reserve_mw, available_capacity_mw, received_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(timestamp) DO NOTHING",
            )?;
            for obs in observations {
                let g = &obs.generation;
                inserted += stmt.execute(params![
                    obs.timestamp.timestamp(),
                    obs.price,
                    obs.demand_mw,
                    g.gas_mw,
                    g.coal_mw,
                    g.hydro_mw,
                    g.wind_mw,
                    g.solar_mw,
                    g.other_mw,
                    obs.weather.temperature_c,
                    obs.weather.wind_speed_ms,
                    obs.weather.cloud_cover_pct,
                    obs.reserves.operating_reserve_mw,
                    obs.reserves.available_capacity_mw,
                    received_at,
                ])?;
            }
        }
        tx.commit().context("Failed to commit observations")?;

        debug!(
            received = observations.len(),
            inserted, "Appended market observations"
        );
        Ok(inserted)
    }

    /// Insert or update hourly values of an exogenous series
    pub fn upsert_exogenous(&self, name: &str, values: &[(DateTime<Utc>, f64)]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO exogenous_series (name, hour, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name, hour) DO UPDATE SET value = excluded.value",
            )?;
            for (ts, value) in values {
                written += stmt.execute(params![name, truncate_to_hour(*ts).timestamp(), value])?;
            }
        }
        tx.commit()
            .with_context(|| format!("Failed to commit exogenous series {name}"))?;
        Ok(written)
    }

    /// Store issued weather forecasts; re-issuing the same forecast is a no-op
    pub fn append_weather_forecasts(&self, forecasts: &[WeatherForecast]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO weather_forecasts
                    (location, target_timestamp, issued_at, temperature_c, wind_speed_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(location, target_timestamp, issued_at) DO NOTHING",
            )?;
            for f in forecasts {
                inserted += stmt.execute(params![
                    f.location,
                    truncate_to_hour(f.target_timestamp).timestamp(),
                    f.issued_at.timestamp(),
                    f.temperature_c,
                    f.wind_speed_ms,
                ])?;
            }
        }
        tx.commit().context("Failed to commit weather forecasts")?;
        Ok(inserted)
    }
}

impl ObservationSource for SqliteStore {
    fn observations_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawObservation>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp, price, demand_mw,
                    gas_mw, coal_mw, hydro_mw, wind_mw, solar_mw, other_mw,
                    temperature_c, wind_speed_ms, cloud_cover_pct,
                    operating_reserve_mw, available_capacity_mw
             FROM observations
             WHERE timestamp >= ?1 AND timestamp <= ?2
             ORDER BY timestamp ASC",
        )?;

        let observations = stmt
            .query_map(params![start.timestamp(), end.timestamp()], |row| {
                Ok(RawObservation {
                    timestamp: to_utc(0, row.get(0)?)?,
                    price: row.get(1)?,
                    demand_mw: row.get(2)?,
                    generation: GenerationMix {
                        gas_mw: row.get(3)?,
                        coal_mw: row.get(4)?,
                        hydro_mw: row.get(5)?,
                        wind_mw: row.get(6)?,
                        solar_mw: row.get(7)?,
                        other_mw: row.get(8)?,
                    },
                    weather: Weather {
                        temperature_c: row.get(9)?,
                        wind_speed_ms: row.get(10)?,
                        cloud_cover_pct: row.get(11)?,
                    },
                    reserves: Reserves {
                        operating_reserve_mw: row.get(12)?,
                        available_capacity_mw: row.get(13)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(observations)
    }

    fn exogenous_between(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ExogenousSeries> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT hour, value FROM exogenous_series
             WHERE name = ?1 AND hour >= ?2 AND hour <= ?3
             ORDER BY hour ASC",
        )?;

        let mut series = ExogenousSeries::new(name);
        let rows = stmt.query_map(params![name, start.timestamp(), end.timestamp()], |row| {
            Ok((to_utc(0, row.get(0)?)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (hour, value) = row?;
            series.insert(hour, value);
        }
        Ok(series)
    }

    fn weather_forecasts(
        &self,
        location: &str,
        issued_by: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeatherForecast>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT w.location, w.target_timestamp, w.issued_at, w.temperature_c, w.wind_speed_ms
             FROM weather_forecasts w
             WHERE w.location = ?1
               AND w.target_timestamp >= ?2 AND w.target_timestamp <= ?3
               AND w.issued_at = (
                   SELECT MAX(x.issued_at) FROM weather_forecasts x
                   WHERE x.location = w.location
                     AND x.target_timestamp = w.target_timestamp
                     AND x.issued_at <= ?4
               )
             ORDER BY w.target_timestamp ASC",
        )?;

        let forecasts = stmt
            .query_map(
                params![
                    location,
                    start.timestamp(),
                    end.timestamp(),
                    issued_by.timestamp()
                ],
                |row| {
                    Ok(WeatherForecast {
                        location: row.get(0)?,
                        target_timestamp: to_utc(1, row.get(1)?)?,
                        issued_at: to_utc(2, row.get(2)?)?,
                        temperature_c: row.get(3)?,
                        wind_speed_ms: row.get(4)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(forecasts)
    }
}
