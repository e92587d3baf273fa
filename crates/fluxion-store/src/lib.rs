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

//! SQLite persistence for the FluxION forecasting pipeline.
//!
//! One [`SqliteStore`] backs every storage trait of `fluxion-forecast`:
//! raw observations and external feeds, feature records, published model
//! parameters, predictions and accuracy records. Timestamps are stored as
//! INTEGER unix seconds and prices as REAL, so values round-trip exactly.

mod features;
mod observations;
mod parameters;
mod predictions;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        debug!(path = %path.display(), "Opened forecast database");
        Self::with_connection(conn)
    }

    /// Private in-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize forecast schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS observations (
    timestamp             INTEGER PRIMARY KEY,
    price                 REAL NOT NULL,
    demand_mw             REAL,
    gas_mw                REAL,
    coal_mw               REAL,
    hydro_mw              REAL,
    wind_mw               REAL,
    solar_mw              REAL,
    other_mw              REAL,
    temperature_c         REAL,
    wind_speed_ms         REAL,
    cloud_cover_pct       REAL,
    operating_reserve_mw  REAL,
    available_capacity_mw REAL,
    received_at           INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS exogenous_series (
    name   TEXT NOT NULL,
    hour   INTEGER NOT NULL,
    value  REAL NOT NULL,
    PRIMARY KEY (name, hour)
);

CREATE TABLE IF NOT EXISTS weather_forecasts (
    location          TEXT NOT NULL,
    target_timestamp  INTEGER NOT NULL,
    issued_at         INTEGER NOT NULL,
    temperature_c     REAL,
    wind_speed_ms     REAL,
    PRIMARY KEY (location, target_timestamp, issued_at)
);

CREATE TABLE IF NOT EXISTS features (
    timestamp           INTEGER PRIMARY KEY,
    price               REAL NOT NULL,
    demand_mw           REAL,
    hour_of_day         INTEGER NOT NULL,
    day_of_week         INTEGER NOT NULL,
    is_weekend          INTEGER NOT NULL,
    lag_1h              REAL,
    lag_24h             REAL,
    lag_168h            REAL,
    rolling_avg_3h      REAL,
    rolling_avg_6h      REAL,
    rolling_avg_24h     REAL,
    rolling_std_24h     REAL,
    rolling_avg_7d      REAL,
    rolling_std_7d      REAL,
    volatility_6h       REAL,
    demand_avg_24h      REAL,
    momentum_1h         REAL,
    momentum_3h         REAL,
    renewable_share     REAL,
    reserve_margin      REAL,
    temperature_c       REAL,
    fuel_price          REAL,
    demand_temperature  REAL,
    renewable_demand    REAL,
    fuel_demand         REAL,
    computed_at         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS model_parameters (
    version       TEXT PRIMARY KEY,
    published_at  INTEGER NOT NULL,
    bundle        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS predictions (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    prediction_timestamp  INTEGER NOT NULL,
    target_timestamp      INTEGER NOT NULL,
    horizon_hours         INTEGER NOT NULL,
    predicted_price       REAL NOT NULL,
    confidence_lower      REAL NOT NULL,
    confidence_upper      REAL NOT NULL,
    confidence_score      REAL NOT NULL,
    regime                TEXT NOT NULL,
    model_version         TEXT NOT NULL,
    features_used         TEXT NOT NULL,
    status                TEXT NOT NULL DEFAULT 'pending',
    created_at            INTEGER NOT NULL,
    UNIQUE (prediction_timestamp, horizon_hours, model_version)
);

CREATE INDEX IF NOT EXISTS idx_predictions_status_target
    ON predictions(status, target_timestamp);

CREATE TABLE IF NOT EXISTS accuracy_records (
    prediction_id      INTEGER PRIMARY KEY,
    actual_timestamp   INTEGER NOT NULL,
    actual_price       REAL NOT NULL,
    absolute_error     REAL NOT NULL,
    percent_error      REAL,
    within_confidence  INTEGER NOT NULL,
    validated_at       INTEGER NOT NULL,
    FOREIGN KEY (prediction_id) REFERENCES predictions(id)
);
";

/// Convert a stored unix timestamp back into UTC
pub(crate) fn to_utc(column: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(column, secs))
}
