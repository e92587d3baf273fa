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
use fluxion_forecast::PredictionStore;
use fluxion_types::{AccuracyRecord, Prediction, Regime, StoredPrediction};
use rusqlite::types::Type;
use rusqlite::{Row, params};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{SqliteStore, to_utc};

const PREDICTION_COLUMNS: &str = "p.id, p.prediction_timestamp, p.target_timestamp, p.horizon_hours,
    p.predicted_price, p.confidence_lower, p.confidence_upper, p.confidence_score,
    p.regime, p.model_version, p.features_used";

fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<StoredPrediction> {
    let regime: String = row.get(8)?;
    let regime: Regime = regime
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
    let features_json: String = row.get(10)?;
    let features_used: BTreeMap<String, f64> = serde_json::from_str(&features_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    Ok(StoredPrediction {
        id: row.get(0)?,
        prediction: Prediction {
            prediction_timestamp: to_utc(1, row.get(1)?)?,
            target_timestamp: to_utc(2, row.get(2)?)?,
            horizon_hours: row.get(3)?,
            predicted_price: row.get(4)?,
            confidence_lower: row.get(5)?,
            confidence_upper: row.get(6)?,
            confidence_score: row.get(7)?,
            regime,
            model_version: row.get(9)?,
            features_used,
        },
    })
}

/// Accuracy columns start right after the prediction columns
const ACCURACY_OFFSET: usize = 11;

fn accuracy_from_row(row: &Row<'_>) -> rusqlite::Result<AccuracyRecord> {
    let o = ACCURACY_OFFSET;
    Ok(AccuracyRecord {
        prediction_id: row.get(o)?,
        actual_timestamp: to_utc(o + 1, row.get(o + 1)?)?,
        actual_price: row.get(o + 2)?,
        absolute_error: row.get(o + 3)?,
        percent_error: row.get(o + 4)?,
        within_confidence: row.get(o + 5)?,
        validated_at: to_utc(o + 6, row.get(o + 6)?)?,
    })
}

impl SqliteStore {
    fn query_predictions(
        &self,
        filter: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<StoredPrediction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions p WHERE {filter}
             ORDER BY p.target_timestamp ASC, p.horizon_hours ASC, p.id ASC"
        ))?;
        let predictions = stmt
            .query_map(args, prediction_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(predictions)
    }
}

impl PredictionStore for SqliteStore {
    fn has_batch(&self, prediction_timestamp: DateTime<Utc>, model_version: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let exists = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM predictions
                WHERE prediction_timestamp = ?1 AND model_version = ?2
             )",
            params![prediction_timestamp.timestamp(), model_version],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_prediction_batch(&self, predictions: &[Prediction]) -> Result<Vec<i64>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let created_at = Utc::now().timestamp();
        let mut ids = Vec::with_capacity(predictions.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO predictions (
                    prediction_timestamp, target_timestamp, horizon_hours,
                    predicted_price, confidence_lower, confidence_upper, confidence_score,
                    regime, model_version, features_used, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for p in predictions {
                let features_used = serde_json::to_string(&p.features_used)
                    .context("Failed to serialize features_used")?;
                stmt.execute(params![
                    p.prediction_timestamp.timestamp(),
                    p.target_timestamp.timestamp(),
                    p.horizon_hours,
                    p.predicted_price,
                    p.confidence_lower,
                    p.confidence_upper,
                    p.confidence_score,
                    p.regime.as_str(),
                    p.model_version,
                    features_used,
                    created_at,
                ])
                .with_context(|| {
                    format!(
                        "Failed to insert {}h prediction for {}",
                        p.horizon_hours, p.prediction_timestamp
                    )
                })?;
                ids.push(tx.last_insert_rowid());
            }
        }
        // Dropping the transaction on any error above rolls back the whole batch
        tx.commit().context("Failed to commit prediction batch")?;

        debug!(count = ids.len(), "Persisted prediction batch");
        Ok(ids)
    }

    fn predictions_made_at(
        &self,
        prediction_timestamp: DateTime<Utc>,
    ) -> Result<Vec<StoredPrediction>> {
        self.query_predictions(
            "p.prediction_timestamp = ?1",
            params![prediction_timestamp.timestamp()],
        )
    }

    fn pending_validations(&self, due_by: DateTime<Utc>) -> Result<Vec<StoredPrediction>> {
        self.query_predictions(
            "p.status = 'pending' AND p.target_timestamp <= ?1",
            params![due_by.timestamp()],
        )
    }

    fn record_accuracy(&self, record: &AccuracyRecord) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO accuracy_records (
                prediction_id, actual_timestamp, actual_price, absolute_error,
                percent_error, within_confidence, validated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(prediction_id) DO NOTHING",
            params![
                record.prediction_id,
                record.actual_timestamp.timestamp(),
                record.actual_price,
                record.absolute_error,
                record.percent_error,
                record.within_confidence,
                record.validated_at.timestamp(),
            ],
        )? == 1;

        if inserted {
            tx.execute(
                "UPDATE predictions SET status = 'validated' WHERE id = ?1",
                params![record.prediction_id],
            )?;
        }
        tx.commit().context("Failed to commit accuracy record")?;
        Ok(inserted)
    }

    fn mark_expired(&self, prediction_ids: &[i64]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE predictions SET status = 'expired' WHERE id = ?1 AND status = 'pending'",
            )?;
            for id in prediction_ids {
                updated += stmt.execute(params![id])?;
            }
        }
        tx.commit().context("Failed to commit expired predictions")?;
        Ok(updated)
    }

    fn accuracy_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(StoredPrediction, AccuracyRecord)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PREDICTION_COLUMNS},
                    a.prediction_id, a.actual_timestamp, a.actual_price, a.absolute_error,
                    a.percent_error, a.within_confidence, a.validated_at
             FROM predictions p
             JOIN accuracy_records a ON a.prediction_id = p.id
             WHERE p.target_timestamp >= ?1 AND p.target_timestamp <= ?2
             ORDER BY p.target_timestamp ASC, p.horizon_hours ASC"
        ))?;
        let scored = stmt
            .query_map(params![start.timestamp(), end.timestamp()], |row| {
                Ok((prediction_from_row(row)?, accuracy_from_row(row)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(scored)
    }
}
