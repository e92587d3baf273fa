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
use fluxion_forecast::ParameterSource;
use fluxion_types::ModelParameters;
use rusqlite::{OptionalExtension, params};
use tracing::info;

use crate::SqliteStore;

impl SqliteStore {
    /// Publish a parameter bundle produced by offline training.
    ///
    /// Bundles are validated first and are immutable: republishing an
    /// existing version is an error.
    pub fn publish_parameters(&self, bundle: &ModelParameters) -> Result<()> {
        fluxion_forecast::params::validate(bundle)
            .with_context(|| format!("Refusing to publish parameters {}", bundle.version))?;
        let json = serde_json::to_string(bundle).context("Failed to serialize parameters")?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO model_parameters (version, published_at, bundle) VALUES (?1, ?2, ?3)",
            params![bundle.version, bundle.published_at.timestamp(), json],
        )
        .with_context(|| format!("Parameter version {} is already published", bundle.version))?;

        info!(version = %bundle.version, "Published model parameters");
        Ok(())
    }
}

impl ParameterSource for SqliteStore {
    fn latest_parameters(&self) -> Result<Option<ModelParameters>> {
        let conn = self.conn.lock();
        let bundle: Option<String> = conn
            .query_row(
                "SELECT bundle FROM model_parameters
                 ORDER BY published_at DESC, rowid DESC
                 LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        bundle
            .map(|json| {
                serde_json::from_str(&json).context("Failed to parse stored model parameters")
            })
            .transpose()
    }
}
