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
use fluxion_forecast::{
    EnsembleEngine, FeatureEngine, FeatureJob, FeatureRunReport, PredictionJob, PredictionRun,
    ValidationJob, ValidationReport, ValidationTracker,
};
use fluxion_store::SqliteStore;
use fluxion_types::AccuracySummary;
use std::sync::Arc;

use crate::config::AppConfig;

/// The three stage jobs wired to one SQLite store
#[derive(Debug)]
pub struct Pipeline {
    features: FeatureJob,
    prediction: PredictionJob,
    validation: ValidationJob,
}

impl Pipeline {
    pub fn new(config: &AppConfig, store: &Arc<SqliteStore>) -> Result<Self> {
        let timezone = config.timezone()?;
        let horizons = config.horizons()?;

        let features = FeatureJob::new(
            store.clone(),
            store.clone(),
            FeatureEngine::new(timezone),
            config.features.clone(),
        );

        let engine = Arc::new(EnsembleEngine::new(timezone, config.ensemble.clone()));
        let mut prediction = PredictionJob::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            engine,
            horizons,
        );
        if let Some(location) = &config.market.weather_location {
            prediction = prediction.with_weather_location(location.clone());
        }

        let tracker = ValidationTracker::new(
            config.validation.match_window(),
            config.features.lateness_tolerance(),
        );
        let validation = ValidationJob::new(store.clone(), store.clone(), tracker);

        Ok(Self {
            features,
            prediction,
            validation,
        })
    }

    pub fn update_features(&self, as_of: DateTime<Utc>) -> Result<FeatureRunReport> {
        self.features
            .run(as_of)
            .context("Feature engineering run failed")
    }

    pub async fn predict(&self, as_of: DateTime<Utc>) -> Result<PredictionRun> {
        self.prediction
            .run(as_of)
            .await
            .context("Forecast run failed")
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<ValidationReport> {
        self.validation.run(now).context("Validation run failed")
    }

    pub fn accuracy(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<AccuracySummary>> {
        self.validation
            .summary(start, end)
            .context("Failed to load accuracy records")
    }
}
