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

//! FluxION price forecasting core.
//!
//! Turns hourly wholesale market observations into regime-aware price
//! forecasts and scores them once actual prices arrive:
//!
//! - [`features`]: lags, rolling windows, momentum and interactions
//! - [`regime`]: deterministic market regime labelling
//! - [`ensemble`]: estimator registry, weighting and confidence bands
//! - [`validation`]: matching predictions to actuals and accuracy metrics
//! - [`jobs`]: batch jobs wiring the stages through the [`store`] traits

pub mod config;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod jobs;
pub mod params;
pub mod regime;
pub mod store;
pub mod validation;

pub use config::{EnsembleConfig, FeatureConfig, ValidationConfig};
pub use ensemble::{EnsembleEngine, EstimatorRegistry, PredictionContext, PriceEstimator};
pub use error::{ForecastError, Result};
pub use features::FeatureEngine;
pub use jobs::{
    FeatureJob, FeatureRunReport, PredictionJob, PredictionRun, ValidationJob, ValidationReport,
};
pub use regime::{RegimeSignals, classify};
pub use store::{FeatureStore, ObservationSource, ParameterSource, PredictionStore};
pub use validation::{ValidationOutcome, ValidationTracker};
