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

//! Shared record types for the FluxION price forecasting pipeline.
//!
//! These are the shapes exchanged between the feature engine, the ensemble
//! engine, the validation tracker and the SQLite store. They carry no
//! behaviour beyond small derived helpers.

pub mod features;
pub mod forecast;
pub mod market;
pub mod params;
pub mod regime;

pub use features::FeatureRecord;
pub use forecast::{AccuracyRecord, AccuracySummary, Prediction, StoredPrediction};
pub use market::{
    ExogenousSeries, GenerationMix, RawObservation, Reserves, Weather, WeatherForecast,
    truncate_to_hour,
};
pub use params::{FeatureStatistics, ModelParameters, RegimeThresholds};
pub use regime::{Horizon, Regime, UnknownRegime, UnsupportedHorizon};
