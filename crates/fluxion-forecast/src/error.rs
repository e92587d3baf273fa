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

//! Error types for the forecasting pipeline

use fluxion_types::UnsupportedHorizon;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    /// No usable model parameters were published
    #[error("configuration error: {0}")]
    Configuration(String),

    /// History window empty, too short or stale
    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    /// The batch did not produce every requested horizon
    #[error("incomplete prediction batch, missing horizons {missing:?}")]
    IncompleteBatch { missing: Vec<u32> },

    /// A store read or write failed; the batch must be retried as a whole
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    UnsupportedHorizon(#[from] UnsupportedHorizon),
}

impl ForecastError {
    pub(crate) fn persistence(err: &anyhow::Error) -> Self {
        Self::Persistence(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
