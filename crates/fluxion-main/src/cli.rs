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

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fluxion-forecast", version)]
#[command(about = "Short-horizon wholesale electricity price forecasting")]
#[command(
    long_about = "Batch jobs for the FluxION price forecasting pipeline.\n\
    \nEach stage reads the latest committed state of the previous one, so the\n\
    jobs can be scheduled independently and rerun safely after a failure.\n\
    \nExamples:\n  \
    fluxion-forecast run                           # features, predict, validate\n  \
    fluxion-forecast predict --as-of 2025-03-01T12:00:00Z\n  \
    fluxion-forecast publish-params --file bundle.json\n  \
    fluxion-forecast accuracy --days 14"
)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recompute feature records for new and late observations
    Features(AsOfArgs),

    /// Produce one forecast batch for the current hour
    Predict(AsOfArgs),

    /// Score due predictions against actual prices
    Validate(AsOfArgs),

    /// Run features, predict and validate in order
    Run(AsOfArgs),

    /// Print per-horizon accuracy for recent predictions
    Accuracy {
        /// Look-back period in days
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// Publish a model parameter bundle produced by offline training
    #[command(
        long_about = "Validate a JSON parameter bundle and publish it as the latest version.\n\
        \nPublished versions are immutable; retraining must use a new version string."
    )]
    PublishParams {
        /// JSON bundle to publish
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug, Clone, Copy)]
pub struct AsOfArgs {
    /// Evaluation time (RFC 3339), defaults to now
    #[arg(long)]
    pub as_of: Option<DateTime<Utc>>,
}

impl AsOfArgs {
    #[must_use]
    pub fn resolve(self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }
}
