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

mod cli;
mod config;
mod pipeline;

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use clap::Parser;
use fluxion_forecast::PredictionRun;
use fluxion_store::SqliteStore;
use fluxion_types::ModelParameters;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, ConfigSource};
use crate::pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, source) = AppConfig::load(&cli.config)?;

    // RUST_LOG wins over the configured level
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    match source {
        ConfigSource::File => info!("✅ Loaded configuration from {}", cli.config.display()),
        ConfigSource::Defaults => warn!(
            "No configuration file at {}, using defaults with environment overrides",
            cli.config.display()
        ),
    }
    info!("   Database: {}", config.database.path);
    info!("   Market timezone: {}", config.market.timezone);
    info!("   Horizons: {:?}", config.market.horizons);

    let store = Arc::new(SqliteStore::open(&config.database.path)?);

    match cli.command {
        Commands::PublishParams { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read parameter bundle: {}", file.display()))?;
            let bundle: ModelParameters =
                serde_json::from_str(&content).context("Failed to parse parameter bundle")?;
            store.publish_parameters(&bundle)?;
        }
        Commands::Features(args) => {
            let pipeline = Pipeline::new(&config, &store)?;
            pipeline.update_features(args.resolve())?;
        }
        Commands::Predict(args) => {
            let pipeline = Pipeline::new(&config, &store)?;
            report_prediction(&pipeline.predict(args.resolve()).await?);
        }
        Commands::Validate(args) => {
            let pipeline = Pipeline::new(&config, &store)?;
            pipeline.validate(args.resolve())?;
        }
        Commands::Run(args) => {
            let pipeline = Pipeline::new(&config, &store)?;
            let as_of = args.resolve();
            pipeline.update_features(as_of)?;

            // Validation does not depend on this hour's forecast
            let predicted = pipeline.predict(as_of).await;
            pipeline.validate(as_of)?;

            match predicted {
                Ok(run) => report_prediction(&run),
                Err(e) => {
                    error!("❌ {e:#}");
                    return Err(e);
                }
            }
        }
        Commands::Accuracy { days } => {
            let pipeline = Pipeline::new(&config, &store)?;
            let end = Utc::now();
            let start = end - TimeDelta::days(i64::from(days));
            let summaries = pipeline.accuracy(start, end)?;

            if summaries.is_empty() {
                println!("No validated predictions in the last {days} days");
            } else {
                println!(
                    "{:>8} {:>7} {:>9} {:>9} {:>9} {:>9}",
                    "horizon", "count", "MAE", "RMSE", "MAPE %", "coverage"
                );
                for s in summaries {
                    let mape = s
                        .mean_absolute_percent_error
                        .map_or_else(|| "n/a".to_owned(), |m| format!("{m:.2}"));
                    println!(
                        "{:>7}h {:>7} {:>9.2} {:>9.2} {:>9} {:>8.1}%",
                        s.horizon_hours,
                        s.count,
                        s.mean_absolute_error,
                        s.root_mean_squared_error,
                        mape,
                        s.coverage * 100.0
                    );
                }
            }
        }
    }

    Ok(())
}

fn report_prediction(run: &PredictionRun) {
    match run {
        PredictionRun::Persisted {
            prediction_timestamp,
            model_version,
            ids,
        } => info!(
            "✅ Stored {} forecasts for {prediction_timestamp} (model {model_version})",
            ids.len()
        ),
        PredictionRun::AlreadyPresent {
            prediction_timestamp,
            model_version,
        } => info!("Forecasts for {prediction_timestamp} (model {model_version}) already exist"),
    }
}
