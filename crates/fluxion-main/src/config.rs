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

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use fluxion_forecast::{EnsembleConfig, FeatureConfig, ValidationConfig};
use fluxion_types::Horizon;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub market: MarketSettings,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketSettings {
    /// IANA zone used for calendar features
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Location key of the weather-forecast feed; unset disables forecast weather
    #[serde(default)]
    pub weather_location: Option<String>,

    #[serde(default = "default_horizons")]
    pub horizons: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Fallback filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_db_path() -> String {
    "./data/fluxion-forecast.db".to_owned()
}

fn default_timezone() -> String {
    "America/Edmonton".to_owned()
}

fn default_horizons() -> Vec<u32> {
    Horizon::SUPPORTED_HOURS.to_vec()
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            weather_location: None,
            horizons: default_horizons(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Defaults,
}

impl AppConfig {
    /// Load `path` if it exists, otherwise defaults; environment overrides apply to both
    pub fn load(path: &Path) -> Result<(Self, ConfigSource)> {
        let (mut config, source) = if path.exists() {
            (Self::from_file(path)?, ConfigSource::File)
        } else {
            (Self::default(), ConfigSource::Defaults)
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok((config, source))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config TOML")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(db_path) = std::env::var("FLUXION_DB_PATH") {
            self.database.path = db_path;
        }
        if let Ok(timezone) = std::env::var("FLUXION_MARKET_TIMEZONE") {
            self.market.timezone = timezone;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            bail!("database.path must be set");
        }
        self.timezone()?;
        if self.market.horizons.is_empty() {
            bail!("market.horizons must contain at least one horizon");
        }
        self.horizons()?;
        if self.ensemble.history_window_hours == 0 {
            bail!("ensemble.history_window_hours must be positive");
        }
        if self.ensemble.min_history_records > self.ensemble.history_window_hours as usize {
            bail!(
                "ensemble.min_history_records ({}) exceeds history_window_hours ({})",
                self.ensemble.min_history_records,
                self.ensemble.history_window_hours
            );
        }
        if self.validation.match_window_minutes == 0 {
            bail!("validation.match_window_minutes must be positive");
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.market
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("market.timezone '{}' is invalid: {e}", self.market.timezone))
    }

    pub fn horizons(&self) -> Result<Vec<Horizon>> {
        self.market
            .horizons
            .iter()
            .map(|h| {
                Horizon::try_from(*h).with_context(|| format!("market.horizons contains {h}"))
            })
            .collect()
    }
}
