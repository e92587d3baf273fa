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

//! Regime-aware ensemble prediction engine.

mod estimators;
mod target;

pub use estimators::{
    DecompositionEstimator, EstimatorRegistry, LagEstimator, PriceEstimator, RegimeEstimator,
    VolatilityEstimator,
};
pub use target::{HistoryWindow, TargetFeatures};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use fluxion_types::{FeatureRecord, Horizon, ModelParameters, Prediction};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::EnsembleConfig;
use crate::error::{ForecastError, Result};
use crate::features::FeatureEngine;
use crate::params;
use crate::regime::classify;

/// Confidence score for a horizon: `max(0.5, 1 - horizon / 48)`
#[must_use]
pub fn confidence_score(horizon: Horizon) -> f64 {
    (1.0 - f64::from(horizon.hours()) / 48.0).max(0.5)
}

/// Half-width of the confidence band: `residual_std_dev * (1 + horizon / 24 * k)`
#[must_use]
pub fn band_half_width(params: &ModelParameters, horizon: Horizon) -> f64 {
    params.residual_std_dev * (1.0 + f64::from(horizon.hours()) / 24.0 * params.confidence_widening)
}

/// Immutable inputs shared by every horizon of one invocation
#[derive(Debug, Clone)]
pub struct PredictionContext {
    pub prediction_timestamp: DateTime<Utc>,
    pub params: Arc<ModelParameters>,
    pub history: Arc<HistoryWindow>,
    /// Forecast temperature keyed by target hour
    pub forecast_temperature: BTreeMap<DateTime<Utc>, f64>,
}

#[derive(Debug)]
pub struct EnsembleEngine {
    registry: EstimatorRegistry,
    feature_engine: FeatureEngine,
    config: EnsembleConfig,
}

impl EnsembleEngine {
    #[must_use]
    pub fn new(timezone: Tz, config: EnsembleConfig) -> Self {
        Self::with_registry(timezone, config, EstimatorRegistry::standard())
    }

    #[must_use]
    pub fn with_registry(timezone: Tz, config: EnsembleConfig, registry: EstimatorRegistry) -> Self {
        Self {
            registry,
            feature_engine: FeatureEngine::new(timezone),
            config,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &EstimatorRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Validate inputs and pin them for one invocation.
    ///
    /// Fails with `Configuration` when no usable parameters are given and
    /// with `InsufficientHistory` when the window is empty, short or stale.
    pub fn prepare(
        &self,
        prediction_timestamp: DateTime<Utc>,
        params: Option<Arc<ModelParameters>>,
        history: Vec<FeatureRecord>,
        forecast_temperature: BTreeMap<DateTime<Utc>, f64>,
    ) -> Result<PredictionContext> {
        let params = params.ok_or_else(|| {
            ForecastError::Configuration("no published model parameters".to_owned())
        })?;
        params::validate(&params)?;
        self.check_weight_names(&params)?;

        let window_start = prediction_timestamp - self.config.history_window();
        let history = HistoryWindow::new(
            history
                .into_iter()
                .filter(|r| r.timestamp > window_start && r.timestamp <= prediction_timestamp)
                .collect(),
        );

        let Some(latest) = history.latest() else {
            return Err(ForecastError::InsufficientHistory(format!(
                "no feature records in the {}h before {prediction_timestamp}",
                self.config.history_window_hours
            )));
        };
        if history.len() < self.config.min_history_records {
            return Err(ForecastError::InsufficientHistory(format!(
                "{} records available, at least {} required",
                history.len(),
                self.config.min_history_records
            )));
        }
        if latest.timestamp < prediction_timestamp - self.config.max_history_staleness() {
            return Err(ForecastError::InsufficientHistory(format!(
                "latest feature record {} is older than {}h",
                latest.timestamp, self.config.max_history_staleness_hours
            )));
        }

        Ok(PredictionContext {
            prediction_timestamp,
            params,
            history: Arc::new(history),
            forecast_temperature,
        })
    }

    fn check_weight_names(&self, params: &ModelParameters) -> Result<()> {
        let vectors = std::iter::once(&params.default_weights).chain(params.ensemble_weights.values());
        for weights in vectors {
            if let Some(unknown) = weights.keys().find(|name| self.registry.get(name).is_none()) {
                return Err(ForecastError::Configuration(format!(
                    "weight references unknown estimator '{unknown}' (registered: {})",
                    self.registry.names().join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Forecast a single horizon
    pub fn predict_horizon(&self, ctx: &PredictionContext, horizon: Horizon) -> Result<Prediction> {
        let params = ctx.params.as_ref();
        let target_timestamp = ctx.prediction_timestamp + horizon.duration();

        let mut features = TargetFeatures::synthesize(
            &ctx.history,
            ctx.prediction_timestamp,
            horizon,
            self.feature_engine.calendar(target_timestamp),
            ctx.forecast_temperature.get(&target_timestamp).copied(),
        )
        .ok_or_else(|| ForecastError::InsufficientHistory("history window is empty".to_owned()))?;
        features.regime = classify(&features.signals(), &params.regime_thresholds);

        let margin = params.outlier_threshold * params.residual_std_dev;
        let (floor, ceiling) = (features.history_min - margin, features.history_max + margin);

        let mut estimates = BTreeMap::new();
        for estimator in self.registry.iter() {
            let raw = estimator.estimate(&features, params);
            let value = if raw.is_finite() {
                raw
            } else {
                warn!(
                    estimator = estimator.name(),
                    "Estimator returned a non-finite value, using persistence"
                );
                features.last_price
            };
            estimates.insert(estimator.name().to_owned(), value.clamp(floor, ceiling));
        }

        let weights = params.weights_for(features.regime);
        let mut point = 0.0;
        for (name, weight) in weights {
            let estimate = estimates.get(name).ok_or_else(|| {
                ForecastError::Configuration(format!("no estimator registered as '{name}'"))
            })?;
            point += weight * estimate;
        }
        // Weights may sum to 1 only within tolerance
        let point = point.clamp(floor, ceiling);

        let half_width = band_half_width(params, horizon);
        let mut lower = point - half_width;
        if self.config.floor_lower_bound_at_zero {
            lower = lower.max(0.0).min(point);
        }
        let upper = point + half_width;

        let mut features_used: BTreeMap<String, f64> = features
            .present_values()
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value))
            .collect();
        features_used.extend(
            estimates
                .iter()
                .map(|(name, value)| (format!("estimate.{name}"), *value)),
        );

        debug!(
            horizon = horizon.hours(),
            regime = %features.regime,
            price = point,
            "Forecast computed"
        );

        Ok(Prediction {
            prediction_timestamp: ctx.prediction_timestamp,
            target_timestamp,
            horizon_hours: horizon.hours(),
            predicted_price: point,
            confidence_lower: lower,
            confidence_upper: upper,
            confidence_score: confidence_score(horizon),
            regime: features.regime,
            model_version: params.version.clone(),
            features_used,
        })
    }

    /// Forecast every horizon sequentially
    pub fn predict(&self, ctx: &PredictionContext, horizons: &[Horizon]) -> Result<Vec<Prediction>> {
        let horizons: BTreeSet<Horizon> = horizons.iter().copied().collect();
        let predictions = horizons
            .iter()
            .map(|h| self.predict_horizon(ctx, *h))
            .collect::<Result<Vec<_>>>()?;
        ensure_complete(&horizons, &predictions)?;
        Ok(predictions)
    }

    /// Forecast every horizon on the blocking pool, sharing the pinned context
    pub async fn predict_parallel(
        self: &Arc<Self>,
        ctx: Arc<PredictionContext>,
        horizons: &[Horizon],
    ) -> Result<Vec<Prediction>> {
        let horizons: BTreeSet<Horizon> = horizons.iter().copied().collect();

        let mut tasks = JoinSet::new();
        for &horizon in &horizons {
            let engine = Arc::clone(self);
            let ctx = Arc::clone(&ctx);
            tasks.spawn_blocking(move || engine.predict_horizon(&ctx, horizon));
        }

        let mut predictions = Vec::with_capacity(horizons.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => predictions.push(result?),
                Err(e) => warn!("Horizon task failed: {e}"),
            }
        }
        predictions.sort_by_key(|p| p.horizon_hours);

        ensure_complete(&horizons, &predictions)?;
        Ok(predictions)
    }
}

/// Fail unless every requested horizon has exactly one prediction
pub fn ensure_complete(horizons: &BTreeSet<Horizon>, predictions: &[Prediction]) -> Result<()> {
    let missing: Vec<u32> = horizons
        .iter()
        .map(|h| h.hours())
        .filter(|hours| {
            predictions
                .iter()
                .filter(|p| p.horizon_hours == *hours)
                .count()
                != 1
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ForecastError::IncompleteBatch { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::target::tests::{oscillating_history, start};
    use chrono::TimeDelta;
    use fluxion_types::{RawObservation, Regime, RegimeThresholds};

    fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
    }

    fn params() -> ModelParameters {
        let normal = weights(&[
            ("lag", 0.4),
            ("decomposition", 0.3),
            ("volatility", 0.2),
            ("regime", 0.1),
        ]);
        ModelParameters {
            version: "2025.02-a".to_owned(),
            published_at: Utc::now(),
            feature_correlations: BTreeMap::new(),
            feature_statistics: BTreeMap::new(),
            feature_scaling: BTreeMap::new(),
            regime_thresholds: RegimeThresholds::default(),
            ensemble_weights: BTreeMap::from([(Regime::Normal, normal.clone())]),
            default_weights: normal,
            outlier_threshold: 3.0,
            residual_std_dev: 5.0,
            confidence_widening: 0.5,
        }
    }

    fn engine() -> EnsembleEngine {
        EnsembleEngine::new(chrono_tz::UTC, EnsembleConfig::default())
    }

    fn context(engine: &EnsembleEngine, params: ModelParameters) -> PredictionContext {
        let history = oscillating_history(336);
        let prediction_ts = history.last().unwrap().timestamp;
        engine
            .prepare(prediction_ts, Some(Arc::new(params)), history, BTreeMap::new())
            .unwrap()
    }

    #[test]
    fn missing_parameters_is_configuration_error() {
        let history = oscillating_history(48);
        let ts = history.last().unwrap().timestamp;
        let err = engine().prepare(ts, None, history, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ForecastError::Configuration(_)));
    }

    #[test]
    fn unknown_estimator_weight_is_configuration_error() {
        let mut p = params();
        p.default_weights = weights(&[("lag", 0.5), ("neural", 0.5)]);
        let history = oscillating_history(48);
        let ts = history.last().unwrap().timestamp;
        let err = engine()
            .prepare(ts, Some(Arc::new(p)), history, BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ForecastError::Configuration(msg) if msg.contains("neural")));
    }

    #[test]
    fn empty_short_or_stale_history_is_rejected() {
        let engine = engine();
        let p = Some(Arc::new(params()));

        let err = engine
            .prepare(Utc::now(), p.clone(), Vec::new(), BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientHistory(_)));

        let short = oscillating_history(5);
        let ts = short.last().unwrap().timestamp;
        let err = engine.prepare(ts, p.clone(), short, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientHistory(_)));

        let history = oscillating_history(48);
        let ts = history.last().unwrap().timestamp + TimeDelta::hours(12);
        let err = engine.prepare(ts, p, history, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientHistory(_)));
    }

    #[test]
    fn predictions_respect_band_and_timing_invariants() {
        let engine = engine();
        let ctx = context(&engine, params());
        let predictions = engine.predict(&ctx, &Horizon::ALL).unwrap();

        assert_eq!(predictions.len(), 4);
        for p in &predictions {
            assert!(p.confidence_lower <= p.predicted_price);
            assert!(p.predicted_price <= p.confidence_upper);
            assert_eq!(
                p.target_timestamp,
                p.prediction_timestamp + TimeDelta::hours(i64::from(p.horizon_hours))
            );
            assert_eq!(p.model_version, "2025.02-a");
            assert!(p.features_used.contains_key("estimate.lag"));
        }

        let first = &predictions[0];
        let last = &predictions[3];
        assert!(first.confidence_score > last.confidence_score);
        assert!(last.band_width() >= first.band_width());
    }

    #[test]
    fn point_forecast_stays_within_winsorized_range() {
        let engine = engine();
        let ctx = context(&engine, params());
        let prediction = engine.predict_horizon(&ctx, Horizon::ALL[0]).unwrap();

        assert!(prediction.predicted_price >= 20.0 - 15.0 - 1e-9);
        assert!(prediction.predicted_price <= 80.0 + 15.0 + 1e-9);
        assert!(prediction.confidence_score >= 0.95);
    }

    #[test]
    fn zero_floor_is_a_policy_flag() {
        let mut p = params();
        p.residual_std_dev = 200.0;
        p.outlier_threshold = 0.0;

        let floored = engine();
        let ctx = context(&floored, p.clone());
        let prediction = floored.predict_horizon(&ctx, Horizon::ALL[3]).unwrap();
        assert!(prediction.confidence_lower.abs() < f64::EPSILON);

        let config = EnsembleConfig {
            floor_lower_bound_at_zero: false,
            ..EnsembleConfig::default()
        };
        let unfloored = EnsembleEngine::new(chrono_tz::UTC, config);
        let ctx = context(&unfloored, p);
        let prediction = unfloored.predict_horizon(&ctx, Horizon::ALL[3]).unwrap();
        assert!(prediction.confidence_lower < 0.0);
    }

    #[test]
    fn zero_floor_never_lifts_lower_bound_above_negative_forecast() {
        // Oversupplied market clearing between -180 and -120
        let observations: Vec<RawObservation> = (0..336)
            .map(|h| {
                let phase = (h % 24) as f64 / 24.0 * std::f64::consts::TAU;
                RawObservation::new(start() + TimeDelta::hours(h), -150.0 + 30.0 * phase.sin())
            })
            .collect();
        let history = FeatureEngine::new(chrono_tz::UTC).compute(&observations, None);
        let ts = history.last().unwrap().timestamp;

        let engine = engine();
        assert!(engine.config().floor_lower_bound_at_zero);
        let ctx = engine
            .prepare(ts, Some(Arc::new(params())), history, BTreeMap::new())
            .unwrap();

        for p in engine.predict(&ctx, &Horizon::ALL).unwrap() {
            assert!(p.predicted_price < 0.0, "{}h: {}", p.horizon_hours, p.predicted_price);
            assert_eq!(p.confidence_lower.to_bits(), p.predicted_price.to_bits());
            assert!(p.confidence_upper > p.predicted_price);
        }
    }

    #[test]
    fn confidence_score_and_band_scale_with_horizon() {
        let p = params();
        assert!((confidence_score(Horizon::ALL[0]) - (1.0 - 1.0 / 48.0)).abs() < 1e-12);
        assert!((confidence_score(Horizon::ALL[3]) - 0.5).abs() < 1e-12);
        assert!((band_half_width(&p, Horizon::ALL[3]) - 7.5).abs() < 1e-12);
    }

    #[test]
    fn incomplete_batch_lists_missing_horizons() {
        let horizons: BTreeSet<Horizon> = Horizon::ALL.into_iter().collect();
        let engine = engine();
        let ctx = context(&engine, params());
        let partial = vec![engine.predict_horizon(&ctx, Horizon::ALL[0]).unwrap()];

        let err = ensure_complete(&horizons, &partial).unwrap_err();
        assert!(matches!(err, ForecastError::IncompleteBatch { missing } if missing == vec![6, 12, 24]));
    }

    #[tokio::test]
    async fn parallel_matches_sequential() {
        let engine = Arc::new(engine());
        let ctx = Arc::new(context(&engine, params()));

        let sequential = engine.predict(&ctx, &Horizon::ALL).unwrap();
        let parallel = engine
            .predict_parallel(Arc::clone(&ctx), &Horizon::ALL)
            .await
            .unwrap();
        assert_eq!(sequential, parallel);
    }
}
