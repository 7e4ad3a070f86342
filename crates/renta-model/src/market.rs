//! City-level market-demand model
//!
//! The cold-start substitute: instead of a property's bookings, this model
//! learns the city's `market_occupancy_estimate` (a 0-100 percentage) from
//! the market-wide signals the pipeline writes. Predictions are clipped to
//! [0, 100] and feed the base-price adjustment on the recommendation path.

use std::collections::BTreeSet;

use time::Date;
use tracing::info;

use renta_common::{nonfatal, CityKey, DateRange, ErrorCode, RentaError, Result};
use renta_dataset::{FeatureRow, TrainingFrame};
use renta_ml::{metrics, GradientBoostingRegressor, Matrix};
use renta_store::StateStore;

use crate::artifact::Sidecar;
use crate::config::{ModelConfig, VALIDATION_RATIO};
use crate::demand::TrainingMetrics;
use crate::store::ModelStore;

/// Target column of the market-demand model.
pub const MARKET_TARGET: &str = "market_occupancy_estimate";

/// Signal names never fed to the market regressor.
///
/// Identifier, calendar-key and timestamp columns leak through the
/// pipeline's raw rows; they are excluded by name on top of the numeric
/// coercion filter.
pub const MARKET_EXCLUDED_COLUMNS: &[&str] = &[
    MARKET_TARGET,
    "id",
    "country",
    "city",
    "neighborhood",
    "property_type",
    "date",
    "currency",
    "timezone",
    "calculated_at",
    "created_at",
    "updated_at",
    "data_sources",
    "event_categories",
    "holiday_name",
    "holiday_type",
];

/// Neutral score used when a date cannot be predicted.
const NEUTRAL_SCORE: f64 = 50.0;

/// Build the market training frame for a city and window.
///
/// Columns are the union of numeric signal names across the window minus
/// the exclusion list, in sorted order, plus the target. Rows without a
/// target value are dropped by the trainer, not here.
pub fn build_market_frame(
    store: &dyn StateStore,
    key: &CityKey,
    range: DateRange,
) -> Result<TrainingFrame> {
    let rows = store.market_features(key, range)?;

    let mut signal_names: BTreeSet<String> = BTreeSet::new();
    let numeric_rows: Vec<(Date, Option<f64>, std::collections::BTreeMap<String, f64>)> = rows
        .iter()
        .map(|row| {
            let signals = row.numeric_signals();
            (row.date, row.market_occupancy_estimate, signals)
        })
        .collect();

    for (_, _, signals) in &numeric_rows {
        for name in signals.keys() {
            if !MARKET_EXCLUDED_COLUMNS.contains(&name.as_str()) {
                signal_names.insert(name.clone());
            }
        }
    }

    let mut columns: Vec<String> = signal_names.into_iter().collect();
    columns.push(MARKET_TARGET.to_string());

    let mut frame = TrainingFrame::new(columns.clone());
    for (date, target, signals) in numeric_rows {
        let values: Vec<Option<f64>> = columns
            .iter()
            .map(|c| {
                if c == MARKET_TARGET {
                    target
                } else {
                    signals.get(c).copied()
                }
            })
            .collect();
        frame.push_row(date, values)?;
    }

    Ok(frame)
}

/// Trains market-demand models for one city.
pub struct MarketModelTrainer {
    key: CityKey,
    config: ModelConfig,
    model: Option<GradientBoostingRegressor>,
    feature_columns: Vec<String>,
    metrics: Option<TrainingMetrics>,
}

impl MarketModelTrainer {
    /// Create a trainer for the city, with optional config override
    pub fn new(key: CityKey, config: Option<ModelConfig>) -> Self {
        Self {
            key,
            config: config.unwrap_or_default(),
            model: None,
            feature_columns: Vec::new(),
            metrics: None,
        }
    }

    /// Fit on a market frame; same temporal split protocol as the demand
    /// model, target clipped semantics left to prediction time.
    pub fn fit(&mut self, frame: &TrainingFrame) -> Result<TrainingMetrics> {
        let clean = frame.drop_null_target(MARKET_TARGET)?;
        if clean.is_empty() {
            return Err(RentaError::empty_dataset(format!(
                "no market rows with occupancy for {}",
                self.key
            )));
        }

        let (train, val) = clean.split_temporal(VALIDATION_RATIO);
        if train.is_empty() || val.is_empty() {
            return Err(RentaError::empty_dataset(format!(
                "{} market rows cannot produce a temporal split",
                clean.len()
            )));
        }

        self.feature_columns = clean.feature_columns(MARKET_EXCLUDED_COLUMNS);

        let x_train = train.to_matrix(&self.feature_columns);
        let y_train = train.column_vector(MARKET_TARGET);
        let x_val = val.to_matrix(&self.feature_columns);
        let y_val = val.column_vector(MARKET_TARGET);

        let mut model = GradientBoostingRegressor::new(self.config.boosting_params());
        model
            .fit(&x_train, &Matrix::column(&y_train))
            .map_err(|e| RentaError::new(ErrorCode::Internal, e.to_string()))?;

        let train_pred = model.predict(&x_train);
        let val_pred = model.predict(&x_val);

        let metrics = TrainingMetrics {
            train_rmse: metrics::rmse(&y_train, train_pred.data()),
            val_rmse: metrics::rmse(&y_val, val_pred.data()),
            train_mae: metrics::mae(&y_train, train_pred.data()),
            val_mae: metrics::mae(&y_val, val_pred.data()),
            n_train: train.len(),
            n_val: val.len(),
        };

        self.model = Some(model);
        self.metrics = Some(metrics);

        info!(
            city = %self.key,
            train_rmse = metrics.train_rmse,
            val_rmse = metrics.val_rmse,
            "market-demand model trained"
        );

        Ok(metrics)
    }

    /// Persist the fitted model through the store.
    pub fn save(&self, models: &ModelStore) -> Result<Sidecar> {
        let model = self.model.as_ref().ok_or_else(|| {
            RentaError::new(ErrorCode::Internal, "no fitted market model to save")
        })?;
        let stem = ModelStore::market_stem(&self.key);
        let sidecar =
            Sidecar::for_market(&self.key, self.feature_columns.clone(), self.config.clone());
        models.save(&stem, model, sidecar)
    }

    /// Metrics from the last fit, if any
    pub fn metrics(&self) -> Option<TrainingMetrics> {
        self.metrics
    }
}

/// Loaded market-demand model ready for scoring.
pub struct MarketPredictor {
    key: CityKey,
    model: GradientBoostingRegressor,
    feature_columns: Vec<String>,
}

impl MarketPredictor {
    /// Load the live market model for a city.
    pub fn load(models: &ModelStore, key: &CityKey) -> Result<Self> {
        let stem = ModelStore::market_stem(key);
        let (model, sidecar) = models.load(&stem).map_err(|e| {
            if e.code == ErrorCode::ModelNotFound {
                RentaError::model_not_found(key)
            } else {
                e
            }
        })?;
        Ok(Self {
            key: key.clone(),
            model,
            feature_columns: sidecar.feature_columns,
        })
    }

    /// Predict the market score for one observation, clipped to [0, 100].
    pub fn predict_row(&self, row: &FeatureRow) -> f64 {
        let vector = row.to_vector(&self.feature_columns);
        f64::from(self.model.predict_row(&vector)).clamp(0.0, 100.0)
    }

    /// Predict the market score for a date by loading its feature row.
    pub fn predict_score(&self, store: &dyn StateStore, date: Date) -> Result<f64> {
        let row = store
            .market_features_on(&self.key, date)?
            .ok_or_else(|| {
                RentaError::new(
                    ErrorCode::FeatureRowNotFound,
                    format!("no market features for {} on {}", self.key, date),
                )
            })?;

        let features: FeatureRow = row.numeric_signals().into_iter().collect();
        Ok(self.predict_row(&features))
    }

    /// Scores for the next `days` days starting at `start`.
    ///
    /// Dates without usable features default to the neutral score (50)
    /// instead of failing the whole map.
    pub fn scores_ahead(
        &self,
        store: &dyn StateStore,
        start: Date,
        days: u16,
    ) -> std::collections::BTreeMap<Date, f64> {
        let mut scores = std::collections::BTreeMap::new();
        for i in 0..days {
            let date = start + time::Duration::days(i as i64);
            let score = match self.predict_score(store, date) {
                Ok(s) => s,
                Err(err) => {
                    nonfatal::observe("market_score", &format!("{} {}", self.key, date), &err);
                    NEUTRAL_SCORE
                }
            };
            scores.insert(date, score);
        }
        scores
    }
}

/// Build the market dataset, train, and persist in one call.
pub fn train_market_model(
    store: &dyn StateStore,
    models: &ModelStore,
    key: &CityKey,
    range: DateRange,
    config: Option<ModelConfig>,
) -> Result<TrainingMetrics> {
    let frame = build_market_frame(store, key, range)?;
    if frame.is_empty() {
        return Err(RentaError::empty_dataset(format!(
            "no market_features rows for {} in {} -> {}",
            key, range.start, range.end
        )));
    }

    let mut trainer = MarketModelTrainer::new(key.clone(), config);
    let metrics = trainer.fit(&frame)?;
    trainer.save(models)?;
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use renta_store::{MarketFeatureRow, MemoryStore};
    use serde_json::json;
    use time::macros::date;
    use time::Duration;

    fn seed_market(store: &MemoryStore, days: i64) {
        let start = date!(2025 - 01 - 01);
        for i in 0..days {
            let occupancy = 40.0 + 30.0 * (((i % 7) as f64) / 6.0);
            store.add_market_feature(MarketFeatureRow {
                country: "France".into(),
                city: "Paris".into(),
                date: start + Duration::days(i),
                market_occupancy_estimate: Some(occupancy),
                signals: serde_json::from_value(json!({
                    "competitor_avg_price": 100.0 + (i % 7) as f64 * 5.0,
                    "weather_score": 0.5,
                    "event_intensity": (i % 7) as f64,
                    "holiday_name": "none",
                    "timezone": "Europe/Paris"
                }))
                .unwrap(),
            });
        }
    }

    fn quick_config() -> ModelConfig {
        ModelConfig::new().with_n_estimators(20).with_max_depth(3)
    }

    #[test]
    fn test_market_frame_excludes_keys() {
        let store = MemoryStore::new();
        seed_market(&store, 10);
        let key = CityKey::new("France", "Paris");
        let range = DateRange::new(date!(2025 - 01 - 01), date!(2025 - 01 - 10)).unwrap();

        let frame = build_market_frame(&store, &key, range).unwrap();
        assert_eq!(frame.len(), 10);
        assert!(frame.column_index("competitor_avg_price").is_some());
        assert!(frame.column_index("event_intensity").is_some());
        assert!(frame.column_index(MARKET_TARGET).is_some());
        // Excluded-by-name and non-numeric signals never become columns
        assert!(frame.column_index("timezone").is_none());
        assert!(frame.column_index("holiday_name").is_none());
    }

    #[test]
    fn test_train_predict_clipped() {
        let dir = tempfile::tempdir().unwrap();
        let models = ModelStore::new(dir.path()).unwrap();
        let store = MemoryStore::new();
        seed_market(&store, 60);
        let key = CityKey::new("France", "Paris");
        let range = DateRange::new(date!(2025 - 01 - 01), date!(2025 - 03 - 01)).unwrap();

        let metrics =
            train_market_model(&store, &models, &key, range, Some(quick_config())).unwrap();
        assert!(metrics.val_rmse.is_finite());

        let predictor = MarketPredictor::load(&models, &key).unwrap();
        let score = predictor
            .predict_score(&store, date!(2025 - 01 - 15))
            .unwrap();
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn test_missing_feature_row_errors_and_defaults_in_map() {
        let dir = tempfile::tempdir().unwrap();
        let models = ModelStore::new(dir.path()).unwrap();
        let store = MemoryStore::new();
        seed_market(&store, 30);
        let key = CityKey::new("France", "Paris");
        let range = DateRange::new(date!(2025 - 01 - 01), date!(2025 - 01 - 30)).unwrap();
        train_market_model(&store, &models, &key, range, Some(quick_config())).unwrap();

        let predictor = MarketPredictor::load(&models, &key).unwrap();

        // Point lookup on a date without features surfaces the error
        let err = predictor
            .predict_score(&store, date!(2026 - 01 - 01))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FeatureRowNotFound);

        // The 30-day map swallows it into the neutral score
        let scores = predictor.scores_ahead(&store, date!(2025 - 01 - 28), 30);
        assert_eq!(scores.len(), 30);
        assert_eq!(scores[&date!(2025 - 02 - 15)], 50.0);
    }

    #[test]
    fn test_train_fails_without_rows() {
        let dir = tempfile::tempdir().unwrap();
        let models = ModelStore::new(dir.path()).unwrap();
        let store = MemoryStore::new();
        let key = CityKey::new("France", "Nowhere");
        let range = DateRange::new(date!(2025 - 01 - 01), date!(2025 - 01 - 30)).unwrap();

        let err = train_market_model(&store, &models, &key, range, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyDataset);
    }
}
