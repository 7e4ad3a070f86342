//! Per-property demand model
//!
//! Trains a gradient-boosted regressor on the pricing training frame with
//! a strictly temporal 80/20 split, persists the artifact plus sidecar
//! through the [`ModelStore`], and serves clipped non-negative demand
//! predictions from the persisted feature order.

use std::collections::BTreeMap;

use serde_json::json;
use time::OffsetDateTime;
use tracing::info;

use renta_common::{nonfatal, DateRange, ErrorCode, PropertyId, RentaError, Result};
use renta_dataset::{DatasetBuilder, FeatureRow, TrainingFrame, TARGET_COLUMN};
use renta_ml::{metrics, GradientBoostingRegressor, Matrix, MlError};
use renta_store::{ModelMetricRow, StateStore, TrainedBy};

use crate::artifact::Sidecar;
use crate::config::{ModelConfig, VALIDATION_RATIO};
use crate::store::ModelStore;

/// Frame columns never fed to the demand regressor.
///
/// `y_demand` is the target and `bookings` is its alias; identifier
/// columns never enter the frame as numeric cells in the first place.
pub const DEMAND_EXCLUDED_COLUMNS: &[&str] = &[TARGET_COLUMN, "bookings"];

/// Metrics produced by one training run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingMetrics {
    /// RMSE on the training split
    pub train_rmse: f64,
    /// RMSE on the validation split
    pub val_rmse: f64,
    /// MAE on the training split
    pub train_mae: f64,
    /// MAE on the validation split
    pub val_mae: f64,
    /// Rows in the training split
    pub n_train: usize,
    /// Rows in the validation split
    pub n_val: usize,
}

/// Trains demand models for one property.
pub struct DemandModelTrainer {
    property_id: PropertyId,
    config: ModelConfig,
    model: Option<GradientBoostingRegressor>,
    feature_columns: Vec<String>,
    metrics: Option<TrainingMetrics>,
    importance: BTreeMap<String, f64>,
    saved_format: Option<crate::ArtifactFormat>,
}

impl DemandModelTrainer {
    /// Create a trainer for the property, with optional config override
    pub fn new(property_id: PropertyId, config: Option<ModelConfig>) -> Self {
        Self {
            property_id,
            config: config.unwrap_or_default(),
            model: None,
            feature_columns: Vec::new(),
            metrics: None,
            importance: BTreeMap::new(),
            saved_format: None,
        }
    }

    /// Fit on a training frame.
    ///
    /// Fails loudly on a missing target column or a frame too small to
    /// produce non-empty train and validation splits. The captured feature
    /// column order is what `save` persists to the sidecar.
    pub fn fit(&mut self, frame: &TrainingFrame) -> Result<TrainingMetrics> {
        let clean = frame.drop_null_target(TARGET_COLUMN)?;
        if clean.is_empty() {
            return Err(RentaError::empty_dataset(format!(
                "no usable rows to train demand model for {}",
                self.property_id
            )));
        }

        let (train, val) = clean.split_temporal(VALIDATION_RATIO);
        if train.is_empty() || val.is_empty() {
            return Err(RentaError::empty_dataset(format!(
                "{} rows cannot produce a temporal train/validation split",
                clean.len()
            )));
        }

        self.feature_columns = clean.feature_columns(DEMAND_EXCLUDED_COLUMNS);

        let x_train = train.to_matrix(&self.feature_columns);
        let y_train = train.column_vector(TARGET_COLUMN);
        let x_val = val.to_matrix(&self.feature_columns);
        let y_val = val.column_vector(TARGET_COLUMN);

        let mut model = GradientBoostingRegressor::new(self.config.boosting_params());
        model
            .fit(&x_train, &Matrix::column(&y_train))
            .map_err(ml_to_renta)?;

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

        self.importance = self
            .feature_columns
            .iter()
            .cloned()
            .zip(model.feature_importance())
            .collect();
        self.model = Some(model);
        self.metrics = Some(metrics);

        info!(
            property_id = %self.property_id,
            train_rmse = metrics.train_rmse,
            val_rmse = metrics.val_rmse,
            n_train = metrics.n_train,
            n_val = metrics.n_val,
            "demand model trained"
        );

        Ok(metrics)
    }

    /// Persist the fitted model through the store.
    pub fn save(&mut self, models: &ModelStore) -> Result<Sidecar> {
        let model = self.model.as_ref().ok_or_else(|| {
            RentaError::new(ErrorCode::Internal, "no fitted model to save")
        })?;
        let stem = ModelStore::demand_stem(&self.property_id);
        let sidecar = Sidecar::for_property(
            &self.property_id,
            self.feature_columns.clone(),
            self.config.clone(),
        );
        let saved = models.save(&stem, model, sidecar)?;
        self.saved_format = Some(saved.format);
        Ok(saved)
    }

    /// Metrics from the last fit, if any
    pub fn metrics(&self) -> Option<TrainingMetrics> {
        self.metrics
    }

    /// Feature columns captured by the last fit
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Normalized feature importance from the last fit
    pub fn importance(&self) -> &BTreeMap<String, f64> {
        &self.importance
    }

    /// Append the training metrics to `pricing_model_metrics`.
    ///
    /// Never fails the caller: a metrics row is evidence, not a
    /// precondition, so append errors go to the nonfatal sink.
    pub fn record_metrics(
        &self,
        store: &dyn StateStore,
        models: &ModelStore,
        trained_by: TrainedBy,
        model_version: &str,
    ) {
        let (Some(metrics), Some(_)) = (self.metrics, self.model.as_ref()) else {
            return;
        };

        let stem = ModelStore::demand_stem(&self.property_id);
        let format = self.saved_format.unwrap_or(crate::ArtifactFormat::Json);
        let model_path = models.artifact_path(&stem, format).display().to_string();

        let row = ModelMetricRow {
            property_id: self.property_id.clone(),
            model_version: model_version.to_string(),
            train_rmse: metrics.train_rmse,
            val_rmse: metrics.val_rmse,
            train_mae: Some(metrics.train_mae),
            val_mae: Some(metrics.val_mae),
            n_train_samples: metrics.n_train as u32,
            n_val_samples: metrics.n_val as u32,
            feature_importance: self.importance.clone(),
            model_path,
            trained_at: OffsetDateTime::now_utc(),
            trained_by,
            metadata: json!({
                "config": self.config,
                "n_features": self.feature_columns.len(),
                "feature_columns": self.feature_columns,
            }),
        };

        if let Err(err) = store.insert_metric(row) {
            nonfatal::observe("metric_append", self.property_id.as_str(), &err);
        }
    }
}

/// Loaded demand model ready for prediction.
pub struct DemandPredictor {
    property_id: PropertyId,
    model: GradientBoostingRegressor,
    feature_columns: Vec<String>,
    saved_at: String,
}

impl DemandPredictor {
    /// Load the live demand model for a property.
    pub fn load(models: &ModelStore, property: &PropertyId) -> Result<Self> {
        let stem = ModelStore::demand_stem(property);
        let (model, sidecar) = models.load(&stem).map_err(|e| {
            if e.code == ErrorCode::ModelNotFound {
                RentaError::model_not_found(property)
            } else {
                e
            }
        })?;
        Ok(Self {
            property_id: property.clone(),
            model,
            feature_columns: sidecar.feature_columns,
            saved_at: sidecar.saved_at,
        })
    }

    /// The property this predictor belongs to
    pub fn property_id(&self) -> &PropertyId {
        &self.property_id
    }

    /// The persisted feature order
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Whether the model was trained with the named feature
    pub fn expects_feature(&self, name: &str) -> bool {
        self.feature_columns.iter().any(|c| c == name)
    }

    /// Save timestamp of the loaded artifact (cache-invalidation token)
    pub fn saved_at(&self) -> &str {
        &self.saved_at
    }

    /// Predict demand for one observation, clipped to >= 0.
    ///
    /// Features the model never saw are ignored; features it expects but
    /// the row lacks become 0.0. Prediction never raises.
    pub fn predict_row(&self, row: &FeatureRow) -> f64 {
        let vector = row.to_vector(&self.feature_columns);
        f64::from(self.model.predict_row(&vector)).max(0.0)
    }
}

/// Build the dataset, train, persist, and record metrics in one call.
///
/// This is the path both the CLI and the retrain controller go through.
/// The metric append is advisory; everything else fails loudly.
pub fn train_demand_model_for_property(
    store: &dyn StateStore,
    models: &ModelStore,
    property: &PropertyId,
    range: DateRange,
    config: Option<ModelConfig>,
    trained_by: TrainedBy,
    model_version: &str,
) -> Result<TrainingOutcome> {
    let frame = DatasetBuilder::new(store).build_training_frame(property, range)?;
    let n_rows = frame.len();

    let mut trainer = DemandModelTrainer::new(property.clone(), config);
    let metrics = trainer.fit(&frame)?;
    let sidecar = trainer.save(models)?;
    trainer.record_metrics(store, models, trained_by, model_version);

    Ok(TrainingOutcome {
        metrics,
        n_rows,
        range,
        artifact_format: sidecar.format,
    })
}

/// Result of a high-level training call
#[derive(Debug, Clone, Copy)]
pub struct TrainingOutcome {
    /// Metrics of the trained model
    pub metrics: TrainingMetrics,
    /// Rows in the training frame before cleaning
    pub n_rows: usize,
    /// Window the frame covered
    pub range: DateRange,
    /// Format the artifact was persisted with
    pub artifact_format: crate::ArtifactFormat,
}

fn ml_to_renta(err: MlError) -> RentaError {
    match err {
        MlError::TrainingFailed(msg) => RentaError::empty_dataset(msg),
        other => RentaError::new(ErrorCode::Internal, other.to_string()),
    }
}
