//! Row types for the consumed and written tables

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime};

use renta_common::{CurrencyCode, PropertyId};

use crate::parse::safe_f64;

/// One reservation from the `bookings` table.
///
/// Only the fields the pricing core reads; a booking contributes one unit
/// of demand on its start date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRow {
    /// Property the booking belongs to
    pub property_id: PropertyId,
    /// Check-in date
    pub start_date: Date,
}

/// One manual nightly-price override from `price_overrides`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceOverrideRow {
    /// Property the override belongs to
    pub property_id: PropertyId,
    /// Night the override applies to
    pub date: Date,
    /// Overridden nightly price
    pub price: f64,
}

/// One property from the `properties` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRow {
    /// Property id
    pub id: PropertyId,
    /// Country, when known
    #[serde(default)]
    pub country: Option<String>,
    /// City, when known
    #[serde(default)]
    pub city: Option<String>,
    /// Neighborhood, when known
    #[serde(default)]
    pub neighborhood: Option<String>,
    /// Listing type (apartment, house, ...)
    #[serde(default)]
    pub property_type: Option<String>,
    /// Guest capacity
    #[serde(default)]
    pub capacity: Option<u32>,
    /// Minimum allowed nightly price
    #[serde(default)]
    pub floor_price: Option<f64>,
    /// Maximum allowed nightly price
    #[serde(default)]
    pub ceiling_price: Option<f64>,
    /// Reference nightly price
    #[serde(default)]
    pub base_price: Option<f64>,
    /// Pricing currency
    #[serde(default = "default_currency")]
    pub currency: CurrencyCode,
}

fn default_currency() -> CurrencyCode {
    CurrencyCode::EUR
}

/// One property-scoped market feature row from `features_pricing_daily`.
///
/// The table carries more columns than this; the pricing frame only ever
/// consumes these two signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingFeatureRow {
    /// Property id
    pub property_id: PropertyId,
    /// Feature date
    pub date: Date,
    /// Average competitor nightly price
    #[serde(default)]
    pub competitor_avg_price: Option<f64>,
    /// Market demand index (0-100)
    #[serde(default)]
    pub market_demand_level: Option<f64>,
}

/// One city-level row from `market_features`.
///
/// Beyond the typed key and target, the pipeline writes an open-ended set
/// of numeric signals (competitor stats, weather score, event intensity,
/// trend/sentiment scores, calendar flags). They are kept as raw JSON and
/// coerced through the safe parsers on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketFeatureRow {
    /// Country
    pub country: String,
    /// City
    pub city: String,
    /// Feature date
    pub date: Date,
    /// Market occupancy estimate in percent (0-100), the market model target
    #[serde(default)]
    pub market_occupancy_estimate: Option<f64>,
    /// Remaining pipeline columns, untyped
    #[serde(flatten)]
    pub signals: BTreeMap<String, Value>,
}

impl MarketFeatureRow {
    /// All signals that coerce to a finite number, keyed by column name.
    ///
    /// Non-numeric cells are dropped, matching how the trainers select
    /// feature columns.
    pub fn numeric_signals(&self) -> BTreeMap<String, f64> {
        self.signals
            .iter()
            .filter_map(|(name, value)| safe_f64(value).map(|v| (name.clone(), v)))
            .collect()
    }
}

/// Who triggered a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainedBy {
    /// Operator-initiated training
    Manual,
    /// Scheduled batch training
    Batch,
    /// The retrain controller
    AutoRetrain,
    /// End-to-end test harness
    E2eTest,
}

impl TrainedBy {
    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainedBy::Manual => "manual",
            TrainedBy::Batch => "batch",
            TrainedBy::AutoRetrain => "auto_retrain",
            TrainedBy::E2eTest => "e2e_test",
        }
    }
}

/// One append-only row of `pricing_model_metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetricRow {
    /// Property the model belongs to
    pub property_id: PropertyId,
    /// Version tag for the trained model
    pub model_version: String,
    /// Training RMSE
    pub train_rmse: f64,
    /// Validation RMSE; the promotion comparison key
    pub val_rmse: f64,
    /// Training MAE
    #[serde(default)]
    pub train_mae: Option<f64>,
    /// Validation MAE
    #[serde(default)]
    pub val_mae: Option<f64>,
    /// Rows in the training split
    pub n_train_samples: u32,
    /// Rows in the validation split
    pub n_val_samples: u32,
    /// Normalized gain per feature
    #[serde(default)]
    pub feature_importance: BTreeMap<String, f64>,
    /// Path of the artifact this row describes
    pub model_path: String,
    /// When training finished
    pub trained_at: OffsetDateTime,
    /// Who triggered the training
    pub trained_by: TrainedBy,
    /// Free-form training context (config, column list, window)
    #[serde(default)]
    pub metadata: Value,
}

/// One append-only row of `pricing_recommendations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRow {
    /// Property the recommendation is for
    pub property_id: PropertyId,
    /// Stay date the price applies to
    pub stay_date: Date,
    /// Recommended nightly price
    pub recommended_price: f64,
    /// Pricing currency
    pub currency: CurrencyCode,
    /// Calibrated confidence in [0, 1]
    pub confidence: f64,
    /// Strategy tag explaining how the price was chosen
    pub strategy: String,
    /// Expected revenue at the recommended price
    #[serde(default)]
    pub expected_revenue: Option<f64>,
    /// Predicted demand at the recommended price
    #[serde(default)]
    pub predicted_demand: Option<f64>,
    /// Snapshot of the decision context
    #[serde(default)]
    pub context: Value,
    /// When the recommendation was produced
    pub created_at: OffsetDateTime,
}
