//! Recommendation entry point
//!
//! Composes the demand model, the market-demand model, the optimizer and
//! the confidence heuristic into one decision per (property, stay date),
//! then logs the decision as an append-only recommendation record.
//!
//! The engine is the last line of defense: it returns a decision or a
//! typed error, never partial data. Configuration problems become tagged
//! fallback decisions; only store read failures propagate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::json;
use time::{Date, OffsetDateTime};
use tracing::{info, instrument};

use renta_common::{
    nonfatal, CityKey, CurrencyCode, DateRange, ErrorCode, PropertyId, RentaError, Result,
};
use renta_dataset::{DatasetBuilder, FeatureRow};
use renta_model::{DemandPredictor, MarketPredictor, ModelStore};
use renta_store::{RecommendationRow, StateStore};

use crate::coldstart::{history_days, ColdStartPolicy};
use crate::confidence::confidence_score;
use crate::config::PricingConfig;
use crate::grid::constraints_valid;
use crate::optimizer::{choose_price, model_unavailable_decision, RevenuePoint, Strategy};

/// Breakdown of a cold-start base-price adjustment
#[derive(Debug, Clone, Serialize)]
pub struct MarketAdjustment {
    /// Market score that drove the adjustment (0-100)
    pub score: f64,
    /// Base price before adjustment
    pub original_base_price: f64,
    /// Base price after adjustment and clamping
    pub adjusted_base_price: f64,
    /// adjusted / original
    pub adjustment_factor: f64,
}

/// Decision metadata carried alongside the recommended price
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationMeta {
    /// How the price was chosen
    pub strategy: Strategy,
    /// Days between the request and the stay
    pub horizon_days: i64,
    /// "high" iff confidence > 0.7, else "low"
    pub data_quality: &'static str,
    /// Expected revenue at the recommended price
    pub expected_revenue: Option<f64>,
    /// Predicted demand at the recommended price
    pub predicted_demand: Option<f64>,
    /// Whether the property was treated as cold-start
    pub is_cold_start: bool,
    /// Present when the market model adjusted the base price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_demand_adjustment: Option<MarketAdjustment>,
    /// Optimizer context (grid size, capacity, fallback reason)
    pub details: serde_json::Value,
    /// Next-best candidates
    pub alternatives: Vec<RevenuePoint>,
}

/// A complete pricing recommendation
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    /// Property the recommendation is for
    pub property_id: PropertyId,
    /// Stay date
    pub date: Date,
    /// Recommended nightly price
    pub recommended_price: f64,
    /// Pricing currency
    pub currency: CurrencyCode,
    /// Calibrated confidence in [0, 1]
    pub confidence: f64,
    /// Decision metadata
    pub meta: RecommendationMeta,
}

struct CachedPredictor {
    saved_at: String,
    predictor: Arc<DemandPredictor>,
}

/// The pricing decision engine.
///
/// Holds the store capabilities and an in-process predictor cache keyed by
/// property. Cached predictors revalidate against the sidecar's save
/// timestamp on every request, so a promotion by the retrain controller
/// invalidates them without coordination.
pub struct PricingEngine {
    store: Arc<dyn StateStore>,
    models: Arc<ModelStore>,
    config: PricingConfig,
    cold_start: ColdStartPolicy,
    cache: Mutex<HashMap<PropertyId, CachedPredictor>>,
}

impl PricingEngine {
    /// Create an engine over the given capabilities
    pub fn new(store: Arc<dyn StateStore>, models: Arc<ModelStore>) -> Self {
        Self {
            store,
            models,
            config: PricingConfig::default(),
            cold_start: ColdStartPolicy::default(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Override the pricing configuration
    pub fn with_config(mut self, config: PricingConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the cold-start policy
    pub fn with_cold_start_policy(mut self, policy: ColdStartPolicy) -> Self {
        self.cold_start = policy;
        self
    }

    /// Recommend a nightly price for a stay date, as of today.
    pub fn recommend(
        &self,
        property: &PropertyId,
        stay: Date,
        capacity_remaining: Option<u32>,
        context: Option<FeatureRow>,
    ) -> Result<Recommendation> {
        self.recommend_on(OffsetDateTime::now_utc().date(), property, stay, capacity_remaining, context)
    }

    /// Recommend with an explicit "as of" date (deterministic for tests).
    #[instrument(skip_all, fields(property = %property, stay = %stay))]
    pub fn recommend_on(
        &self,
        as_of: Date,
        property: &PropertyId,
        stay: Date,
        capacity_remaining: Option<u32>,
        context: Option<FeatureRow>,
    ) -> Result<Recommendation> {
        let row = self
            .store
            .property(property)?
            .ok_or_else(|| RentaError::property_not_found(property))?;

        let floor = row.floor_price;
        let ceiling = row.ceiling_price;
        let mut base = row.base_price;

        let is_cold_start = self.cold_start.is_cold_start(self.store.as_ref(), property, as_of);

        let mut market_adjustment = None;
        if is_cold_start {
            if let (Some(original_base), Some(city), Some(country)) =
                (base, row.city.as_deref(), row.country.as_deref())
            {
                match self.market_adjusted_base(
                    &CityKey::new(country, city),
                    stay,
                    original_base,
                    floor.unwrap_or(self.config.default_floor_price),
                    ceiling.unwrap_or(self.config.default_ceiling_price),
                ) {
                    Ok((adjusted, score)) => {
                        market_adjustment = Some(MarketAdjustment {
                            score,
                            original_base_price: original_base,
                            adjusted_base_price: adjusted,
                            adjustment_factor: if original_base > 0.0 {
                                adjusted / original_base
                            } else {
                                1.0
                            },
                        });
                        base = Some(adjusted);
                    }
                    Err(err) => {
                        // Cold-start adjustment is best-effort only
                        nonfatal::observe("market_model", property.as_str(), &err);
                    }
                }
            }
        }

        let capacity = match capacity_remaining {
            Some(c) => c,
            None => self.estimate_capacity(property, stay),
        };

        let context = match context {
            Some(row) => row,
            None => self.build_context(property, stay, row.capacity),
        };

        let effective_floor = floor.unwrap_or(self.config.default_floor_price);
        let effective_ceiling = ceiling.unwrap_or(self.config.default_ceiling_price);

        let decision = if !constraints_valid(effective_floor, effective_ceiling) {
            // Surface the configuration problem as a tagged fallback, and
            // skip the model load it could never use
            choose_price_invalid(&self.config)
        } else {
            match self.predictor(property) {
                Ok(predictor) => choose_price(
                    &predictor,
                    capacity,
                    &context,
                    floor,
                    ceiling,
                    base,
                    &self.config,
                ),
                Err(err)
                    if matches!(
                        err.code,
                        ErrorCode::ModelNotFound
                            | ErrorCode::ArtifactCorrupt
                            | ErrorCode::UnknownArtifactFormat
                    ) =>
                {
                    nonfatal::observe("demand_model_load", property.as_str(), &err);
                    model_unavailable_decision(effective_floor, effective_ceiling, &self.config)
                }
                Err(err) => return Err(err),
            }
        };

        let history = history_days(self.store.as_ref(), property, as_of);
        let confidence = confidence_score(stay, as_of, history);

        let recommendation = Recommendation {
            property_id: property.clone(),
            date: stay,
            recommended_price: decision.price,
            currency: row.currency,
            confidence,
            meta: RecommendationMeta {
                strategy: decision.strategy,
                horizon_days: (stay - as_of).whole_days(),
                data_quality: if confidence > 0.7 { "high" } else { "low" },
                expected_revenue: decision.expected_revenue,
                predicted_demand: decision.predicted_demand,
                is_cold_start,
                market_demand_adjustment: market_adjustment,
                details: decision.details,
                alternatives: decision.alternatives,
            },
        };

        info!(
            price = recommendation.recommended_price,
            strategy = %recommendation.meta.strategy,
            confidence = recommendation.confidence,
            cold_start = is_cold_start,
            "recommendation produced"
        );

        self.log_recommendation(&recommendation, &context, capacity)?;

        Ok(recommendation)
    }

    /// Market-model base adjustment for a cold-start property.
    fn market_adjusted_base(
        &self,
        key: &CityKey,
        stay: Date,
        base: f64,
        floor: f64,
        ceiling: f64,
    ) -> Result<(f64, f64)> {
        let predictor = MarketPredictor::load(&self.models, key)?;
        let score = predictor.predict_score(self.store.as_ref(), stay)?;

        let factor = if score > 70.0 {
            1.20
        } else if score > 50.0 {
            1.10
        } else if score < 30.0 {
            0.90
        } else {
            1.0
        };

        let adjusted = if constraints_valid(floor, ceiling) {
            (base * factor).clamp(floor, ceiling)
        } else {
            base * factor
        };
        Ok((adjusted, score))
    }

    /// Remaining capacity estimate from the stay date's internal record.
    fn estimate_capacity(&self, property: &PropertyId, stay: Date) -> u32 {
        let probe = DateRange::new(stay, stay)
            .ok()
            .and_then(|range| {
                DatasetBuilder::new(self.store.as_ref())
                    .internal_daily_records(property, range)
                    .ok()
            })
            .and_then(|records| records.into_iter().next());

        match probe {
            Some(record) => match record.capacity {
                Some(capacity) => capacity.saturating_sub(record.bookings),
                None => 1,
            },
            None => 1,
        }
    }

    /// Default prediction context from the stay date's pricing features.
    fn build_context(&self, property: &PropertyId, stay: Date, capacity: Option<u32>) -> FeatureRow {
        let features = DateRange::new(stay, stay)
            .ok()
            .and_then(|range| self.store.pricing_features(property, range).ok())
            .and_then(|rows| rows.into_iter().next());

        let mut context = FeatureRow::new();
        match features {
            Some(row) => {
                context.set(
                    "competitor_avg_price",
                    row.competitor_avg_price.unwrap_or(0.0),
                );
                context.set("market_demand_level", row.market_demand_level.unwrap_or(50.0));
            }
            None => {
                context.set("competitor_avg_price", 0.0);
                context.set("market_demand_level", 50.0);
            }
        }
        if let Some(capacity) = capacity {
            context.set("capacity", capacity as f64);
        }
        context
    }

    /// Cached predictor lookup, revalidated against the sidecar timestamp.
    fn predictor(&self, property: &PropertyId) -> Result<Arc<DemandPredictor>> {
        let stem = ModelStore::demand_stem(property);
        let sidecar = self.models.sidecar(&stem)?;

        let mut cache = self.cache.lock().expect("predictor cache poisoned");
        if let Some(cached) = cache.get(property) {
            if cached.saved_at == sidecar.saved_at {
                return Ok(cached.predictor.clone());
            }
        }

        let predictor = Arc::new(DemandPredictor::load(&self.models, property)?);
        cache.insert(
            property.clone(),
            CachedPredictor {
                saved_at: predictor.saved_at().to_string(),
                predictor: predictor.clone(),
            },
        );
        Ok(predictor)
    }

    /// Append the recommendation record; failures are swallowed unless
    /// durable logging was requested.
    fn log_recommendation(
        &self,
        recommendation: &Recommendation,
        context: &FeatureRow,
        capacity: u32,
    ) -> Result<()> {
        let record = RecommendationRow {
            property_id: recommendation.property_id.clone(),
            stay_date: recommendation.date,
            recommended_price: recommendation.recommended_price,
            currency: recommendation.currency,
            confidence: recommendation.confidence,
            strategy: recommendation.meta.strategy.as_str().to_string(),
            expected_revenue: recommendation.meta.expected_revenue,
            predicted_demand: recommendation.meta.predicted_demand,
            context: json!({
                "features": context,
                "capacity_remaining": capacity,
                "is_cold_start": recommendation.meta.is_cold_start,
                "market_demand_adjustment": recommendation.meta.market_demand_adjustment,
            }),
            created_at: OffsetDateTime::now_utc(),
        };

        match self.store.insert_recommendation(record) {
            Ok(()) => Ok(()),
            Err(err) if self.config.durable_logging => Err(err),
            Err(err) => {
                nonfatal::observe(
                    "recommendation_append",
                    recommendation.property_id.as_str(),
                    &err,
                );
                Ok(())
            }
        }
    }
}

fn choose_price_invalid(config: &PricingConfig) -> crate::optimizer::PriceDecision {
    crate::optimizer::PriceDecision {
        price: config.fallback_price,
        strategy: Strategy::FallbackInvalidConfig,
        expected_revenue: None,
        predicted_demand: None,
        alternatives: Vec::new(),
        details: json!({ "reason": "price constraints cannot produce a grid" }),
    }
}
