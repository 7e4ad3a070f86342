//! Revenue optimizer
//!
//! Grid search over candidate prices: one demand prediction per point,
//! expected revenue = price x min(demand, capacity), maximum wins. The
//! primary choice and the alternatives use the same ordering key
//! (revenue descending, ties to the lower price), so they can never
//! disagree about rank.

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use renta_dataset::FeatureRow;
use renta_model::DemandPredictor;

use crate::config::PricingConfig;
use crate::grid::{build_price_grid, cap_grid, constraints_valid};

/// Feature slot the candidate price occupies when the model expects it.
const PRICE_FEATURE: &str = "price";

/// How a recommended price was arrived at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Normal path: revenue simulation over the candidate grid
    DemandSimulationGridSearch,
    /// Floor/ceiling configuration was unusable
    FallbackInvalidConfig,
    /// No grid point produced a finite expected revenue
    FallbackNoValidSimulation,
    /// No demand model artifact could be loaded for the property
    FallbackModelUnavailable,
}

impl Strategy {
    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DemandSimulationGridSearch => "demand_simulation_grid_search",
            Strategy::FallbackInvalidConfig => "fallback_invalid_config",
            Strategy::FallbackNoValidSimulation => "fallback_no_valid_simulation",
            Strategy::FallbackModelUnavailable => "fallback_model_unavailable",
        }
    }

    /// Whether this is one of the fallback paths
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Strategy::DemandSimulationGridSearch)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One evaluated grid point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RevenuePoint {
    /// Candidate nightly price
    pub price: f64,
    /// Demand the model predicts at this price
    pub predicted_demand: f64,
    /// price x min(demand, capacity_remaining)
    pub expected_revenue: f64,
}

/// The optimizer's decision for one (property, date)
#[derive(Debug, Clone, Serialize)]
pub struct PriceDecision {
    /// Selected nightly price
    pub price: f64,
    /// How the price was chosen
    pub strategy: Strategy,
    /// Expected revenue at the selected price (absent on fallbacks)
    pub expected_revenue: Option<f64>,
    /// Predicted demand at the selected price (absent on fallbacks)
    pub predicted_demand: Option<f64>,
    /// Next-best candidates, same ordering as the primary
    pub alternatives: Vec<RevenuePoint>,
    /// Context for operators: grid size, capacity, fallback reason
    pub details: serde_json::Value,
}

impl PriceDecision {
    fn fallback(strategy: Strategy, price: f64, reason: &str) -> Self {
        Self {
            price,
            strategy,
            expected_revenue: None,
            predicted_demand: None,
            alternatives: Vec::new(),
            details: json!({ "reason": reason }),
        }
    }
}

/// Decision for the case where no demand model exists for the property.
///
/// The fallback price is clamped into the property's bounds when they are
/// valid, so even the degraded path honors the floor/ceiling contract.
pub fn model_unavailable_decision(floor: f64, ceiling: f64, config: &PricingConfig) -> PriceDecision {
    let price = if constraints_valid(floor, ceiling) {
        config.fallback_price.clamp(floor, ceiling)
    } else {
        config.fallback_price
    };
    PriceDecision::fallback(
        Strategy::FallbackModelUnavailable,
        price,
        "no demand model artifact for property",
    )
}

/// Evaluate every grid point with one model prediction each.
///
/// The candidate price enters the feature row iff the persisted feature
/// list contains a `price` column; the sidecar list is authoritative.
pub fn simulate_revenue(
    predictor: &DemandPredictor,
    grid: &[f64],
    capacity_remaining: u32,
    context: &FeatureRow,
) -> Vec<RevenuePoint> {
    let price_is_feature = predictor.expects_feature(PRICE_FEATURE);

    grid.iter()
        .map(|&price| {
            let mut row = context.clone();
            if price_is_feature {
                row.set(PRICE_FEATURE, price);
            }
            let predicted_demand = predictor.predict_row(&row);
            let effective_demand = predicted_demand.min(capacity_remaining as f64).max(0.0);
            RevenuePoint {
                price,
                predicted_demand,
                expected_revenue: price * effective_demand,
            }
        })
        .collect()
}

/// Choose the revenue-optimal price for one (property, date).
///
/// Constraint sanitation, grid construction and capping, simulation,
/// selection. Capacity zero is not an error: every candidate scores zero
/// revenue and the tie-break hands back the cheapest price, which the
/// caller is free to interpret.
pub fn choose_price(
    predictor: &DemandPredictor,
    capacity_remaining: u32,
    context: &FeatureRow,
    floor: Option<f64>,
    ceiling: Option<f64>,
    base: Option<f64>,
    config: &PricingConfig,
) -> PriceDecision {
    let floor = floor.unwrap_or(config.default_floor_price);
    let ceiling = ceiling.unwrap_or(config.default_ceiling_price);

    if !constraints_valid(floor, ceiling) {
        return PriceDecision::fallback(
            Strategy::FallbackInvalidConfig,
            config.fallback_price,
            "price constraints cannot produce a grid",
        );
    }

    // A base outside the bounds still guides the grid once clamped
    let base = base.map(|b| b.clamp(floor, ceiling));

    let grid = cap_grid(
        build_price_grid(floor, ceiling, base, config.price_step),
        base,
        config.max_grid_points,
    );

    let simulations = simulate_revenue(predictor, &grid, capacity_remaining, context);

    let mut ranked: Vec<RevenuePoint> = simulations
        .iter()
        .copied()
        .filter(|p| p.expected_revenue.is_finite())
        .collect();

    if ranked.is_empty() {
        return PriceDecision::fallback(
            Strategy::FallbackNoValidSimulation,
            config.fallback_price,
            "no grid point produced a finite expected revenue",
        );
    }

    ranked.sort_by(|a, b| {
        b.expected_revenue
            .partial_cmp(&a.expected_revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.price
                    .partial_cmp(&b.price)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    let best = ranked[0];
    let alternatives: Vec<RevenuePoint> = ranked.iter().skip(1).take(3).copied().collect();

    debug!(
        price = best.price,
        expected_revenue = best.expected_revenue,
        grid_size = grid.len(),
        "price selected by grid search"
    );

    PriceDecision {
        price: best.price,
        strategy: Strategy::DemandSimulationGridSearch,
        expected_revenue: Some(best.expected_revenue),
        predicted_demand: Some(best.predicted_demand),
        alternatives,
        details: json!({
            "grid_size": grid.len(),
            "capacity_remaining": capacity_remaining,
        }),
    }
}
