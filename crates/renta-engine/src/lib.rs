//! renta-engine: the pricing decision core
//!
//! Given a property, a stay date and a remaining-capacity hint, produce a
//! recommended nightly price with a calibrated confidence score and the
//! decision metadata operators need (expected revenue, predicted demand,
//! strategy tag, alternatives).
//!
//! # Components
//!
//! - `grid` - bounded candidate price grids, dense around the base price
//! - `optimizer` - revenue simulation and selection with typed fallbacks
//! - `confidence` - the (horizon, history) -> [0, 1] heuristic
//! - `coldstart` - the booked-days predicate that gates the market model
//! - `engine` - [`PricingEngine`], the recommendation entry point

#![warn(missing_docs)]

mod coldstart;
mod confidence;
mod config;
mod engine;
mod grid;
mod optimizer;

pub use coldstart::{history_days, ColdStartPolicy};
pub use confidence::{confidence_score, confidence_score_str};
pub use config::PricingConfig;
pub use engine::{MarketAdjustment, PricingEngine, Recommendation, RecommendationMeta};
pub use grid::{build_price_grid, cap_grid, constraints_valid};
pub use optimizer::{
    choose_price, model_unavailable_decision, simulate_revenue, PriceDecision, RevenuePoint,
    Strategy,
};
