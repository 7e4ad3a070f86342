//! renta-store: typed access to the pricing state store
//!
//! The pricing core consumes five tables (`properties`, `bookings`,
//! `price_overrides`, `features_pricing_daily`, `market_features`) and
//! appends to two (`pricing_model_metrics`, `pricing_recommendations`).
//! This crate owns the row types for those tables, the [`StateStore`]
//! contract, and an in-memory implementation used by the CLI's
//! table-directory loader and by every test.
//!
//! No business logic lives here: reads are filters over typed rows,
//! writes are appends, and every numeric coercion from the loosely typed
//! market pipeline goes through the safe parsers in [`parse`].

#![warn(missing_docs)]

pub mod memory;
pub mod parse;
mod rows;
mod store;

pub use memory::MemoryStore;
pub use rows::{
    BookingRow, MarketFeatureRow, ModelMetricRow, PriceOverrideRow, PricingFeatureRow,
    PropertyRow, RecommendationRow, TrainedBy,
};
pub use store::StateStore;
