//! renta-model: demand models, market-demand models, and their artifacts
//!
//! Two regressors share one substrate:
//!
//! - the **demand model** predicts per-property daily bookings from the
//!   pricing training frame;
//! - the **market-demand model** predicts city-level occupancy (0-100)
//!   from the market feature table, substituting for cold-start
//!   properties.
//!
//! Artifacts live in a [`ModelStore`]: JSON-first serialization with a
//! binary rkyv fallback, a sidecar as the source of truth for feature
//! order and format, rename-based publication, and timestamped backups
//! for the retrain controller's rollback path.

#![warn(missing_docs)]

mod artifact;
mod config;
mod demand;
mod market;
mod store;

pub use artifact::{ArtifactFormat, Sidecar};
pub use config::ModelConfig;
pub use demand::{
    train_demand_model_for_property, DemandModelTrainer, DemandPredictor, TrainingMetrics,
    TrainingOutcome, DEMAND_EXCLUDED_COLUMNS,
};
pub use market::{
    build_market_frame, train_market_model, MarketModelTrainer, MarketPredictor,
    MARKET_EXCLUDED_COLUMNS, MARKET_TARGET,
};
pub use store::{ModelBackup, ModelStore};
