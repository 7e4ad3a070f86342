//! renta-dataset: training-frame construction
//!
//! Joins dense internal daily history with property-scoped market features
//! into the tabular frame the demand model trains on. The frame is typed:
//! columns are named, nulls are explicit, and the temporal train/validation
//! split lives next to the data it orders.

#![warn(missing_docs)]

mod builder;
mod frame;

pub use builder::{DatasetBuilder, InternalDailyRecord, CANONICAL_COLUMNS, TARGET_COLUMN};
pub use frame::{FeatureRow, FrameRow, TrainingFrame};
