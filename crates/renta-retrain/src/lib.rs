//! renta-retrain: closed-loop model retraining
//!
//! Scans metric history and recommendation volume to pick properties due
//! for retraining, trains candidates against a trailing window, and
//! promotes them only when they beat the incumbent - otherwise the
//! incumbent is restored from its pre-training backup. Every attempt
//! leaves a metric row and a line in the structured report.

#![warn(missing_docs)]

mod controller;
mod report;

pub use controller::{RetrainController, RetrainCriteria};
pub use report::{
    CriteriaEcho, PropertyRetrainResult, RetrainAction, RetrainReport, RetrainSummary,
    SkippedProperty, TrainingWindowEcho,
};
