//! Structured retrain report

use serde::Serialize;
use time::Date;

use renta_common::PropertyId;

/// What happened to one property's model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainAction {
    /// The candidate became the live model
    Promoted,
    /// Improvement was below threshold; the incumbent stayed live
    KeptIncumbent,
    /// The candidate degraded; the incumbent was restored from backup
    RolledBack,
}

impl RetrainAction {
    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrainAction::Promoted => "promoted",
            RetrainAction::KeptIncumbent => "kept_incumbent",
            RetrainAction::RolledBack => "rolled_back",
        }
    }
}

/// Per-property outcome of a retrain run
#[derive(Debug, Clone, Serialize)]
pub struct PropertyRetrainResult {
    /// Property the result belongs to
    pub property_id: PropertyId,
    /// Why the property was selected
    pub reason: String,
    /// Outcome; absent when the attempt errored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<RetrainAction>,
    /// Incumbent validation RMSE before the attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_val_rmse: Option<f64>,
    /// Candidate validation RMSE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_val_rmse: Option<f64>,
    /// (old - new) / old; positive means the candidate is better
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement: Option<f64>,
    /// Wall-clock seconds the attempt took
    pub duration_seconds: f64,
    /// Error message when the attempt failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A property examined but not retrained
#[derive(Debug, Clone, Serialize)]
pub struct SkippedProperty {
    /// Property id
    pub property_id: PropertyId,
    /// Why it was skipped
    pub reason: String,
}

/// Echo of the criteria the run used
#[derive(Debug, Clone, Serialize)]
pub struct CriteriaEcho {
    /// Minimum recommendations since last training
    pub min_new_recommendations: u64,
    /// Minimum days since last training
    pub min_days_since_training: i64,
    /// Minimum improvement ratio for promotion
    pub min_improvement: f64,
    /// Whether eligibility checks were bypassed
    pub force: bool,
}

/// Echo of the training window the run used
#[derive(Debug, Clone, Serialize)]
pub struct TrainingWindowEcho {
    /// Window start
    pub start: Date,
    /// Window end
    pub end: Date,
    /// Window length in days
    pub days: i64,
}

/// Summary counters over the whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrainSummary {
    /// Properties a retrain was attempted for
    pub total_processed: u64,
    /// Attempts that trained successfully
    pub succeeded: u64,
    /// Candidates promoted to live
    pub promoted: u64,
    /// Incumbents kept (insufficient improvement)
    pub kept: u64,
    /// Candidates rolled back (degradation)
    pub rolled_back: u64,
    /// Attempts that errored
    pub errors: u64,
}

/// The full report of one retrain run
#[derive(Debug, Clone, Serialize)]
pub struct RetrainReport {
    /// Run start, RFC 3339
    pub started_at: String,
    /// Run end, RFC 3339
    pub completed_at: String,
    /// Wall-clock duration
    pub duration_seconds: f64,
    /// Criteria used
    pub criteria: CriteriaEcho,
    /// Training window used
    pub training_window: TrainingWindowEcho,
    /// Per-property outcomes for attempted retrains
    pub results: Vec<PropertyRetrainResult>,
    /// Properties examined but skipped
    pub skipped: Vec<SkippedProperty>,
    /// Aggregate counters
    pub summary: RetrainSummary,
}
