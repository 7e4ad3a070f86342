//! Retrain controller
//!
//! The sole writer of model artifacts. Per property the sequence is
//! backup -> build dataset -> train candidate -> compare -> promote,
//! keep, or roll back. Comparison is on validation RMSE: the candidate
//! must improve on the incumbent by the configured ratio to be promoted,
//! and any outcome short of promotion restores the incumbent, so the
//! live artifact is never worse than it was when the run started.

use std::sync::Arc;
use std::time::Instant;

use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};

use renta_common::{format_iso_date, DateRange, PropertyId, Result};
use renta_model::{train_demand_model_for_property, ModelConfig, ModelStore};
use renta_store::{StateStore, TrainedBy};

use crate::report::{
    CriteriaEcho, PropertyRetrainResult, RetrainAction, RetrainReport, RetrainSummary,
    SkippedProperty, TrainingWindowEcho,
};

/// Candidate degradation beyond this ratio triggers a rollback.
const ROLLBACK_THRESHOLD: f64 = -0.05;

/// Degradation ratio between the last two metric rows that makes a
/// property eligible on performance grounds.
const DEGRADATION_THRESHOLD: f64 = 0.20;

/// Eligibility and promotion thresholds for a retrain run
#[derive(Debug, Clone)]
pub struct RetrainCriteria {
    /// Trailing window length for the training dataset, in days
    pub window_days: i64,
    /// Minimum recommendations logged since the last training
    pub min_new_recommendations: u64,
    /// Minimum days since the last training
    pub min_days_since_training: i64,
    /// Minimum (old - new) / old improvement required to promote
    pub min_improvement: f64,
    /// Retrain and promote regardless of eligibility and comparison
    pub force: bool,
}

impl Default for RetrainCriteria {
    fn default() -> Self {
        Self {
            window_days: 180,
            min_new_recommendations: 50,
            min_days_since_training: 30,
            min_improvement: 0.05,
            force: false,
        }
    }
}

impl RetrainCriteria {
    /// Create the default criteria
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the training window length
    pub fn with_window_days(mut self, days: i64) -> Self {
        self.window_days = days;
        self
    }

    /// Set the recommendation-volume threshold
    pub fn with_min_new_recommendations(mut self, count: u64) -> Self {
        self.min_new_recommendations = count;
        self
    }

    /// Set the staleness threshold
    pub fn with_min_days_since_training(mut self, days: i64) -> Self {
        self.min_days_since_training = days;
        self
    }

    /// Set the promotion improvement threshold
    pub fn with_min_improvement(mut self, ratio: f64) -> Self {
        self.min_improvement = ratio;
        self
    }

    /// Bypass eligibility and promotion checks
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Drives retraining across all properties that have model history.
pub struct RetrainController {
    store: Arc<dyn StateStore>,
    models: Arc<ModelStore>,
    criteria: RetrainCriteria,
    model_config: Option<ModelConfig>,
}

impl RetrainController {
    /// Create a controller over the given capabilities
    pub fn new(store: Arc<dyn StateStore>, models: Arc<ModelStore>) -> Self {
        Self {
            store,
            models,
            criteria: RetrainCriteria::default(),
            model_config: None,
        }
    }

    /// Override the criteria
    pub fn with_criteria(mut self, criteria: RetrainCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Override the model hyperparameters used for candidates
    pub fn with_model_config(mut self, config: ModelConfig) -> Self {
        self.model_config = Some(config);
        self
    }

    /// Run one full retrain pass as of `today`.
    ///
    /// Per-property failures are collected into the report; only the
    /// initial scan of the metric table can fail the run itself.
    pub fn run(&self, today: Date) -> Result<RetrainReport> {
        let run_start = Instant::now();
        let started_at = now_rfc3339();

        let window = DateRange::trailing(today, self.criteria.window_days);
        let properties = self.store.properties_with_metrics()?;

        info!(
            candidates = properties.len(),
            window_days = self.criteria.window_days,
            force = self.criteria.force,
            "retrain scan started"
        );

        let mut results = Vec::new();
        let mut skipped = Vec::new();
        let mut summary = RetrainSummary::default();

        for property in properties {
            let (eligible, reason) = match self.should_retrain(&property) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(property_id = %property, error = %err, "eligibility probe failed");
                    (false, format!("eligibility probe failed: {}", err))
                }
            };

            if !eligible {
                skipped.push(SkippedProperty {
                    property_id: property,
                    reason,
                });
                continue;
            }

            let result = self.retrain_property(&property, today, window, reason);

            summary.total_processed += 1;
            match (&result.action, &result.error) {
                (Some(action), _) => {
                    summary.succeeded += 1;
                    match action {
                        RetrainAction::Promoted => summary.promoted += 1,
                        RetrainAction::KeptIncumbent => summary.kept += 1,
                        RetrainAction::RolledBack => summary.rolled_back += 1,
                    }
                }
                (None, _) => summary.errors += 1,
            }

            results.push(result);
        }

        let report = RetrainReport {
            started_at,
            completed_at: now_rfc3339(),
            duration_seconds: run_start.elapsed().as_secs_f64(),
            criteria: CriteriaEcho {
                min_new_recommendations: self.criteria.min_new_recommendations,
                min_days_since_training: self.criteria.min_days_since_training,
                min_improvement: self.criteria.min_improvement,
                force: self.criteria.force,
            },
            training_window: TrainingWindowEcho {
                start: window.start,
                end: window.end,
                days: window.len_days(),
            },
            results,
            skipped,
            summary,
        };

        info!(
            processed = report.summary.total_processed,
            promoted = report.summary.promoted,
            kept = report.summary.kept,
            rolled_back = report.summary.rolled_back,
            errors = report.summary.errors,
            "retrain run finished"
        );

        Ok(report)
    }

    /// Eligibility: forced, stale-and-active, or degrading.
    fn should_retrain(&self, property: &PropertyId) -> Result<(bool, String)> {
        if self.criteria.force {
            return Ok((true, "forced".into()));
        }

        let Some(latest) = self.store.latest_model_metric(property)? else {
            return Ok((false, "no existing model".into()));
        };

        let days_since = (OffsetDateTime::now_utc() - latest.trained_at).whole_days();
        let new_recommendations = self
            .store
            .count_recommendations_since(property, latest.trained_at)?;

        if days_since >= self.criteria.min_days_since_training
            && new_recommendations >= self.criteria.min_new_recommendations
        {
            return Ok((
                true,
                format!(
                    "{} days since training and {} new recommendations",
                    days_since, new_recommendations
                ),
            ));
        }

        if let Some(ratio) = self.degradation_ratio(property)? {
            if ratio > DEGRADATION_THRESHOLD {
                return Ok((
                    true,
                    format!("performance degradation of {:.1}%", ratio * 100.0),
                ));
            }
        }

        Ok((
            false,
            format!(
                "criteria not met (days: {}/{}, new recommendations: {}/{})",
                days_since,
                self.criteria.min_days_since_training,
                new_recommendations,
                self.criteria.min_new_recommendations
            ),
        ))
    }

    /// (latest - previous) / previous over the last two metric rows.
    fn degradation_ratio(&self, property: &PropertyId) -> Result<Option<f64>> {
        let rows = self.store.model_metrics(property, 2)?;
        if rows.len() < 2 {
            return Ok(None);
        }
        let latest = rows[0].val_rmse;
        let previous = rows[1].val_rmse;
        if previous <= 0.0 {
            return Ok(None);
        }
        Ok(Some((latest - previous) / previous))
    }

    /// Backup, train, compare, and settle one property.
    fn retrain_property(
        &self,
        property: &PropertyId,
        today: Date,
        window: DateRange,
        reason: String,
    ) -> PropertyRetrainResult {
        let attempt_start = Instant::now();

        let mut result = PropertyRetrainResult {
            property_id: property.clone(),
            reason,
            action: None,
            old_val_rmse: None,
            new_val_rmse: None,
            improvement: None,
            duration_seconds: 0.0,
            error: None,
        };

        let old_val_rmse = match self.store.latest_model_metric(property) {
            Ok(row) => row.map(|r| r.val_rmse).filter(|rmse| *rmse > 0.0),
            Err(err) => {
                warn!(property_id = %property, error = %err, "incumbent metric lookup failed");
                None
            }
        };
        result.old_val_rmse = old_val_rmse;

        let stem = ModelStore::demand_stem(property);
        let backup = match self.models.backup(&stem) {
            Ok(backup) => backup,
            Err(err) => {
                result.error = Some(format!("backup failed: {}", err));
                result.duration_seconds = attempt_start.elapsed().as_secs_f64();
                return result;
            }
        };

        let version = format!("auto-{}", format_iso_date(today));
        let outcome = train_demand_model_for_property(
            self.store.as_ref(),
            &self.models,
            property,
            window,
            self.model_config.clone(),
            TrainedBy::AutoRetrain,
            &version,
        );

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                // The candidate never replaced anything; restore is only
                // needed if the artifact write partially happened
                if let Some(backup) = &backup {
                    if let Err(restore_err) = self.models.restore(&stem, backup) {
                        warn!(property_id = %property, error = %restore_err, "restore after failed training");
                    }
                }
                result.error = Some(err.to_string());
                result.duration_seconds = attempt_start.elapsed().as_secs_f64();
                return result;
            }
        };

        let new_val_rmse = outcome.metrics.val_rmse;
        result.new_val_rmse = Some(new_val_rmse);

        let action = match old_val_rmse {
            // No comparable incumbent: the candidate stands
            None => RetrainAction::Promoted,
            Some(old) => {
                let improvement = (old - new_val_rmse) / old;
                result.improvement = Some(improvement);

                if self.criteria.force || improvement >= self.criteria.min_improvement {
                    RetrainAction::Promoted
                } else if improvement < ROLLBACK_THRESHOLD {
                    RetrainAction::RolledBack
                } else {
                    RetrainAction::KeptIncumbent
                }
            }
        };

        // Anything short of promotion puts the incumbent back; the
        // candidate's metric row stays as evidence either way
        if action != RetrainAction::Promoted {
            match &backup {
                Some(backup) => {
                    if let Err(err) = self.models.restore(&stem, backup) {
                        result.error = Some(format!("restore failed: {}", err));
                        result.duration_seconds = attempt_start.elapsed().as_secs_f64();
                        return result;
                    }
                }
                None => {
                    // Metric history without a live artifact: nothing to
                    // restore, so the candidate stays live after all
                    result.action = Some(RetrainAction::Promoted);
                    result.duration_seconds = attempt_start.elapsed().as_secs_f64();
                    return result;
                }
            }
        }

        info!(
            property_id = %property,
            action = action.as_str(),
            old_val_rmse = result.old_val_rmse,
            new_val_rmse = new_val_rmse,
            improvement = result.improvement,
            "retrain attempt settled"
        );

        result.action = Some(action);
        result.duration_seconds = attempt_start.elapsed().as_secs_f64();
        result
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
