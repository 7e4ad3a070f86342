//! Single sink for swallowed errors
//!
//! The pricing engine deliberately survives several failure kinds: metric
//! appends, recommendation logging, market-model lookups on the cold-start
//! path. Every one of those swallows must pass through [`observe`] so the
//! fallback rate is visible to operators instead of silently absorbed.

use std::fmt::Display;

use tracing::warn;

/// Record a swallowed, non-fatal error.
///
/// `kind` is a stable tag to aggregate on (e.g. `metric_append`,
/// `recommendation_append`, `market_model`, `cold_start_probe`);
/// `context` identifies the entity involved.
pub fn observe(kind: &str, context: &str, err: &dyn Display) {
    warn!(
        target: "renta::nonfatal",
        kind = kind,
        context = context,
        error = %err,
        "non-fatal error swallowed"
    );
}
