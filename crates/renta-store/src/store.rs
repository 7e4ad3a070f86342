//! The state-store contract

use time::{Date, OffsetDateTime};

use renta_common::{CityKey, DateRange, PropertyId, Result};

use crate::rows::{
    BookingRow, MarketFeatureRow, ModelMetricRow, PriceOverrideRow, PricingFeatureRow,
    PropertyRow, RecommendationRow,
};

/// Typed read/append access to the pricing state store.
///
/// All calls are blocking; the core has no long-running computation behind
/// a read, so a single synchronous contract keeps every call site uniform.
/// Implementations must be safe to share across threads (recommendations
/// for distinct properties run in parallel).
///
/// Failure policy is decided by callers, not here: hot-path reads surface
/// errors, metric appends are swallowed by trainers, recommendation appends
/// are swallowed by the entry point unless durable logging was requested.
pub trait StateStore: Send + Sync {
    /// Bookings whose start date falls inside the window, ordered by date.
    fn bookings(&self, property: &PropertyId, range: DateRange) -> Result<Vec<BookingRow>>;

    /// Price overrides for the window, ordered by date.
    fn price_overrides(
        &self,
        property: &PropertyId,
        range: DateRange,
    ) -> Result<Vec<PriceOverrideRow>>;

    /// The property row, or `None` if unknown.
    fn property(&self, property: &PropertyId) -> Result<Option<PropertyRow>>;

    /// Property-scoped market pricing features for the window, ordered by date.
    fn pricing_features(
        &self,
        property: &PropertyId,
        range: DateRange,
    ) -> Result<Vec<PricingFeatureRow>>;

    /// The city-level market feature row for one date, or `None` if absent.
    fn market_features_on(&self, key: &CityKey, date: Date) -> Result<Option<MarketFeatureRow>>;

    /// City-level market feature rows for the window, ordered by date.
    fn market_features(&self, key: &CityKey, range: DateRange) -> Result<Vec<MarketFeatureRow>>;

    /// Most recent model metric row for the property, or `None`.
    fn latest_model_metric(&self, property: &PropertyId) -> Result<Option<ModelMetricRow>>;

    /// Last `limit` metric rows for the property, newest first.
    fn model_metrics(&self, property: &PropertyId, limit: usize) -> Result<Vec<ModelMetricRow>>;

    /// Distinct property ids that have at least one metric row.
    fn properties_with_metrics(&self) -> Result<Vec<PropertyId>>;

    /// Number of recommendation rows appended since the given instant.
    fn count_recommendations_since(
        &self,
        property: &PropertyId,
        since: OffsetDateTime,
    ) -> Result<u64>;

    /// Append a model metric row.
    fn insert_metric(&self, record: ModelMetricRow) -> Result<()>;

    /// Append a recommendation row.
    fn insert_recommendation(&self, record: RecommendationRow) -> Result<()>;
}
