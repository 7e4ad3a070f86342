//! In-memory state store
//!
//! Backs two things: hermetic tests, and the CLI's table-directory mode
//! where each consumed table is a JSON array file under a data directory.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use time::{Date, OffsetDateTime};
use tracing::debug;

use renta_common::{CityKey, DateRange, PropertyId, RentaError, Result};

use crate::rows::{
    BookingRow, MarketFeatureRow, ModelMetricRow, PriceOverrideRow, PricingFeatureRow,
    PropertyRow, RecommendationRow,
};
use crate::store::StateStore;

#[derive(Default)]
struct Inner {
    properties: BTreeMap<PropertyId, PropertyRow>,
    bookings: Vec<BookingRow>,
    overrides: Vec<PriceOverrideRow>,
    pricing_features: Vec<PricingFeatureRow>,
    market_features: Vec<MarketFeatureRow>,
    metrics: Vec<ModelMetricRow>,
    recommendations: Vec<RecommendationRow>,
}

/// In-memory [`StateStore`] implementation.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    /// When set, appends fail; lets tests exercise the swallow paths
    fail_appends: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            fail_appends: AtomicBool::new(false),
        }
    }

    /// Load the consumed tables from a directory of JSON array files.
    ///
    /// Expected file names match the table names (`properties.json`,
    /// `bookings.json`, `price_overrides.json`, `features_pricing_daily.json`,
    /// `market_features.json`); missing files load as empty tables.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let store = Self::new();
        {
            let mut inner = store.inner.write().expect("store lock poisoned");

            let properties: Vec<PropertyRow> = load_table(dir, "properties.json")?;
            for row in properties {
                inner.properties.insert(row.id.clone(), row);
            }
            inner.bookings = load_table(dir, "bookings.json")?;
            inner.overrides = load_table(dir, "price_overrides.json")?;
            inner.pricing_features = load_table(dir, "features_pricing_daily.json")?;
            inner.market_features = load_table(dir, "market_features.json")?;

            debug!(
                properties = inner.properties.len(),
                bookings = inner.bookings.len(),
                market_rows = inner.market_features.len(),
                "state store loaded from directory"
            );
        }
        Ok(store)
    }

    /// Insert or replace a property row
    pub fn put_property(&self, row: PropertyRow) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.properties.insert(row.id.clone(), row);
    }

    /// Append a booking row
    pub fn add_booking(&self, row: BookingRow) {
        self.inner
            .write()
            .expect("store lock poisoned")
            .bookings
            .push(row);
    }

    /// Append a price override row
    pub fn add_price_override(&self, row: PriceOverrideRow) {
        self.inner
            .write()
            .expect("store lock poisoned")
            .overrides
            .push(row);
    }

    /// Append a property-scoped pricing feature row
    pub fn add_pricing_feature(&self, row: PricingFeatureRow) {
        self.inner
            .write()
            .expect("store lock poisoned")
            .pricing_features
            .push(row);
    }

    /// Append a city-level market feature row
    pub fn add_market_feature(&self, row: MarketFeatureRow) {
        self.inner
            .write()
            .expect("store lock poisoned")
            .market_features
            .push(row);
    }

    /// Make subsequent appends fail, to exercise swallow paths in tests
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// All recommendation rows, in append order
    pub fn recommendations(&self) -> Vec<RecommendationRow> {
        self.inner
            .read()
            .expect("store lock poisoned")
            .recommendations
            .clone()
    }

    /// All metric rows, in append order
    pub fn metrics(&self) -> Vec<ModelMetricRow> {
        self.inner
            .read()
            .expect("store lock poisoned")
            .metrics
            .clone()
    }

    fn check_appends(&self) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(RentaError::store_write("append rejected by test toggle"));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn load_table<T: serde::de::DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = std::fs::read(&path)
        .map_err(|e| RentaError::store_read(format!("reading {}: {}", path.display(), e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RentaError::store_read(format!("parsing {}: {}", path.display(), e)))
}

impl StateStore for MemoryStore {
    fn bookings(&self, property: &PropertyId, range: DateRange) -> Result<Vec<BookingRow>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut rows: Vec<BookingRow> = inner
            .bookings
            .iter()
            .filter(|b| &b.property_id == property && range.contains(b.start_date))
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.start_date);
        Ok(rows)
    }

    fn price_overrides(
        &self,
        property: &PropertyId,
        range: DateRange,
    ) -> Result<Vec<PriceOverrideRow>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut rows: Vec<PriceOverrideRow> = inner
            .overrides
            .iter()
            .filter(|o| &o.property_id == property && range.contains(o.date))
            .cloned()
            .collect();
        rows.sort_by_key(|o| o.date);
        Ok(rows)
    }

    fn property(&self, property: &PropertyId) -> Result<Option<PropertyRow>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.properties.get(property).cloned())
    }

    fn pricing_features(
        &self,
        property: &PropertyId,
        range: DateRange,
    ) -> Result<Vec<PricingFeatureRow>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut rows: Vec<PricingFeatureRow> = inner
            .pricing_features
            .iter()
            .filter(|f| &f.property_id == property && range.contains(f.date))
            .cloned()
            .collect();
        rows.sort_by_key(|f| f.date);
        Ok(rows)
    }

    fn market_features_on(&self, key: &CityKey, date: Date) -> Result<Option<MarketFeatureRow>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .market_features
            .iter()
            .find(|m| m.country == key.country && m.city == key.city && m.date == date)
            .cloned())
    }

    fn market_features(&self, key: &CityKey, range: DateRange) -> Result<Vec<MarketFeatureRow>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut rows: Vec<MarketFeatureRow> = inner
            .market_features
            .iter()
            .filter(|m| m.country == key.country && m.city == key.city && range.contains(m.date))
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.date);
        Ok(rows)
    }

    fn latest_model_metric(&self, property: &PropertyId) -> Result<Option<ModelMetricRow>> {
        Ok(self.model_metrics(property, 1)?.into_iter().next())
    }

    fn model_metrics(&self, property: &PropertyId, limit: usize) -> Result<Vec<ModelMetricRow>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut rows: Vec<ModelMetricRow> = inner
            .metrics
            .iter()
            .filter(|m| &m.property_id == property)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.trained_at.cmp(&a.trained_at));
        rows.truncate(limit);
        Ok(rows)
    }

    fn properties_with_metrics(&self) -> Result<Vec<PropertyId>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut ids: Vec<PropertyId> = inner.metrics.iter().map(|m| m.property_id.clone()).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn count_recommendations_since(
        &self,
        property: &PropertyId,
        since: OffsetDateTime,
    ) -> Result<u64> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .recommendations
            .iter()
            .filter(|r| &r.property_id == property && r.created_at >= since)
            .count() as u64)
    }

    fn insert_metric(&self, record: ModelMetricRow) -> Result<()> {
        self.check_appends()?;
        self.inner
            .write()
            .expect("store lock poisoned")
            .metrics
            .push(record);
        Ok(())
    }

    fn insert_recommendation(&self, record: RecommendationRow) -> Result<()> {
        self.check_appends()?;
        self.inner
            .write()
            .expect("store lock poisoned")
            .recommendations
            .push(record);
        Ok(())
    }
}
