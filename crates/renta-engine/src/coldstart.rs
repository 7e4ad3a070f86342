//! Cold-start detection
//!
//! A property without enough booked days over the last year cannot carry
//! a trustworthy per-property model; the recommendation path substitutes
//! the city-level market model for it. The threshold is a tunable, and
//! errors while probing history default to cold start.

use time::Date;

use renta_common::{nonfatal, DateRange, PropertyId};
use renta_dataset::DatasetBuilder;
use renta_store::StateStore;

/// Thresholds for the cold-start predicate
#[derive(Debug, Clone, Copy)]
pub struct ColdStartPolicy {
    /// Minimum days with bookings required to count as warm
    pub min_active_days: u32,
    /// How far back to look, in days
    pub lookback_days: i64,
}

impl Default for ColdStartPolicy {
    fn default() -> Self {
        Self {
            min_active_days: 30,
            lookback_days: 365,
        }
    }
}

impl ColdStartPolicy {
    /// Create the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum number of booked days
    pub fn with_min_active_days(mut self, days: u32) -> Self {
        self.min_active_days = days;
        self
    }

    /// Whether the property is cold-start as of `today`.
    ///
    /// Counts days with bookings > 0 over the lookback window; history
    /// access errors count as cold start.
    pub fn is_cold_start(
        &self,
        store: &dyn StateStore,
        property: &PropertyId,
        today: Date,
    ) -> bool {
        let range = DateRange::trailing(today, self.lookback_days);
        match DatasetBuilder::new(store).internal_daily_records(property, range) {
            Ok(records) => {
                let active = records.iter().filter(|r| r.bookings > 0).count() as u32;
                active < self.min_active_days
            }
            Err(err) => {
                nonfatal::observe("cold_start_probe", property.as_str(), &err);
                true
            }
        }
    }
}

/// Days with recorded activity (a booking or a price override) over the
/// last year, as the confidence heuristic counts history depth.
///
/// `None` when history cannot be read.
pub fn history_days(store: &dyn StateStore, property: &PropertyId, today: Date) -> Option<u32> {
    let range = DateRange::trailing(today, 365);
    match DatasetBuilder::new(store).internal_daily_records(property, range) {
        Ok(records) => Some(
            records
                .iter()
                .filter(|r| r.bookings > 0 || r.price.is_some())
                .count() as u32,
        ),
        Err(err) => {
            nonfatal::observe("history_probe", property.as_str(), &err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renta_store::{BookingRow, MemoryStore, PriceOverrideRow};
    use time::macros::date;
    use time::Duration;

    const TODAY: Date = date!(2025 - 06 - 01);

    fn store_with_booked_days(days: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 0..days {
            store.add_booking(BookingRow {
                property_id: PropertyId::new("p1"),
                start_date: TODAY - Duration::days(i as i64 + 1),
            });
        }
        store
    }

    #[test]
    fn test_empty_history_is_cold() {
        let store = MemoryStore::new();
        let policy = ColdStartPolicy::default();
        assert!(policy.is_cold_start(&store, &PropertyId::new("p1"), TODAY));
    }

    #[test]
    fn test_threshold_boundary() {
        let policy = ColdStartPolicy::default();

        let store = store_with_booked_days(29);
        assert!(policy.is_cold_start(&store, &PropertyId::new("p1"), TODAY));

        let store = store_with_booked_days(30);
        assert!(!policy.is_cold_start(&store, &PropertyId::new("p1"), TODAY));
    }

    #[test]
    fn test_repeat_bookings_same_day_count_once() {
        let store = MemoryStore::new();
        // 40 bookings all on one day: still only one active day
        for _ in 0..40 {
            store.add_booking(BookingRow {
                property_id: PropertyId::new("p1"),
                start_date: TODAY - Duration::days(3),
            });
        }
        assert!(ColdStartPolicy::default().is_cold_start(&store, &PropertyId::new("p1"), TODAY));
    }

    #[test]
    fn test_history_days_counts_overrides() {
        let store = store_with_booked_days(10);
        store.add_price_override(PriceOverrideRow {
            property_id: PropertyId::new("p1"),
            date: TODAY - Duration::days(100),
            price: 90.0,
        });

        assert_eq!(
            history_days(&store, &PropertyId::new("p1"), TODAY),
            Some(11)
        );
    }

    #[test]
    fn test_tunable_threshold() {
        let store = store_with_booked_days(5);
        let relaxed = ColdStartPolicy::new().with_min_active_days(5);
        assert!(!relaxed.is_cold_start(&store, &PropertyId::new("p1"), TODAY));
    }
}
