//! Dataset builder: dense internal history joined with market features
//!
//! Densification is the load-bearing step: every calendar day in the
//! requested window produces exactly one record, with zero-booking days
//! explicit rather than missing. A demand model trained only on days that
//! had bookings would never learn what an empty calendar looks like.

use std::collections::HashMap;

use time::Date;
use tracing::debug;

use renta_common::{DateRange, PropertyId, Result};
use renta_store::StateStore;

use crate::frame::TrainingFrame;

/// Column set of the pricing training frame, in frame order.
pub const CANONICAL_COLUMNS: &[&str] = &[
    "price",
    "bookings",
    "capacity",
    "competitor_avg_price",
    "market_demand_level",
    "y_demand",
];

/// Name of the demand target column.
pub const TARGET_COLUMN: &str = "y_demand";

/// One densified day of internal history for a property.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalDailyRecord {
    /// Calendar day
    pub date: Date,
    /// Overridden nightly price, if one was set for this day
    pub price: Option<f64>,
    /// Number of bookings starting this day
    pub bookings: u32,
    /// Static property capacity
    pub capacity: Option<u32>,
}

/// Builds training frames from the state store.
pub struct DatasetBuilder<'a> {
    store: &'a dyn StateStore,
}

impl<'a> DatasetBuilder<'a> {
    /// Create a builder over the given store
    pub fn new(store: &'a dyn StateStore) -> Self {
        Self { store }
    }

    /// Densified internal records: one per day in `range`, in order.
    ///
    /// Bookings are aggregated to a per-day count keyed on their start
    /// date; days without bookings get an explicit zero. Override prices
    /// attach where present, capacity comes from the property row.
    pub fn internal_daily_records(
        &self,
        property: &PropertyId,
        range: DateRange,
    ) -> Result<Vec<InternalDailyRecord>> {
        let bookings = self.store.bookings(property, range)?;
        let overrides = self.store.price_overrides(property, range)?;
        let capacity = self
            .store
            .property(property)?
            .and_then(|row| row.capacity);

        let mut bookings_by_date: HashMap<Date, u32> = HashMap::new();
        for booking in &bookings {
            *bookings_by_date.entry(booking.start_date).or_insert(0) += 1;
        }

        let mut override_by_date: HashMap<Date, f64> = HashMap::new();
        for o in &overrides {
            override_by_date.insert(o.date, o.price);
        }

        Ok(range
            .iter()
            .map(|date| InternalDailyRecord {
                date,
                price: override_by_date.get(&date).copied(),
                bookings: bookings_by_date.get(&date).copied().unwrap_or(0),
                capacity,
            })
            .collect())
    }

    /// Build the pricing training frame for a property and window.
    ///
    /// Left-joins the densified internal records with
    /// `features_pricing_daily` on date, sets `y_demand` to the day's
    /// booking count, and imputes the two market signals with their
    /// neutral defaults (0.0 for competitor price, 50.0 for the demand
    /// index). Override price and capacity keep their nulls.
    pub fn build_training_frame(
        &self,
        property: &PropertyId,
        range: DateRange,
    ) -> Result<TrainingFrame> {
        let columns: Vec<String> = CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut frame = TrainingFrame::new(columns);

        let records = self.internal_daily_records(property, range)?;
        if records.is_empty() {
            return Ok(frame);
        }

        let market = self.store.pricing_features(property, range)?;
        let market_by_date: HashMap<Date, (Option<f64>, Option<f64>)> = market
            .into_iter()
            .map(|row| (row.date, (row.competitor_avg_price, row.market_demand_level)))
            .collect();

        for record in &records {
            let (competitor, demand_level) = market_by_date
                .get(&record.date)
                .copied()
                .unwrap_or((None, None));

            let y_demand = record.bookings as f64;
            frame.push_row(
                record.date,
                vec![
                    record.price,
                    Some(record.bookings as f64),
                    record.capacity.map(|c| c as f64),
                    Some(competitor.unwrap_or(0.0)),
                    Some(demand_level.unwrap_or(50.0)),
                    Some(y_demand.max(0.0)),
                ],
            )?;
        }

        debug!(
            property_id = %property,
            rows = frame.len(),
            "training frame built"
        );

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renta_common::CurrencyCode;
    use renta_store::{
        BookingRow, MemoryStore, PriceOverrideRow, PricingFeatureRow, PropertyRow,
    };
    use time::macros::date;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.put_property(PropertyRow {
            id: PropertyId::new("p1"),
            country: Some("France".into()),
            city: Some("Paris".into()),
            neighborhood: None,
            property_type: None,
            capacity: Some(4),
            floor_price: Some(50.0),
            ceiling_price: Some(300.0),
            base_price: Some(100.0),
            currency: CurrencyCode::EUR,
        });
        store
    }

    #[test]
    fn test_densification_includes_empty_days() {
        let store = seeded_store();
        // Two bookings on the 2nd, nothing else
        for _ in 0..2 {
            store.add_booking(BookingRow {
                property_id: PropertyId::new("p1"),
                start_date: date!(2025 - 05 - 02),
            });
        }

        let builder = DatasetBuilder::new(&store);
        let range = DateRange::new(date!(2025 - 05 - 01), date!(2025 - 05 - 05)).unwrap();
        let records = builder
            .internal_daily_records(&PropertyId::new("p1"), range)
            .unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(records[0].bookings, 0);
        assert_eq!(records[1].bookings, 2);
        assert!(records.iter().all(|r| r.capacity == Some(4)));

        let dates: Vec<Date> = records.iter().map(|r| r.date).collect();
        let mut deduped = dates.clone();
        deduped.dedup();
        assert_eq!(dates, deduped);
    }

    #[test]
    fn test_frame_join_and_imputation() {
        let store = seeded_store();
        store.add_booking(BookingRow {
            property_id: PropertyId::new("p1"),
            start_date: date!(2025 - 05 - 01),
        });
        store.add_price_override(PriceOverrideRow {
            property_id: PropertyId::new("p1"),
            date: date!(2025 - 05 - 01),
            price: 140.0,
        });
        // Market features exist only for the first day
        store.add_pricing_feature(PricingFeatureRow {
            property_id: PropertyId::new("p1"),
            date: date!(2025 - 05 - 01),
            competitor_avg_price: Some(110.0),
            market_demand_level: None,
        });

        let builder = DatasetBuilder::new(&store);
        let range = DateRange::new(date!(2025 - 05 - 01), date!(2025 - 05 - 02)).unwrap();
        let frame = builder
            .build_training_frame(&PropertyId::new("p1"), range)
            .unwrap();

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.columns().len(), CANONICAL_COLUMNS.len());

        // Joined day: override price, real competitor price, imputed demand level
        assert_eq!(frame.value(0, "price"), Some(140.0));
        assert_eq!(frame.value(0, "competitor_avg_price"), Some(110.0));
        assert_eq!(frame.value(0, "market_demand_level"), Some(50.0));
        assert_eq!(frame.value(0, "y_demand"), Some(1.0));

        // Unjoined day: neutral defaults, explicit zero demand, null price
        assert_eq!(frame.value(1, "price"), None);
        assert_eq!(frame.value(1, "competitor_avg_price"), Some(0.0));
        assert_eq!(frame.value(1, "market_demand_level"), Some(50.0));
        assert_eq!(frame.value(1, "y_demand"), Some(0.0));
    }

    #[test]
    fn test_unknown_property_still_densifies() {
        let store = MemoryStore::new();
        let builder = DatasetBuilder::new(&store);
        let range = DateRange::new(date!(2025 - 05 - 01), date!(2025 - 05 - 03)).unwrap();
        let frame = builder
            .build_training_frame(&PropertyId::new("ghost"), range)
            .unwrap();

        assert_eq!(frame.len(), 3);
        assert_eq!(frame.value(0, "capacity"), None);
        assert_eq!(frame.value(0, "y_demand"), Some(0.0));
    }
}
