//! End-to-end recommendation scenarios and engine-level invariants
//!
//! Seeds a `MemoryStore` plus a temp `ModelStore` and drives the full
//! recommendation path: cold start, invalid constraints, horizon
//! penalties, market-model base adjustment, and the logging contract.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use time::{Date, Duration, OffsetDateTime};

use renta_common::{CityKey, CurrencyCode, DateRange, PropertyId};
use renta_dataset::{DatasetBuilder, FeatureRow};
use renta_engine::{
    build_price_grid, cap_grid, confidence_score, simulate_revenue, ColdStartPolicy,
    PricingConfig, PricingEngine, Strategy,
};
use renta_model::{
    train_market_model, DemandModelTrainer, DemandPredictor, ModelConfig, ModelStore,
};
use renta_store::{
    BookingRow, MarketFeatureRow, MemoryStore, PricingFeatureRow, PropertyRow, TrainedBy,
};

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

fn quick_config() -> ModelConfig {
    ModelConfig::new().with_n_estimators(15).with_max_depth(3)
}

fn property_row(id: &str, floor: f64, ceiling: f64, base: f64) -> PropertyRow {
    PropertyRow {
        id: PropertyId::new(id),
        country: Some("France".into()),
        city: Some("Paris".into()),
        neighborhood: None,
        property_type: Some("apartment".into()),
        capacity: Some(4),
        floor_price: Some(floor),
        ceiling_price: Some(ceiling),
        base_price: Some(base),
        currency: CurrencyCode::EUR,
    }
}

/// Seed `active_days` booked days (one booking each) ending yesterday.
fn seed_history(store: &MemoryStore, id: &str, active_days: i64, span_days: i64) {
    let end = today() - Duration::days(1);
    for i in 0..span_days {
        if i % (span_days / active_days.max(1)).max(1) == 0 {
            store.add_booking(BookingRow {
                property_id: PropertyId::new(id),
                start_date: end - Duration::days(i),
            });
        }
    }
}

/// Train a demand model for the property from whatever history exists
/// over the last `window` days.
fn train_demand(store: &MemoryStore, models: &ModelStore, id: &str, window: i64) {
    let range = DateRange::trailing(today(), window);
    let frame = DatasetBuilder::new(store)
        .build_training_frame(&PropertyId::new(id), range)
        .unwrap();
    let mut trainer = DemandModelTrainer::new(PropertyId::new(id), Some(quick_config()));
    trainer.fit(&frame).unwrap();
    trainer.save(models).unwrap();
    trainer.record_metrics(store, models, TrainedBy::E2eTest, "v-test");
}

fn engine(store: Arc<MemoryStore>, models: Arc<ModelStore>) -> PricingEngine {
    PricingEngine::new(store, models)
}

#[test]
fn s1_empty_history_cold_start_without_models() {
    let store = Arc::new(MemoryStore::new());
    store.put_property(property_row("p1", 50.0, 300.0, 100.0));

    let dir = tempfile::tempdir().unwrap();
    let models = Arc::new(ModelStore::new(dir.path()).unwrap());

    let engine = engine(store.clone(), models);
    let rec = engine
        .recommend_on(today(), &PropertyId::new("p1"), today() + Duration::days(14), None, None)
        .unwrap();

    assert!(rec.meta.strategy.is_fallback() || rec.meta.strategy == Strategy::DemandSimulationGridSearch);
    assert!((50.0..=300.0).contains(&rec.recommended_price));
    assert!(rec.meta.is_cold_start);
    // Zero history days: the cold-start penalty applies
    assert!(rec.confidence <= 0.60);
    assert_eq!(rec.meta.data_quality, "low");

    // The decision was logged even though it came from a fallback path
    let logged = store.recommendations();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].recommended_price, rec.recommended_price);
}

#[test]
fn s2_invalid_constraints_fall_back_with_normal_confidence() {
    let store = Arc::new(MemoryStore::new());
    store.put_property(property_row("p1", 100.0, 80.0, 90.0));
    seed_history(&store, "p1", 40, 300);

    let dir = tempfile::tempdir().unwrap();
    let models = Arc::new(ModelStore::new(dir.path()).unwrap());

    let engine = engine(store.clone(), models);
    let rec = engine
        .recommend_on(today(), &PropertyId::new("p1"), today() + Duration::days(5), None, None)
        .unwrap();

    assert_eq!(rec.meta.strategy, Strategy::FallbackInvalidConfig);
    assert_eq!(rec.recommended_price, PricingConfig::default().fallback_price);
    // Confidence is computed normally: near-term bonus, 30..90 history penalty
    assert!(rec.confidence > 0.0 && rec.confidence <= 1.0);
}

#[test]
fn s3_long_horizon_with_deep_history() {
    let store = Arc::new(MemoryStore::new());
    store.put_property(property_row("p1", 50.0, 300.0, 100.0));
    // Activity on every day of the lookback year
    let end = today() - Duration::days(0);
    for i in 0..366 {
        store.add_booking(BookingRow {
            property_id: PropertyId::new("p1"),
            start_date: end - Duration::days(i),
        });
    }

    let dir = tempfile::tempdir().unwrap();
    let models = Arc::new(ModelStore::new(dir.path()).unwrap());

    let engine = engine(store.clone(), models);
    let rec = engine
        .recommend_on(today(), &PropertyId::new("p1"), today() + Duration::days(200), None, None)
        .unwrap();

    // 0.80 - 0.30 (horizon) + 0.05 (>365 history days)
    assert_eq!(rec.confidence, 0.55);
    assert!(!rec.meta.is_cold_start);
    assert_eq!(rec.meta.horizon_days, 200);
}

#[test]
fn s4_cold_start_base_adjustment_from_market_score() {
    let store = Arc::new(MemoryStore::new());
    store.put_property(property_row("p1", 50.0, 300.0, 100.0));
    // Sparse history: trainable, but still cold start (< 30 active days)
    seed_history(&store, "p1", 10, 60);

    // Constant city occupancy of 80 -> the market model predicts 80
    for i in -40i64..30 {
        store.add_market_feature(MarketFeatureRow {
            country: "France".into(),
            city: "Paris".into(),
            date: today() + Duration::days(i),
            market_occupancy_estimate: Some(80.0),
            signals: serde_json::from_value(json!({
                "competitor_avg_price": 120.0,
                "event_intensity": 2.0
            }))
            .unwrap(),
        });
    }

    let dir = tempfile::tempdir().unwrap();
    let models = Arc::new(ModelStore::new(dir.path()).unwrap());

    let market_range = DateRange::trailing(today(), 40);
    train_market_model(
        &*store,
        &models,
        &CityKey::new("France", "Paris"),
        market_range,
        Some(quick_config()),
    )
    .unwrap();
    train_demand(&store, &models, "p1", 60);

    let engine = engine(store.clone(), models);
    let stay = today() + Duration::days(14);
    let rec = engine
        .recommend_on(today(), &PropertyId::new("p1"), stay, Some(2), None)
        .unwrap();

    assert!(rec.meta.is_cold_start);
    let adjustment = rec
        .meta
        .market_demand_adjustment
        .as_ref()
        .expect("market adjustment to fire");
    assert!(adjustment.score > 70.0);
    assert!((adjustment.adjusted_base_price - 120.0).abs() < 1e-6);
    assert!((adjustment.adjustment_factor - 1.2).abs() < 1e-6);

    assert_eq!(rec.meta.strategy, Strategy::DemandSimulationGridSearch);
    assert!((50.0..=300.0).contains(&rec.recommended_price));
}

#[test]
fn market_model_failure_keeps_original_base() {
    let store = Arc::new(MemoryStore::new());
    store.put_property(property_row("p1", 50.0, 300.0, 100.0));
    // Cold start, no market model trained at all

    let dir = tempfile::tempdir().unwrap();
    let models = Arc::new(ModelStore::new(dir.path()).unwrap());

    let engine = engine(store.clone(), models);
    let rec = engine
        .recommend_on(today(), &PropertyId::new("p1"), today() + Duration::days(7), None, None)
        .unwrap();

    // The recommendation survives; no adjustment breakdown is attached
    assert!(rec.meta.is_cold_start);
    assert!(rec.meta.market_demand_adjustment.is_none());
}

#[test]
fn logging_failure_does_not_fail_recommendation() {
    let store = Arc::new(MemoryStore::new());
    store.put_property(property_row("p1", 50.0, 300.0, 100.0));
    store.set_fail_appends(true);

    let dir = tempfile::tempdir().unwrap();
    let models = Arc::new(ModelStore::new(dir.path()).unwrap());

    let engine = engine(store.clone(), models);
    let rec = engine.recommend_on(
        today(),
        &PropertyId::new("p1"),
        today() + Duration::days(3),
        None,
        None,
    );
    assert!(rec.is_ok());

    // With durable logging requested, the same failure surfaces
    let engine = PricingEngine::new(store.clone(), Arc::new(ModelStore::new(dir.path()).unwrap()))
        .with_config(PricingConfig::new().with_durable_logging(true));
    let rec = engine.recommend_on(
        today(),
        &PropertyId::new("p1"),
        today() + Duration::days(3),
        None,
        None,
    );
    assert!(rec.is_err());
}

#[test]
fn unknown_property_is_a_typed_error() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let models = Arc::new(ModelStore::new(dir.path()).unwrap());

    let engine = engine(store, models);
    let err = engine
        .recommend_on(today(), &PropertyId::new("ghost"), today() + Duration::days(3), None, None)
        .unwrap_err();
    assert_eq!(err.code, renta_common::ErrorCode::PropertyNotFound);
}

#[test]
fn repeated_recommendations_are_stable_and_distinct() {
    let store = Arc::new(MemoryStore::new());
    store.put_property(property_row("p1", 50.0, 300.0, 100.0));
    seed_history(&store, "p1", 40, 200);

    let dir = tempfile::tempdir().unwrap();
    let models = Arc::new(ModelStore::new(dir.path()).unwrap());
    train_demand(&store, &models, "p1", 200);

    let engine = engine(store.clone(), models);
    let stay = today() + Duration::days(21);

    let first = engine
        .recommend_on(today(), &PropertyId::new("p1"), stay, Some(3), None)
        .unwrap();
    let second = engine
        .recommend_on(today(), &PropertyId::new("p1"), stay, Some(3), None)
        .unwrap();

    assert_eq!(first.recommended_price, second.recommended_price);
    assert_eq!(first.confidence, second.confidence);
    // Two distinct records were appended
    assert_eq!(store.recommendations().len(), 2);
}

#[test]
fn prop_grid_bounded_and_in_range() {
    proptest!(|(
        floor_cents in 100u64..50_000,
        span_cents in 100u64..100_000,
        step_cents in 50u64..2_000,
        base_cents in proptest::option::of(1u64..120_000)
    )| {
        let floor = floor_cents as f64 / 100.0;
        let ceiling = (floor_cents + span_cents) as f64 / 100.0;
        let step = step_cents as f64 / 100.0;
        let base = base_cents.map(|b| b as f64 / 100.0);

        let grid = cap_grid(build_price_grid(floor, ceiling, base, step), base, 50);

        prop_assert!(grid.len() <= 50);
        prop_assert!(!grid.is_empty());
        for price in &grid {
            prop_assert!(*price >= floor && *price <= ceiling);
        }
        prop_assert!(grid.windows(2).all(|w| w[0] < w[1]));
    });
}

#[test]
fn prop_effective_demand_monotone_in_capacity() {
    // One real trained model, shared across all proptest cases
    let store = MemoryStore::new();
    let property = PropertyId::new("p1");
    let start = today() - Duration::days(120);
    for i in 0..100i64 {
        let day = start + Duration::days(i);
        for _ in 0..(i % 5) {
            store.add_booking(BookingRow {
                property_id: property.clone(),
                start_date: day,
            });
        }
        store.add_pricing_feature(PricingFeatureRow {
            property_id: property.clone(),
            date: day,
            competitor_avg_price: Some(90.0 + (i % 5) as f64 * 10.0),
            market_demand_level: Some((i % 5) as f64 * 20.0),
        });
    }
    let range = DateRange::new(start, start + Duration::days(99)).unwrap();
    let frame = DatasetBuilder::new(&store)
        .build_training_frame(&property, range)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let models = ModelStore::new(dir.path()).unwrap();
    let mut trainer = DemandModelTrainer::new(property.clone(), Some(quick_config()));
    trainer.fit(&frame).unwrap();
    trainer.save(&models).unwrap();
    let predictor = DemandPredictor::load(&models, &property).unwrap();

    proptest!(|(
        price in 30.0f64..400.0,
        level in 0.0f64..100.0,
        cap_a in 0u32..10,
        cap_b in 0u32..10
    )| {
        let (small, large) = if cap_a <= cap_b { (cap_a, cap_b) } else { (cap_b, cap_a) };
        let context = FeatureRow::new()
            .with("market_demand_level", level)
            .with("competitor_avg_price", 100.0)
            .with("capacity", 4.0);

        let at_small = simulate_revenue(&predictor, &[price], small, &context)[0];
        let at_large = simulate_revenue(&predictor, &[price], large, &context)[0];

        // Same model, same row: predicted demand identical
        prop_assert_eq!(at_small.predicted_demand, at_large.predicted_demand);

        let eff_small = at_small.expected_revenue / price;
        let eff_large = at_large.expected_revenue / price;
        prop_assert!(eff_small <= eff_large + 1e-9);
        // Saturation at predicted demand
        prop_assert!(eff_large <= at_large.predicted_demand + 1e-9);
    });
}

#[test]
fn prop_confidence_bounds() {
    proptest!(|(
        offset in -400i64..400,
        history in proptest::option::of(0u32..1000)
    )| {
        let base = today();
        let score = confidence_score(base + Duration::days(offset), base, history);

        prop_assert!((0.0..=1.0).contains(&score));
        if offset < 0 {
            prop_assert_eq!(score, 0.0);
        }
        if let Some(h) = history {
            if h >= 366 && (7..=90).contains(&offset) {
                prop_assert!((score - 0.85).abs() < 1e-9);
            }
        }
    });
}

#[test]
fn cold_start_policy_gates_only_on_booked_days() {
    let store = MemoryStore::new();
    let property = PropertyId::new("p1");
    // 35 active days spread over the year
    for i in 0..35i64 {
        store.add_booking(BookingRow {
            property_id: property.clone(),
            start_date: today() - Duration::days(i * 10 + 1),
        });
    }
    assert!(!ColdStartPolicy::default().is_cold_start(&store, &property, today()));
    assert!(ColdStartPolicy::new()
        .with_min_active_days(60)
        .is_cold_start(&store, &property, today()));
}
