//! Property-based tests for the merge/invalidate engine.

use proptest::prelude::*;
use serde_json::json;
use tripwright_core::{HoldStatus, Patch};
use tripwright_patch::{apply, CacheEntry};
use tripwright_test_utils::fixtures::{fully_quoted, multi_city_trip, with_holds};
use tripwright_test_utils::generators::{
    arb_segments_patch, arb_sequence_free_patch, arb_trip_intent,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Applying a sequence-free patch twice equals applying it once.
    #[test]
    fn prop_merge_idempotent(doc in arb_trip_intent(), patch in arb_sequence_free_patch()) {
        prop_assume!(!patch.contains_sequence());
        let mut once = doc.clone();
        apply(&mut once, &patch).unwrap();

        let mut twice = once.clone();
        let second = apply(&mut twice, &patch).unwrap();

        prop_assert_eq!(&once, &twice);
        prop_assert!(second.changed_paths.is_empty());
        prop_assert!(second.invalidations.is_empty());
    }

    /// Any change under itinerary.segments empties the flight-derived cache.
    #[test]
    fn prop_segment_change_invalidates(doc in arb_trip_intent(), patch in arb_segments_patch()) {
        let mut next = doc.clone();
        let outcome = apply(&mut next, &patch).unwrap();
        if outcome.changed("itinerary.segments") {
            let wm = &next.working_memory;
            prop_assert!(wm.flight_quotes_by_segment.is_none());
            prop_assert!(wm.ranked_bundles.is_none());
            prop_assert!(wm.risk_report.is_none());
            prop_assert!(wm.holds.is_none());
            prop_assert!(wm.selected.is_none());
            prop_assert!(outcome.invalidations.contains(CacheEntry::FlightQuotes));
        } else {
            prop_assert_eq!(&next.working_memory, &doc.working_memory);
        }
    }

    /// Every cleared path comes with a reason, in order.
    #[test]
    fn prop_reasons_align_with_cleared(doc in arb_trip_intent(), patch in arb_sequence_free_patch()) {
        let mut next = doc.clone();
        let outcome = apply(&mut next, &patch).unwrap();
        prop_assert_eq!(outcome.invalidations.cleared.len(), outcome.invalidations.reasons.len());
    }

    /// Bookings are never touched by invalidation.
    #[test]
    fn prop_bookings_survive(doc in arb_trip_intent(), patch in arb_segments_patch()) {
        let mut doc = doc;
        doc.working_memory.bookings = Some(vec![json!({"confirmation_id": "CNF1"})]);
        let before = doc.working_memory.bookings.clone();
        apply(&mut doc, &patch).unwrap();
        prop_assert_eq!(doc.working_memory.bookings, before);
    }
}

#[test]
fn test_budget_change_clears_holds_with_reason() {
    let mut doc = with_holds(fully_quoted(multi_city_trip()), &[HoldStatus::Held]);
    let patch = Patch::from_value("user", json!({"constraints": {"budget_total": 2500}}));

    let outcome = apply(&mut doc, &patch).unwrap();

    assert!(doc.working_memory.holds.is_none());
    assert_eq!(doc.constraints.budget_total, Some(2500.0));
    let idx = outcome
        .invalidations
        .cleared
        .iter()
        .position(|p| p == "working_memory.holds")
        .expect("holds cleared");
    assert!(outcome.invalidations.reasons[idx].contains("Budget/refundability changed"));
    // quotes do not depend on the budget
    assert!(doc.working_memory.flight_quotes_by_segment.is_some());
    assert!(doc.working_memory.hotel_quotes_by_stay.is_some());
}

#[test]
fn test_refundability_change_clears_holds() {
    let mut doc = with_holds(fully_quoted(multi_city_trip()), &[HoldStatus::Held]);
    let patch = Patch::from_value(
        "user",
        json!({"constraints": {"refundable_preference": "refundable"}}),
    );
    let outcome = apply(&mut doc, &patch).unwrap();
    assert!(outcome.invalidations.contains(CacheEntry::Holds));
}

#[test]
fn test_traveler_change_clears_flight_but_not_hotel_quotes() {
    let mut doc = fully_quoted(multi_city_trip());
    let patch = Patch::from_value("user", json!({"party": {"travelers": {"adults": 3}}}));
    apply(&mut doc, &patch).unwrap();
    assert!(doc.working_memory.flight_quotes_by_segment.is_none());
    assert!(doc.working_memory.hotel_quotes_by_stay.is_some());
}
