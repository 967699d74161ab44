//! Property and scenario tests for the decision engine.

use proptest::prelude::*;
use serde_json::json;
use tripwright_core::{EngineConfig, Event, OperationKind, TripIntent, WorkflowState};
use tripwright_reducer::{missing_required_fields, DecisionEngine, TurnContext};
use tripwright_test_utils::assertions::{assert_single_operation, assert_state};
use tripwright_test_utils::fixtures::{confirmed, fully_quoted, multi_city_trip, simple_round_trip};
use tripwright_test_utils::generators::{arb_tool_error, arb_trip_intent, arb_user_event};

fn engine() -> DecisionEngine {
    DecisionEngine::new(EngineConfig::default()).unwrap()
}

fn decide(doc: &mut TripIntent, event: Event) -> Vec<OperationKind> {
    engine()
        .decide(doc, &event, &TurnContext::default())
        .operations
        .iter()
        .filter_map(|op| op.kind())
        .collect()
}

const SEARCH_KINDS: [OperationKind; 3] = [
    OperationKind::FlightQuoteSearch,
    OperationKind::HotelQuoteSearch,
    OperationKind::TripOptionRanker,
];

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_confirmed_round_trip_quotes_outbound_first() {
    let mut doc = confirmed(simple_round_trip());
    let decision = engine().decide(&mut doc, &Event::IntentReady {}, &TurnContext::default());
    let op = assert_single_operation(&decision.operations, OperationKind::FlightQuoteSearch);
    assert_eq!(op.arguments["segment_index"], 0);
    assert_eq!(op.arguments["origin"], "EWR");
    assert_eq!(op.arguments["destination"], "DEN");
    assert_eq!(op.arguments["departure_date"], "2026-06-01");
}

#[test]
fn test_intake_through_confirmation() {
    let engine = engine();
    let ctx = TurnContext::default();
    let mut doc = simple_round_trip();

    let d = engine.decide(&mut doc, &Event::user_message("EWR to DEN June 1-5 for 2"), &ctx);
    assert_single_operation(&d.operations, OperationKind::RequirementsExtract);

    let d = engine.decide(
        &mut doc,
        &Event::tool_result("trip_requirements_extract", json!({}), json!({}), None),
        &ctx,
    );
    assert!(d.operations.is_empty());
    assert_state(&doc, WorkflowState::AwaitingConfirmation);

    // the reply is extracted first, and stays in the confirmation gate
    let d = engine.decide(&mut doc, &Event::user_message("yes"), &ctx);
    assert_single_operation(&d.operations, OperationKind::RequirementsExtract);
    assert_state(&doc, WorkflowState::AwaitingConfirmation);

    let d = engine.decide(
        &mut doc,
        &Event::tool_result(
            "trip_requirements_extract",
            json!({}),
            json!({}),
            Some("yes".to_string()),
        ),
        &ctx,
    );
    let op = assert_single_operation(&d.operations, OperationKind::FlightQuoteSearch);
    assert_eq!(op.arguments["segment_index"], 0);
}

#[test]
fn test_multi_city_quotes_every_leg_before_hotels() {
    let mut doc = confirmed(multi_city_trip());
    let mut flights = Vec::new();
    for i in 0..3 {
        assert_eq!(decide(&mut doc, Event::IntentReady {}), vec![OperationKind::FlightQuoteSearch]);
        flights.push(Some(vec![tripwright_test_utils::quote_option(&format!("f{}", i))]));
        doc.working_memory.flight_quotes_by_segment = Some(flights.clone());
    }
    assert_eq!(decide(&mut doc, Event::IntentReady {}), vec![OperationKind::HotelQuoteSearch]);
}

#[test]
fn test_fully_quoted_trip_ranks_once() {
    let mut doc = fully_quoted(confirmed(multi_city_trip()));
    assert_eq!(decide(&mut doc, Event::IntentReady {}), vec![OperationKind::TripOptionRanker]);
    doc.working_memory.ranked_bundles = Some(Vec::new());
    assert!(decide(&mut doc, Event::IntentReady {}).is_empty());
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A failed operation never queues work or touches the document data.
    #[test]
    fn prop_tool_error_is_contained(doc in arb_trip_intent(), event in arb_tool_error()) {
        let mut after = doc.clone();
        let ops = decide(&mut after, event);

        prop_assert!(ops.is_empty());
        prop_assert_eq!(after.status.state(), WorkflowState::Retryable);
        prop_assert!(after.status.last_error.is_some());
        prop_assert_eq!(&after.itinerary, &doc.itinerary);
        prop_assert_eq!(&after.party, &doc.party);
        prop_assert_eq!(&after.working_memory, &doc.working_memory);
    }

    /// Before confirmation, user input never starts quoting or ranking.
    #[test]
    fn prop_no_search_before_confirmation(
        doc in arb_trip_intent(),
        awaiting in any::<bool>(),
        event in arb_user_event(),
    ) {
        prop_assume!(!matches!(event, Event::IntentReady {}));
        let mut doc = doc;
        doc.status.set_state(if awaiting {
            WorkflowState::AwaitingConfirmation
        } else {
            WorkflowState::CollectingRequirements
        });

        let ops = decide(&mut doc, event);
        prop_assert!(ops.iter().all(|k| !SEARCH_KINDS.contains(k)));
    }

    /// Ranking is only requested when every leg and stay is quoted.
    #[test]
    fn prop_ranking_needs_all_quotes(doc in arb_trip_intent(), event in arb_user_event()) {
        let mut doc = doc;
        let ops = decide(&mut doc, event);
        if ops.contains(&OperationKind::TripOptionRanker) {
            prop_assert!(doc.all_quoted());
        }
    }

    /// Missing fields are recomputed from the document each turn, and block
    /// every operation past intake.
    #[test]
    fn prop_missing_fields_are_recomputed(doc in arb_trip_intent(), event in arb_user_event()) {
        let mut doc = doc;
        doc.status.last_error = None;
        doc.status.missing_required = vec!["stale".to_string()];

        let ops = decide(&mut doc, event);
        let expected = missing_required_fields(&doc.itinerary, &doc.party);
        prop_assert_eq!(&doc.status.missing_required, &expected);
        if !expected.is_empty() {
            prop_assert_eq!(doc.status.state(), WorkflowState::CollectingRequirements);
            prop_assert!(ops.iter().all(|k| matches!(
                k,
                OperationKind::RequirementsExtract | OperationKind::FollowupQuestions
            )));
        }
    }
}
