//! Tripwright Test Utilities
//!
//! Centralized test infrastructure for the Tripwright workspace:
//! - Proptest generators for documents, patches and events
//! - Document fixtures for common trip scenarios
//! - Custom assertions for decisions and workflow state

// Re-export the in-memory store from its source crate
pub use tripwright_storage::{DocumentStore, InMemoryDocumentStore};

// Re-export core types for convenience
pub use tripwright_core::{
    Bundle, Date, Event, Hold, HoldStatus, Money, OperationCall, OperationKind, Patch,
    QuoteOption, RiskReport, Segment, Selection, Stay, Timestamp, TransportMode, Travelers,
    TripIntent, TripType, TripwrightError, TripwrightResult, WorkflowState, WorkingMemory,
};

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Map, Value};

/// Reference "today" used by fixtures and generators.
pub fn reference_date() -> Date {
    NaiveDate::from_ymd_opt(2026, 5, 1).unwrap_or_default()
}

/// Fixed clock used by fixtures.
pub fn fixture_now() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// `2026-MM-DD`.
pub fn date(month: u32, day: u32) -> Date {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap_or_else(reference_date)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Tripwright document types.

    use super::*;
    use proptest::prelude::*;

    // === Scalar Generators ===

    /// Generate a three-letter airport code.
    pub fn arb_airport_code() -> impl Strategy<Value = String> {
        "[A-Z]{3}"
    }

    /// Generate a date within a year after the reference date.
    pub fn arb_date() -> impl Strategy<Value = Date> {
        (0i64..365).prop_map(|days| reference_date() + chrono::Duration::days(days))
    }

    /// Generate a WorkflowState variant.
    pub fn arb_workflow_state() -> impl Strategy<Value = WorkflowState> {
        prop::sample::select(WorkflowState::ALL.to_vec())
    }

    /// Generate a TripType variant.
    pub fn arb_trip_type() -> impl Strategy<Value = TripType> {
        prop_oneof![
            Just(TripType::OneWay),
            Just(TripType::RoundTrip),
            Just(TripType::MultiCity),
        ]
    }

    /// Generate a transport mode, mostly flights.
    pub fn arb_transport_mode() -> impl Strategy<Value = TransportMode> {
        prop_oneof![
            6 => Just(TransportMode::Flight),
            1 => Just(TransportMode::Train),
            1 => Just(TransportMode::Car),
        ]
    }

    // === Document Part Generators ===

    /// Generate a segment, possibly with missing fields.
    pub fn arb_segment() -> impl Strategy<Value = Segment> {
        (
            prop::option::weighted(0.8, arb_airport_code()),
            prop::option::weighted(0.8, arb_airport_code()),
            prop::option::weighted(0.8, arb_date()),
            arb_transport_mode(),
        )
            .prop_map(|(origin, destination, depart_date, mode)| {
                let mut segment = Segment::default();
                segment.origin.code = origin;
                segment.destination.code = destination;
                segment.depart_date = depart_date;
                segment.transport_mode = mode;
                segment
            })
    }

    /// Generate a stay, possibly with missing fields.
    pub fn arb_stay() -> impl Strategy<Value = Stay> {
        (
            prop::option::weighted(0.8, arb_airport_code()),
            prop::option::weighted(0.8, arb_date()),
            prop::option::weighted(0.8, 1i64..10),
        )
            .prop_map(|(location_code, check_in, nights)| Stay {
                location_code,
                check_in,
                check_out: match (check_in, nights) {
                    (Some(d), Some(n)) => Some(d + chrono::Duration::days(n)),
                    _ => None,
                },
                location_hint: None,
            })
    }

    /// Generate traveler counts.
    pub fn arb_travelers() -> impl Strategy<Value = Travelers> {
        (0u32..5, 0u32..3, 0u32..2).prop_map(|(adults, children, infants)| Travelers {
            adults,
            children,
            infants,
        })
    }

    /// Generate a quote option list for one leg or room.
    pub fn arb_quote_options(prefix: &'static str) -> impl Strategy<Value = Vec<QuoteOption>> {
        (1usize..4).prop_map(move |n| {
            (0..n)
                .map(|pos| quote_option(&format!("{}_{}", prefix, pos)))
                .collect()
        })
    }

    /// Generate a working memory with every entry populated.
    pub fn arb_loaded_working_memory() -> impl Strategy<Value = WorkingMemory> {
        (
            prop::collection::vec(arb_quote_options("flt"), 1..4),
            prop::collection::vec(arb_quote_options("htl"), 1..3),
            any::<bool>(),
        )
            .prop_map(|(flights, hotels, blocking)| {
                let mut wm = WorkingMemory {
                    flight_quotes_by_segment: Some(flights.into_iter().map(Some).collect()),
                    hotel_quotes_by_stay: Some(hotels.into_iter().map(|h| Some(vec![h])).collect()),
                    ..WorkingMemory::default()
                };
                wm.ranked_bundles = Some(vec![bundle("bndl_1", &["flt_0"], &["htl_0"], 1200.0)]);
                wm.risk_report = Some(RiskReport {
                    blocking_issues: if blocking {
                        vec!["over budget".to_string()]
                    } else {
                        Vec::new()
                    },
                    ..RiskReport::default()
                });
                wm.selected = Some(Selection {
                    bundle_id: Some("bndl_1".to_string()),
                    flight_option_ids: vec!["flt_0".to_string()],
                    hotel_option_ids: vec!["htl_0".to_string()],
                });
                wm.holds = Some(vec![hold("hold_1", HoldStatus::Held)]);
                wm
            })
    }

    /// Generate a document with arbitrary itinerary/party and a loaded cache.
    pub fn arb_trip_intent() -> impl Strategy<Value = TripIntent> {
        (
            prop::collection::vec(arb_segment(), 0..4),
            prop::collection::vec(arb_stay(), 0..3),
            any::<bool>(),
            prop::option::of(arb_trip_type()),
            arb_travelers(),
            arb_loaded_working_memory(),
            arb_workflow_state(),
        )
            .prop_map(
                |(segments, stays, lodging_needed, trip_type, travelers, wm, state)| {
                    let mut doc = TripIntent::new("trip-prop", "", fixture_now());
                    doc.request.now_date = Some(reference_date());
                    doc.itinerary.segments = segments;
                    doc.itinerary.lodging.stays = stays;
                    doc.itinerary.lodging.needed = lodging_needed;
                    doc.itinerary.trip_type = trip_type;
                    doc.party.travelers = travelers;
                    doc.working_memory = wm;
                    doc.status.set_state(state);
                    doc
                },
            )
    }

    // === Patch Generators ===

    /// Generate a patch made only of scalar leaves (no sequences anywhere),
    /// sometimes carrying a note.
    pub fn arb_sequence_free_patch() -> impl Strategy<Value = Patch> {
        (
            prop::option::of(0u32..20_000),
            prop::option::of(prop::sample::select(vec!["USD", "EUR", "GBP"])),
            prop::option::of(prop::sample::select(vec!["either", "refundable", "nonrefundable"])),
            prop::option::of(prop::sample::select(vec!["economy", "premium_economy", "business"])),
            prop::option::of(0u32..3),
            prop::option::of(1u32..6),
            prop::option::of(prop::sample::select(vec!["one_way", "round_trip", "multi_city"])),
            prop::option::of(0u32..6),
            prop::option::of(any::<bool>()),
            prop::option::of(prop::sample::select(vec!["en-US", "fr-FR", "pt-PT"])),
            prop::option::of(any::<bool>()),
            prop::option::of(prop::sample::select(vec!["budget", "preferences", "party size"])),
        )
            .prop_map(
                |(budget, currency, refundable, cabin, max_stops, star_min, trip_type, adults, needed, locale, approval, note)| {
                    let mut fields = Map::new();
                    if let Some(v) = budget {
                        set_path(&mut fields, &["constraints", "budget_total"], json!(v));
                    }
                    if let Some(v) = currency {
                        set_path(&mut fields, &["constraints", "currency"], json!(v));
                    }
                    if let Some(v) = refundable {
                        set_path(&mut fields, &["constraints", "refundable_preference"], json!(v));
                    }
                    if let Some(v) = cabin {
                        set_path(&mut fields, &["preferences", "flight", "cabin"], json!(v));
                    }
                    if let Some(v) = max_stops {
                        set_path(&mut fields, &["preferences", "flight", "max_stops"], json!(v));
                    }
                    if let Some(v) = star_min {
                        set_path(&mut fields, &["preferences", "hotel", "star_min"], json!(v));
                    }
                    if let Some(v) = trip_type {
                        set_path(&mut fields, &["itinerary", "trip_type"], json!(v));
                    }
                    if let Some(v) = adults {
                        set_path(&mut fields, &["party", "travelers", "adults"], json!(v));
                    }
                    if let Some(v) = needed {
                        set_path(&mut fields, &["itinerary", "lodging", "needed"], json!(v));
                    }
                    if let Some(v) = locale {
                        set_path(&mut fields, &["request", "locale"], json!(v));
                    }
                    if let Some(v) = approval {
                        set_path(
                            &mut fields,
                            &["policy", "rules", "require_user_approval_to_purchase"],
                            json!(v),
                        );
                    }
                    let patch = Patch::new("prop", fields);
                    match note {
                        Some(note) => patch.with_note(note),
                        None => patch,
                    }
                },
            )
    }

    /// Generate a patch that replaces the segment list.
    pub fn arb_segments_patch() -> impl Strategy<Value = Patch> {
        prop::collection::vec(arb_segment(), 0..4).prop_map(|segments| {
            let mut fields = Map::new();
            set_path(
                &mut fields,
                &["itinerary", "segments"],
                serde_json::to_value(segments).unwrap_or(Value::Null),
            );
            Patch::new("prop", fields)
        })
    }

    // === Event Generators ===

    /// Generate a TOOL_ERROR event for any known operation.
    pub fn arb_tool_error() -> impl Strategy<Value = Event> {
        (
            prop::sample::select(OperationKind::ALL.to_vec()),
            "[a-z ]{1,40}",
        )
            .prop_map(|(kind, error)| Event::tool_error(kind.as_str(), json!({}), error))
    }

    /// Generate an event the dispatch loop could deliver from user input.
    pub fn arb_user_event() -> impl Strategy<Value = Event> {
        prop_oneof![
            "[a-z ]{1,30}".prop_map(Event::user_message),
            "bndl_[0-9]".prop_map(|bundle_id| Event::UserSelectedBundle { bundle_id }),
            Just(Event::UserRequestHold {}),
            Just(Event::UserApprovedPurchase {
                approval_token: "tok".to_string(),
                payment_method_id: "pm_1".to_string(),
            }),
            Just(Event::IntentReady {}),
        ]
    }
}

/// Set `value` at a dotted path inside `map`, creating intermediate maps.
pub fn set_path(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = map;
    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(next) => next,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A quote option with a price.
pub fn quote_option(option_id: &str) -> QuoteOption {
    let mut details = Map::new();
    details.insert("price".to_string(), json!({"amount": 420.0, "currency": "USD"}));
    QuoteOption {
        option_id: option_id.to_string(),
        details,
    }
}

/// A ranked bundle.
pub fn bundle(bundle_id: &str, flights: &[&str], hotels: &[&str], total: f64) -> Bundle {
    Bundle {
        bundle_id: bundle_id.to_string(),
        flight_option_ids: flights.iter().map(|s| s.to_string()).collect(),
        hotel_option_ids: hotels.iter().map(|s| s.to_string()).collect(),
        estimated_total: Some(Money {
            amount: total,
            currency: "USD".to_string(),
        }),
        why_this_bundle: Some("Best balance of price and schedule".to_string()),
        tradeoffs: vec!["One stop on the return".to_string()],
        extra: Map::new(),
    }
}

/// A hold on a flight option.
pub fn hold(hold_id: &str, status: HoldStatus) -> Hold {
    Hold {
        hold_id: hold_id.to_string(),
        status,
        item_type: Some("flight".to_string()),
        option_id: Some("flt_seg0_0".to_string()),
        expires_at: None,
        extra: Map::new(),
    }
}

pub mod fixtures {
    //! Document fixtures for common scenarios.

    use super::*;

    /// EWR→DEN on 2026-06-01, back on 2026-06-05, one stay at DEN, 2 adults.
    pub fn simple_round_trip() -> TripIntent {
        let mut doc = TripIntent::new("trip-rt", "EWR to DEN June 1-5 for 2", fixture_now());
        doc.request.now_date = Some(reference_date());
        doc.itinerary.trip_type = Some(TripType::RoundTrip);
        doc.itinerary.segments = vec![
            Segment::flight("seg_outbound", "EWR", "DEN", Some(date(6, 1))),
            Segment::flight("seg_return", "DEN", "EWR", Some(date(6, 5))),
        ];
        doc.itinerary.lodging.stays = vec![Stay {
            location_code: Some("DEN".to_string()),
            check_in: Some(date(6, 1)),
            check_out: Some(date(6, 5)),
            location_hint: None,
        }];
        doc.party.travelers.adults = 2;
        doc
    }

    /// EWR→LIS→OPO→EWR with stays in LIS and OPO, 2 adults.
    pub fn multi_city_trip() -> TripIntent {
        let mut doc = TripIntent::new("trip-mc", "Lisbon then Porto", fixture_now());
        doc.request.now_date = Some(reference_date());
        doc.itinerary.trip_type = Some(TripType::MultiCity);
        doc.itinerary.segments = vec![
            Segment::flight("seg_0", "EWR", "LIS", Some(date(6, 1))),
            Segment::flight("seg_1", "LIS", "OPO", Some(date(6, 4))),
            Segment::flight("seg_2", "OPO", "EWR", Some(date(6, 7))),
        ];
        doc.itinerary.lodging.stays = vec![
            Stay {
                location_code: Some("LIS".to_string()),
                check_in: Some(date(6, 1)),
                check_out: Some(date(6, 4)),
                location_hint: None,
            },
            Stay {
                location_code: Some("OPO".to_string()),
                check_in: Some(date(6, 4)),
                check_out: Some(date(6, 7)),
                location_hint: None,
            },
        ];
        doc.party.travelers.adults = 2;
        doc
    }

    /// Mark the requirements confirmed.
    pub fn confirmed(mut doc: TripIntent) -> TripIntent {
        doc.status.set_state(WorkflowState::ReadyToQuote);
        doc
    }

    /// Quote every flight leg and stay with two options each.
    pub fn fully_quoted(mut doc: TripIntent) -> TripIntent {
        let flights = doc
            .itinerary
            .segments
            .iter()
            .enumerate()
            .map(|(i, _)| {
                Some(vec![
                    quote_option(&format!("flt_seg{}_0", i)),
                    quote_option(&format!("flt_seg{}_1", i)),
                ])
            })
            .collect();
        let hotels = (0..doc.stays_to_quote().len())
            .map(|j| {
                Some(vec![vec![
                    quote_option(&format!("htl_stay{}_0", j)),
                    quote_option(&format!("htl_stay{}_1", j)),
                ]])
            })
            .collect();
        doc.working_memory.flight_quotes_by_segment = Some(flights);
        doc.working_memory.hotel_quotes_by_stay = Some(hotels);
        doc
    }

    /// Add two ranked bundles built from the first and second options.
    pub fn with_bundles(mut doc: TripIntent) -> TripIntent {
        let legs = doc.itinerary.segments.len();
        let stays = doc.stays_to_quote().len();
        let ids = |prefix: &str, n: usize, pos: usize| -> Vec<String> {
            (0..n).map(|i| format!("{}{}_{}", prefix, i, pos)).collect()
        };
        let make = |bundle_id: &str, pos: usize, total: f64| {
            let flights = ids("flt_seg", legs, pos);
            let hotels = ids("htl_stay", stays, pos);
            let flights: Vec<&str> = flights.iter().map(String::as_str).collect();
            let hotels: Vec<&str> = hotels.iter().map(String::as_str).collect();
            bundle(bundle_id, &flights, &hotels, total)
        };
        doc.working_memory.ranked_bundles =
            Some(vec![make("bndl_1", 0, 1840.0), make("bndl_2", 1, 2110.0)]);
        doc
    }

    /// Select `bundle_id` from the ranked bundles.
    pub fn with_selection(mut doc: TripIntent, bundle_id: &str) -> TripIntent {
        if let Some(b) = doc.working_memory.find_bundle(bundle_id).cloned() {
            doc.working_memory.selected = Some(Selection {
                bundle_id: Some(b.bundle_id),
                flight_option_ids: b.flight_option_ids,
                hotel_option_ids: b.hotel_option_ids,
            });
        }
        doc
    }

    /// Attach a risk report to the current selection.
    pub fn with_risk_report(mut doc: TripIntent, blocking: &[&str], risks: &[&str]) -> TripIntent {
        doc.working_memory.risk_report = Some(RiskReport {
            blocking_issues: blocking.iter().map(|s| s.to_string()).collect(),
            risks: risks.iter().map(|s| s.to_string()).collect(),
            ..RiskReport::default()
        });
        doc
    }

    /// Attach holds with the given statuses.
    pub fn with_holds(mut doc: TripIntent, statuses: &[HoldStatus]) -> TripIntent {
        doc.working_memory.holds = Some(
            statuses
                .iter()
                .enumerate()
                .map(|(i, s)| hold(&format!("hold_{}", i + 1), *s))
                .collect(),
        );
        doc
    }

    /// A `trip_requirements_extract` result payload.
    pub fn extraction_result(trip_intent: Value, missing: &[&str], clarifying: &[&str]) -> Value {
        json!({
            "trip_intent": trip_intent,
            "missing_required_fields": missing,
            "clarifying_questions": clarifying,
        })
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertions for decisions and workflow state.

    use super::*;

    /// Assert that a result is Ok.
    pub fn assert_ok<T: std::fmt::Debug>(result: &TripwrightResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got {:?}", result);
    }

    /// Assert that a result is a validation error.
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &TripwrightResult<T>) {
        assert!(
            matches!(result, Err(TripwrightError::Validation(_))),
            "Expected validation error, got {:?}",
            result
        );
    }

    /// Assert the document's workflow state.
    pub fn assert_state(doc: &TripIntent, expected: WorkflowState) {
        assert_eq!(
            doc.status.state(),
            expected,
            "Expected state {}, got {} (notes: {:?})",
            expected,
            doc.status.state(),
            doc.status.notes
        );
        assert_eq!(doc.status.phase(), expected.phase());
    }

    /// Assert exactly one operation of `kind` and return it.
    pub fn assert_single_operation(operations: &[OperationCall], kind: OperationKind) -> &OperationCall {
        assert_eq!(
            operations.len(),
            1,
            "Expected exactly one {} call, got {:?}",
            kind,
            operations
        );
        assert_eq!(operations[0].kind(), Some(kind));
        &operations[0]
    }

    /// Assert no operation in `operations` is of `kind`.
    pub fn assert_no_operation(operations: &[OperationCall], kind: OperationKind) {
        assert!(
            operations.iter().all(|op| op.kind() != Some(kind)),
            "Unexpected {} call in {:?}",
            kind,
            operations
        );
    }

    /// Assert some message contains `needle`.
    pub fn assert_message_contains(messages: &[String], needle: &str) {
        assert!(
            messages.iter().any(|m| m.contains(needle)),
            "No message contains {:?}: {:?}",
            needle,
            messages
        );
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_set_path_builds_nested_maps() {
        let mut map = Map::new();
        set_path(&mut map, &["a", "b", "c"], json!(1));
        set_path(&mut map, &["a", "d"], json!(2));
        assert_eq!(Value::Object(map), json!({"a": {"b": {"c": 1}, "d": 2}}));
    }

    #[test]
    fn test_fixtures_are_quotable() {
        let doc = fully_quoted(simple_round_trip());
        assert!(doc.all_quoted());
        let doc = with_bundles(doc);
        assert!(doc.working_memory.find_bundle("bndl_1").is_some());
        let doc = with_selection(doc, "bndl_2");
        let selected = doc.working_memory.selected.unwrap();
        assert_eq!(selected.flight_option_ids, vec!["flt_seg0_1", "flt_seg1_1"]);
        assert_eq!(selected.hotel_option_ids, vec!["htl_stay0_1"]);
    }

    #[test]
    fn test_multi_city_fixture_shape() {
        let doc = multi_city_trip();
        assert_eq!(doc.itinerary.segments.len(), 3);
        assert_eq!(doc.itinerary.lodging.stays.len(), 2);
    }
}
