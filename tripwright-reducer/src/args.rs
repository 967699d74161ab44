//! Operation argument builders.
//!
//! Each builder reads the document and produces the JSON arguments of one
//! operation call. Builders never mutate the document.

use serde_json::{json, Value};
use tripwright_core::{
    ChatMessage, EngineConfig, QuoteOption, Selection, Travelers, TripIntent, TRIP_INTENT_SCHEMA,
};

// ============================================================================
// SUMMARIES
// ============================================================================

/// Compact view of the trip handed to operations that do not need the
/// whole document.
pub fn trip_summary(doc: &TripIntent) -> Value {
    let segments = &doc.itinerary.segments;
    let first = segments.first();
    let segments_summary: Vec<Value> = segments
        .iter()
        .map(|s| {
            json!({
                "origin": s.origin.code,
                "destination": s.destination.code,
                "depart_date": s.depart_date,
                "transport_mode": s.transport_mode,
            })
        })
        .collect();
    let stays_summary: Vec<Value> = doc
        .stays_to_quote()
        .iter()
        .map(|st| {
            json!({
                "location_code": st.location_code,
                "check_in": st.check_in,
                "check_out": st.check_out,
            })
        })
        .collect();

    json!({
        "origin": first.and_then(|s| s.origin.code.clone()),
        "destination": first.and_then(|s| s.destination.code.clone()),
        "trip_type": doc.itinerary.trip_type,
        "segments": segments_summary,
        "stays": stays_summary,
        "dates": {
            "departure_date": first.and_then(|s| s.depart_date),
            "return_date": segments.get(1).and_then(|s| s.depart_date),
        },
        "travelers": doc.party.travelers,
        "constraints": doc.constraints,
    })
}

/// Guests per room: travelers who need a bed, split into rooms of at most
/// `max_per_room`. A party of nobody still books one guest.
pub fn room_occupancies(travelers: &Travelers, max_per_room: u32) -> Vec<u32> {
    let max_per_room = max_per_room.max(1);
    let mut remaining = travelers.guests();
    if remaining == 0 {
        return vec![1];
    }
    let mut rooms = Vec::new();
    while remaining > 0 {
        let take = remaining.min(max_per_room);
        rooms.push(take);
        remaining -= take;
    }
    rooms
}

/// Per-stay room lists flattened to one option list per room.
pub fn flatten_hotel_rooms(doc: &TripIntent) -> Vec<Vec<QuoteOption>> {
    doc.working_memory
        .hotel_quotes_by_stay
        .iter()
        .flatten()
        .flatten()
        .flat_map(|rooms| rooms.iter().cloned())
        .collect()
}

/// Option lists of every flight leg, in document order.
pub fn flight_options_by_leg(doc: &TripIntent) -> Vec<Vec<QuoteOption>> {
    doc.itinerary
        .flight_segment_indices()
        .into_iter()
        .map(|i| doc.working_memory.flight_quotes(i).unwrap_or(&[]).to_vec())
        .collect()
}

// ============================================================================
// INTAKE
// ============================================================================

pub fn extraction(doc: &TripIntent, user_message: &str, history: &[ChatMessage]) -> Value {
    json!({
        "user_message": user_message,
        "context": {
            "timezone": doc.request.timezone,
            "now_date": doc.request.now_date,
            "current_intent": trip_summary(doc),
            "conversation_history": history,
        },
    })
}

pub fn followup_questions(doc: &TripIntent, missing: &[String]) -> Value {
    json!({
        "trip_intent": doc,
        "missing": missing,
        "user_message": doc.request.user_message,
    })
}

// ============================================================================
// QUOTING
// ============================================================================

/// Arguments for quoting the flight leg at `segment_index`.
pub fn flight_quote(doc: &TripIntent, segment_index: usize, config: &EngineConfig) -> Option<Value> {
    let segment = doc.itinerary.segments.get(segment_index)?;
    let prefs = &doc.preferences.flight;
    Some(json!({
        "origin": segment.origin.code,
        "destination": segment.destination.code,
        "departure_date": segment.depart_date,
        "trip_type": "one_way",
        "travelers": doc.party.travelers,
        "cabin": prefs.cabin.clone().unwrap_or_else(|| config.default_cabin.clone()),
        "constraints": {
            "max_stops": prefs.max_stops.unwrap_or(config.default_max_stops),
            "avoid_red_eye": prefs.avoid_red_eye.unwrap_or(false),
            "preferred_airlines": prefs.preferred_airlines.clone().unwrap_or_default(),
        },
        "result_limit": config.result_limit,
        "segment_index": segment_index,
    }))
}

/// Arguments for quoting the stay at `stay_index`.
pub fn hotel_quote(doc: &TripIntent, stay_index: usize, config: &EngineConfig) -> Option<Value> {
    let stays = doc.stays_to_quote();
    let stay = stays.get(stay_index)?;
    let lodging = &doc.itinerary.lodging;
    let prefs = &doc.preferences.hotel;
    let destination = stay.location_code.clone().or_else(|| {
        if lodging.stays.is_empty() {
            lodging.location_hint.clone()
        } else {
            None
        }
    });
    Some(json!({
        "schema": TRIP_INTENT_SCHEMA,
        "itinerary": doc.itinerary,
        "party": doc.party,
        "stay_index": stay_index,
        "destination": destination,
        "dates": {"start_date": stay.check_in, "end_date": stay.check_out},
        "room_occupancies": room_occupancies(&doc.party.travelers, config.max_guests_per_room),
        "constraints": {
            "hotel_star_min": prefs.star_min.unwrap_or(config.default_hotel_star_min),
            "refundable_only": prefs.refundable_only.unwrap_or(false),
            "location_hint": stay.location_hint.clone().or_else(|| lodging.location_hint.clone()),
        },
        "result_limit": config.result_limit,
    }))
}

pub fn ranker(doc: &TripIntent, config: &EngineConfig) -> Value {
    let room_counts: Vec<usize> = doc
        .working_memory
        .hotel_quotes_by_stay
        .iter()
        .flatten()
        .map(|stay| stay.as_ref().map_or(0, Vec::len))
        .collect();
    json!({
        "trip_intent": trip_summary(doc),
        "ranking_policy": {"weights": config.ranking_weights},
        "flight_options_by_segment": flight_options_by_leg(doc),
        "hotel_options_by_stay": flatten_hotel_rooms(doc),
        "room_counts_per_stay": room_counts,
        "room_occupancies": room_occupancies(&doc.party.travelers, config.max_guests_per_room),
    })
}

// ============================================================================
// SELECTION AND BOOKING
// ============================================================================

/// For each option list, the first option whose id was selected.
fn pick_selected(lists: &[Vec<QuoteOption>], ids: &[String]) -> Vec<QuoteOption> {
    lists
        .iter()
        .filter_map(|options| options.iter().find(|o| ids.contains(&o.option_id)).cloned())
        .collect()
}

pub fn risk_check(doc: &TripIntent, selection: &Selection) -> Value {
    let selected_flights = pick_selected(&flight_options_by_leg(doc), &selection.flight_option_ids);
    let selected_hotels = pick_selected(&flatten_hotel_rooms(doc), &selection.hotel_option_ids);
    json!({
        "trip_intent": trip_summary(doc),
        "selected_flight": selected_flights.first().map_or_else(|| json!({}), |o| json!(o)),
        "selected_hotel": selected_hotels.first().map_or_else(|| json!({}), |o| json!(o)),
        "selected_flights": selected_flights,
        "selected_hotels": selected_hotels,
        "org_policy": doc.policy.rules,
    })
}

/// Hold arguments; `None` when the selection names no options.
pub fn hold(doc: &TripIntent, selection: &Selection) -> Option<Value> {
    let profiles = &doc.party.traveler_profile_ids;
    let items: Vec<Value> = selection
        .flight_option_ids
        .iter()
        .map(|id| ("flight", id))
        .chain(selection.hotel_option_ids.iter().map(|id| ("hotel", id)))
        .filter(|(_, id)| !id.is_empty())
        .map(|(item_type, id)| {
            json!({
                "item_type": item_type,
                "option_id": id,
                "traveler_profile_ids": profiles,
            })
        })
        .collect();
    if items.is_empty() {
        return None;
    }
    let bundle_id = selection.bundle_id.as_deref().unwrap_or_default();
    Some(json!({
        "idempotency_key": format!("hold_{}_{}", doc.trip_id, bundle_id),
        "items": items,
    }))
}

pub fn purchase(
    doc: &TripIntent,
    approval_token: &str,
    payment_method_id: &str,
    hold_ids: &[String],
) -> Value {
    json!({
        "idempotency_key": format!("purchase_{}", doc.trip_id),
        "approval_token": approval_token,
        "hold_ids": hold_ids,
        "payment_method_id": payment_method_id,
        "contact_email": doc.party.contact.email,
    })
}

// =============================================================================
// TESTS
// =============================================================================
