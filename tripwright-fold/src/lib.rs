//! Tripwright Fold - Result-Folding Engine
//!
//! Writes a successful operation result back into its canonical place in
//! the [`TripIntent`]. Destinations come from the [`convention`] table;
//! requirements extraction is translated into a patch and merged through
//! `tripwright-patch` instead.
//!
//! Failures of the operation itself never reach this crate: they travel
//! as `Event::ToolError` to the decision engine. A result that is present
//! but malformed is a [`ValidationError`], and the document is left as it
//! was.

pub mod convention;
pub mod extract;
pub mod options;

pub use convention::{convention, option_id_prefix, FoldTarget, IndexKey};
pub use extract::{translate, ExtractionResult, Translation};
pub use options::normalize_options;

use serde_json::{Map, Value};
use tripwright_core::{
    canonical_name, Bundle, Hold, HoldStatus, OperationKind, QuoteOption, RiskReport,
    StayQuotes, TripIntent, TripwrightResult, ValidationError, WorkflowState,
};
use tripwright_patch::PatchOutcome;

use crate::options::type_name;

/// What a fold did to the document.
#[derive(Debug, Clone, PartialEq)]
pub enum FoldOutcome {
    /// The result was written into working memory.
    Stored {
        kind: OperationKind,
        path: String,
    },
    /// The result was translated into a patch and merged.
    Patched(PatchOutcome),
    /// No folding rule for this name; only a status note was added.
    Unrecognized { name: String },
}

fn malformed(kind: OperationKind, reason: impl Into<String>) -> ValidationError {
    ValidationError::MalformedResult {
        operation: kind.as_str().to_string(),
        reason: reason.into(),
    }
}

/// Fold one operation result into `doc`.
///
/// `arguments` are the arguments of the call that produced `result`; the
/// indexed quoting operations read `segment_index` / `stay_index` there.
pub fn fold(
    doc: &mut TripIntent,
    operation: &str,
    result: &Value,
    arguments: &Value,
) -> TripwrightResult<FoldOutcome> {
    let Some(kind) = OperationKind::from_name(operation) else {
        tracing::warn!(operation = %operation, "No folding rule for operation");
        doc.status.push_note(format!(
            "[fold] Unrecognized operation '{}'; result not stored",
            canonical_name(operation)
        ));
        return Ok(FoldOutcome::Unrecognized {
            name: operation.to_string(),
        });
    };

    let outcome = match convention(kind) {
        FoldTarget::RequirementsPatch => fold_extraction(doc, result)?,
        FoldTarget::Cache { path, indexed_by } => {
            let index = indexed_by
                .map(|key| index_argument(doc, arguments, key))
                .transpose()?;
            fold_cache(doc, kind, result, index)?;
            FoldOutcome::Stored {
                kind,
                path: match index {
                    Some(i) => format!("{}[{}]", path, i),
                    None => path.to_string(),
                },
            }
        }
    };

    tracing::debug!(
        operation = %kind,
        outcome = ?outcome_label(&outcome),
        "Folded operation result"
    );
    Ok(outcome)
}

fn outcome_label(outcome: &FoldOutcome) -> String {
    match outcome {
        FoldOutcome::Stored { path, .. } => path.clone(),
        FoldOutcome::Patched(p) => format!("patch: {} changed", p.changed_paths.len()),
        FoldOutcome::Unrecognized { name } => format!("unrecognized: {}", name),
    }
}

/// Index argument of an indexed call; absent means 0.
///
/// The index must name a flight leg (`segment_index`) or a stay that needs
/// quotes (`stay_index`) in the current document.
fn index_argument(doc: &TripIntent, arguments: &Value, key: IndexKey) -> Result<usize, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidValue {
        field: key.argument().to_string(),
        reason,
    };
    let index = match arguments.get(key.argument()) {
        None | Some(Value::Null) => 0,
        Some(raw) => raw
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| invalid(format!("{} is not a valid index", raw)))?,
    };

    let in_range = match key {
        IndexKey::Segment => doc.itinerary.flight_segment_indices().contains(&index),
        IndexKey::Stay => index < doc.stays_to_quote().len(),
    };
    if !in_range {
        let what = match key {
            IndexKey::Segment => "flight leg",
            IndexKey::Stay => "stay to quote",
        };
        return Err(invalid(format!("{} does not name a {}", index, what)));
    }
    Ok(index)
}

fn fold_extraction(doc: &mut TripIntent, result: &Value) -> TripwrightResult<FoldOutcome> {
    let translation = translate(doc, result)?;

    let mut next = doc.clone();
    let outcome = tripwright_patch::apply(&mut next, &translation.patch)?;
    for note in translation.notes {
        next.status.push_note(format!("[{}] {}", extract::PATCH_SOURCE, note));
    }
    if !translation.clarifying_questions.is_empty() {
        next.status.push_note(format!(
            "[clarifying_questions] {}",
            translation.clarifying_questions.join(" | ")
        ));
    }
    if !translation.missing_required.is_empty() {
        next.status.set_state(WorkflowState::CollectingRequirements);
    }

    *doc = next;
    Ok(FoldOutcome::Patched(outcome))
}

/// Validate and shape the result first, then write; a malformed result
/// never leaves a half-written cache behind.
fn fold_cache(
    doc: &mut TripIntent,
    kind: OperationKind,
    result: &Value,
    index: Option<usize>,
) -> TripwrightResult<()> {
    let wm = &mut doc.working_memory;
    match kind {
        OperationKind::FollowupQuestions => {
            wm.followup_questions = Some(followup_questions(result)?);
        }
        OperationKind::FlightQuoteSearch => {
            let i = index.unwrap_or(0);
            let options = normalize_options(
                kind.as_str(),
                "options",
                require_object(kind, result)?.get("options"),
                &format!("{}{}", option_id_prefix(IndexKey::Segment), i),
            )?;
            put_indexed(wm.flight_quotes_by_segment.get_or_insert_with(Vec::new), i, options);
        }
        OperationKind::HotelQuoteSearch => {
            let j = index.unwrap_or(0);
            let rooms = hotel_rooms(kind, result, j)?;
            put_indexed(wm.hotel_quotes_by_stay.get_or_insert_with(Vec::new), j, rooms);
        }
        OperationKind::TripOptionRanker => {
            wm.ranked_bundles = Some(bundles(kind, result)?);
        }
        OperationKind::PolicyAndRiskCheck => {
            let mut report = risk_report(kind, result)?;
            if let Some(selected) = &wm.selected {
                report.bundle_id = selected.bundle_id.clone();
                report.flight_option_ids = selected.flight_option_ids.clone();
                report.hotel_option_ids = selected.hotel_option_ids.clone();
            }
            wm.risk_report = Some(report);
        }
        OperationKind::ReservationHoldCreate => {
            wm.holds = Some(holds(kind, result)?);
        }
        OperationKind::BookingConfirmAndPurchase => {
            let confirmation = require_object(kind, result)?
                .get("confirmation")
                .filter(|c| !c.is_null())
                .cloned()
                .ok_or_else(|| malformed(kind, "missing confirmation"))?;
            wm.bookings.get_or_insert_with(Vec::new).push(confirmation);
            doc.status.set_state(WorkflowState::Completed);
        }
        OperationKind::RequirementsExtract => {
            return Err(malformed(kind, "extraction results are folded as patches").into())
        }
    }
    Ok(())
}

fn put_indexed<T>(slots: &mut Vec<Option<T>>, index: usize, value: T) {
    if slots.len() <= index {
        slots.resize_with(index + 1, || None);
    }
    slots[index] = Some(value);
}

fn require_object(kind: OperationKind, result: &Value) -> Result<&Map<String, Value>, ValidationError> {
    result
        .as_object()
        .ok_or_else(|| malformed(kind, format!("expected an object, got {}", type_name(result))))
}

/// `{questions: [..]}` or a bare list; non-string entries are dropped.
fn followup_questions(result: &Value) -> Result<Vec<String>, ValidationError> {
    let kind = OperationKind::FollowupQuestions;
    let list = match result {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("questions") {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(other) => {
                return Err(malformed(
                    kind,
                    format!("questions must be a list, got {}", type_name(other)),
                ))
            }
        },
        other => {
            return Err(malformed(
                kind,
                format!("expected an object or list, got {}", type_name(other)),
            ))
        }
    };
    Ok(list
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(String::from)
        .collect())
}

/// Hotel results carry either `options_by_room` or a single-room `options`.
fn hotel_rooms(kind: OperationKind, result: &Value, stay: usize) -> Result<StayQuotes, ValidationError> {
    let map = require_object(kind, result)?;
    let prefix = option_id_prefix(IndexKey::Stay);
    match map.get("options_by_room") {
        Some(Value::Array(rooms)) => rooms
            .iter()
            .enumerate()
            .map(|(r, room)| {
                normalize_options(
                    kind.as_str(),
                    &format!("options_by_room[{}]", r),
                    Some(room),
                    &format!("{}{}_room{}", prefix, stay, r),
                )
            })
            .collect(),
        Some(Value::Null) | None => {
            let options: Vec<QuoteOption> = normalize_options(
                kind.as_str(),
                "options",
                map.get("options"),
                &format!("{}{}", prefix, stay),
            )?;
            Ok(vec![options])
        }
        Some(other) => Err(malformed(
            kind,
            format!("options_by_room must be a list, got {}", type_name(other)),
        )),
    }
}

fn bundles(kind: OperationKind, result: &Value) -> Result<Vec<Bundle>, ValidationError> {
    let raw = match require_object(kind, result)?.get("bundles") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(malformed(
                kind,
                format!("bundles must be a list, got {}", type_name(other)),
            ))
        }
    };
    raw.iter()
        .enumerate()
        .map(|(pos, item)| {
            let has_id = item
                .get("bundle_id")
                .and_then(Value::as_str)
                .is_some_and(|id| !id.trim().is_empty());
            if !has_id {
                return Err(malformed(kind, format!("bundles[{}] has no bundle_id", pos)));
            }
            serde_json::from_value(item.clone())
                .map_err(|e| malformed(kind, format!("bundles[{}]: {}", pos, e)))
        })
        .collect()
}

/// Issues may arrive as strings or as `{message|description, ..}` maps.
fn issue_text(issue: &Value) -> String {
    match issue {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("description"))
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| issue.to_string()),
        other => other.to_string(),
    }
}

fn risk_report(kind: OperationKind, result: &Value) -> Result<RiskReport, ValidationError> {
    let mut map = require_object(kind, result)?.clone();
    for field in ["blocking_issues", "risks"] {
        let texts: Vec<Value> = match map.remove(field) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(|i| Value::String(issue_text(i))).collect(),
            Some(other) => {
                return Err(malformed(
                    kind,
                    format!("{} must be a list, got {}", field, type_name(&other)),
                ))
            }
        };
        map.insert(field.to_string(), Value::Array(texts));
    }
    serde_json::from_value(Value::Object(map)).map_err(|e| malformed(kind, e.to_string()))
}

fn holds(kind: OperationKind, result: &Value) -> Result<Vec<Hold>, ValidationError> {
    let raw = match require_object(kind, result)?.get("holds") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(malformed(
                kind,
                format!("holds must be a list, got {}", type_name(other)),
            ))
        }
    };
    raw.iter()
        .enumerate()
        .map(|(pos, item)| {
            let Value::Object(map) = item else {
                return Err(malformed(kind, format!("holds[{}] is not an object", pos)));
            };
            let mut map = map.clone();
            let has_id = map
                .get("hold_id")
                .and_then(Value::as_str)
                .is_some_and(|id| !id.trim().is_empty());
            if !has_id {
                return Err(malformed(kind, format!("holds[{}] has no hold_id", pos)));
            }
            if !map.get("status").is_some_and(Value::is_string) {
                map.insert(
                    "status".to_string(),
                    serde_json::to_value(HoldStatus::Unknown)
                        .map_err(|e| malformed(kind, e.to_string()))?,
                );
            }
            serde_json::from_value(Value::Object(map))
                .map_err(|e| malformed(kind, format!("holds[{}]: {}", pos, e)))
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tripwright_core::Selection;
    use tripwright_test_utils::fixtures::{multi_city_trip, simple_round_trip};

    #[test]
    fn test_flight_options_land_at_segment_index() {
        let mut doc = multi_city_trip();
        let result = json!({"options": [{"price": 320}, {"option_id": "UA12"}]});
        let outcome = fold(&mut doc, "flight_quote_search", &result, &json!({"segment_index": 2})).unwrap();

        assert_eq!(
            outcome,
            FoldOutcome::Stored {
                kind: OperationKind::FlightQuoteSearch,
                path: "working_memory.flight_quotes_by_segment[2]".to_string(),
            }
        );
        let wm = &doc.working_memory;
        assert!(wm.flight_quotes(0).is_none());
        assert!(wm.flight_quotes(1).is_none());
        let leg = wm.flight_quotes(2).unwrap();
        assert_eq!(leg[0].option_id, "flt_seg2_0");
        assert_eq!(leg[1].option_id, "UA12");
    }

    #[test]
    fn test_namespaced_name_is_canonicalized() {
        let mut doc = simple_round_trip();
        fold(&mut doc, "travel/flight_quote_search", &json!({"options": []}), &json!({})).unwrap();
        assert_eq!(doc.working_memory.flight_quotes(0).map(|o| o.len()), Some(0));
    }

    #[test]
    fn test_hotel_options_by_room() {
        let mut doc = multi_city_trip();
        let result = json!({"options_by_room": [[{"price": 100}], [{"price": 110}, {"price": 90}]]});
        fold(&mut doc, "hotel_quote_search", &result, &json!({"stay_index": 1})).unwrap();
        let rooms = doc.working_memory.hotel_quotes(1).unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0][0].option_id, "htl_stay1_room0_0");
        assert_eq!(rooms[1][1].option_id, "htl_stay1_room1_1");
    }

    #[test]
    fn test_single_room_hotel_options() {
        let mut doc = TripIntent::default();
        fold(&mut doc, "hotel_quote_search", &json!({"options": [{"id": "H9"}]}), &json!({})).unwrap();
        let rooms = doc.working_memory.hotel_quotes(0).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0][0].option_id, "H9");
    }

    #[test]
    fn test_risk_report_merges_selection_and_flattens_issues() {
        let mut doc = TripIntent::default();
        doc.working_memory.selected = Some(Selection {
            bundle_id: Some("bndl_1".to_string()),
            flight_option_ids: vec!["flt_seg0_0".to_string()],
            hotel_option_ids: vec!["htl_stay0_0".to_string()],
        });
        let result = json!({
            "blocking_issues": [{"message": "Over budget"}],
            "risks": ["Tight connection", {"description": "Non-refundable"}],
            "score": 0.4
        });
        fold(&mut doc, "policy_and_risk_check", &result, &json!({})).unwrap();
        let report = doc.working_memory.risk_report.as_ref().unwrap();
        assert_eq!(report.blocking_issues, vec!["Over budget".to_string()]);
        assert_eq!(report.risks.len(), 2);
        assert_eq!(report.bundle_id.as_deref(), Some("bndl_1"));
        assert_eq!(report.flight_option_ids, vec!["flt_seg0_0".to_string()]);
        assert_eq!(report.extra["score"], json!(0.4));
    }

    #[test]
    fn test_holds_default_unknown_status() {
        let mut doc = TripIntent::default();
        let result = json!({"holds": [{"hold_id": "h1", "status": "held"}, {"hold_id": "h2"}]});
        fold(&mut doc, "reservation_hold_create", &result, &json!({})).unwrap();
        let holds = doc.working_memory.holds.as_ref().unwrap();
        assert_eq!(holds[1].status, HoldStatus::Unknown);
        assert_eq!(doc.working_memory.active_hold_ids(), vec!["h1".to_string()]);
    }

    #[test]
    fn test_purchase_completes_trip() {
        let mut doc = TripIntent::default();
        doc.status.set_state(WorkflowState::Purchasing);
        let result = json!({"confirmation": {"confirmation_id": "CNF-77"}});
        fold(&mut doc, "booking_confirm_and_purchase", &result, &json!({})).unwrap();
        assert_eq!(doc.status.state(), WorkflowState::Completed);
        assert_eq!(doc.working_memory.bookings.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_followup_questions_accepts_bare_list() {
        let mut doc = TripIntent::default();
        fold(&mut doc, "generate_followup_questions", &json!(["Where from?", 3, " "]), &json!({})).unwrap();
        assert_eq!(
            doc.working_memory.followup_questions,
            Some(vec!["Where from?".to_string()])
        );
    }

    #[test]
    fn test_unrecognized_operation_only_notes() {
        let mut doc = TripIntent::default();
        let before = doc.working_memory.clone();
        let outcome = fold(&mut doc, "ns/car_rental_search", &json!({"options": []}), &json!({})).unwrap();
        assert_eq!(
            outcome,
            FoldOutcome::Unrecognized {
                name: "ns/car_rental_search".to_string()
            }
        );
        assert_eq!(doc.working_memory, before);
        assert!(doc.status.notes[0].contains("car_rental_search"));
    }
}
