//! Tripwright Patch - Merge/Invalidate Engine
//!
//! Applies a partial-document [`Patch`] to a [`TripIntent`]:
//!
//! 1. Deep-merge the patch into the document (patch wins, sequences replace)
//! 2. Compute changed paths by structural diff; the patch note is recorded
//!    only when something changed
//! 3. Clear derived caches whose upstream inputs changed
//! 4. Suggest next operations (hints only; the decision engine decides)
//!
//! The engine is pure: no I/O, no retained state between calls.

pub mod diff;
pub mod invalidate;
pub mod merge;

pub use diff::{changed_paths, path_has_prefix};
pub use invalidate::{invalidate, CacheEntry, Invalidations, RULES};
pub use merge::{deep_merge, merge_step, MergeStep};

use serde::Serialize;
use serde_json::Value;
use tripwright_core::{
    OperationKind, Patch, TripIntent, TripwrightResult, ValidationError,
};

/// Result of applying one patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    pub changed_paths: Vec<String>,
    pub invalidations: Invalidations,
    /// Non-authoritative hints
    pub suggested_next: Vec<OperationKind>,
}

impl PatchOutcome {
    pub fn changed(&self, prefix: &str) -> bool {
        self.changed_paths.iter().any(|p| path_has_prefix(p, prefix))
    }
}

fn rejected(reason: impl ToString) -> ValidationError {
    ValidationError::PatchRejected {
        reason: reason.to_string(),
    }
}

/// Apply `patch` to `doc`.
///
/// On error the document is left exactly as it was.
pub fn apply(doc: &mut TripIntent, patch: &Patch) -> TripwrightResult<PatchOutcome> {
    let before = doc.to_value().map_err(rejected)?;
    let mut merged = match &before {
        Value::Object(map) => map.clone(),
        _ => return Err(rejected("document is not a map").into()),
    };
    deep_merge(&mut merged, &patch.fields);

    let mut next = TripIntent::from_value(Value::Object(merged)).map_err(rejected)?;
    let mut changed = changed_paths(&before, &next.to_value().map_err(rejected)?);

    // A patch that changes nothing leaves no note either.
    if let Some(note) = patch.note.as_deref().filter(|n| !n.is_empty()) {
        if !changed.is_empty() {
            next.status.push_note(format!("[{}] {}", patch.source, note));
            changed = changed_paths(&before, &next.to_value().map_err(rejected)?);
        }
    }

    let invalidations = invalidate(&mut next.working_memory, &changed);
    let suggested_next = suggest_next(&next, &changed);

    tracing::debug!(
        source = %patch.source,
        changed = changed.len(),
        cleared = ?invalidations.cleared,
        "Patch applied"
    );

    *doc = next;
    Ok(PatchOutcome {
        changed_paths: changed,
        invalidations,
        suggested_next,
    })
}

/// Best-effort hints about which operations the changed inputs call for.
pub fn suggest_next(doc: &TripIntent, changed: &[String]) -> Vec<OperationKind> {
    let mut out = Vec::new();
    let touched = |prefix: &str| changed.iter().any(|p| path_has_prefix(p, prefix));

    if touched("itinerary") || touched("party.travelers") {
        if doc.first_unquoted_flight_leg().is_some() {
            out.push(OperationKind::FlightQuoteSearch);
        }
        if doc.first_unquoted_stay().is_some() {
            out.push(OperationKind::HotelQuoteSearch);
        }
    }

    let has_quotes = doc.working_memory.flight_quotes_by_segment.is_some()
        || doc.working_memory.hotel_quotes_by_stay.is_some();
    if has_quotes && doc.all_quoted() && !doc.working_memory.has_ranked_bundles() {
        out.push(OperationKind::TripOptionRanker);
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use tripwright_core::{QuoteOption, RiskReport, Segment, WorkflowState};

    fn doc_with_quotes() -> TripIntent {
        let mut doc = TripIntent::default();
        doc.trip_id = "trip-1".to_string();
        doc.itinerary
            .segments
            .push(Segment::flight("seg_outbound", "EWR", "DEN", None));
        doc.working_memory.flight_quotes_by_segment = Some(vec![Some(vec![QuoteOption {
            option_id: "flt_seg0_0".to_string(),
            details: Map::new(),
        }])]);
        doc.working_memory.risk_report = Some(RiskReport::default());
        doc
    }

    #[test]
    fn test_apply_merges_and_notes() {
        let mut doc = TripIntent::default();
        let patch = Patch::from_value("user", json!({"itinerary": {"trip_type": "round_trip"}}))
            .with_note("set trip type");
        let outcome = apply(&mut doc, &patch).unwrap();
        assert_eq!(doc.itinerary.trip_type, Some(tripwright_core::TripType::RoundTrip));
        assert!(outcome.changed_paths.contains(&"itinerary.trip_type".to_string()));
        assert_eq!(doc.status.notes, vec!["[user] set trip type".to_string()]);
    }

    #[test]
    fn test_noted_patch_applied_twice_notes_once() {
        let patch = Patch::from_value("user", json!({"constraints": {"budget_total": 2500}}))
            .with_note("budget");
        let mut once = TripIntent::default();
        apply(&mut once, &patch).unwrap();
        assert_eq!(once.status.notes, vec!["[user] budget".to_string()]);

        let mut twice = once.clone();
        let second = apply(&mut twice, &patch).unwrap();
        assert_eq!(twice, once);
        assert!(second.changed_paths.is_empty());
    }

    #[test]
    fn test_segment_patch_invalidates_flight_cache() {
        let mut doc = doc_with_quotes();
        let patch = Patch::from_value(
            "user",
            json!({"itinerary": {"segments": [{"origin": {"code": "JFK"}, "destination": {"code": "DEN"}}]}}),
        );
        let outcome = apply(&mut doc, &patch).unwrap();
        assert!(doc.working_memory.flight_quotes_by_segment.is_none());
        assert!(doc.working_memory.risk_report.is_none());
        assert!(outcome.invalidations.contains(CacheEntry::FlightQuotes));
        assert!(outcome.suggested_next.contains(&OperationKind::FlightQuoteSearch));
    }

    #[test]
    fn test_rejected_patch_leaves_document_untouched() {
        let mut doc = doc_with_quotes();
        let snapshot = doc.clone();
        let patch = Patch::from_value("user", json!({"party": {"travelers": {"adults": -3}}}));
        let err = apply(&mut doc, &patch).unwrap_err();
        assert!(err.to_string().contains("Patch rejected"));
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_invalid_status_pair_is_rejected() {
        let mut doc = TripIntent::default();
        let patch = Patch::from_value("user", json!({"status": {"phase": "book"}}));
        assert!(apply(&mut doc, &patch).is_err());
        assert_eq!(doc.status.state(), WorkflowState::CollectingRequirements);
    }

    #[test]
    fn test_type_change_under_merge() {
        let mut doc = doc_with_quotes();
        // map -> null
        let outcome = apply(
            &mut doc,
            &Patch::from_value("user", json!({"working_memory": {"risk_report": null}})),
        )
        .unwrap();
        assert!(doc.working_memory.risk_report.is_none());
        assert_eq!(outcome.changed_paths, vec!["working_memory.risk_report".to_string()]);

        // null -> map
        let outcome = apply(
            &mut doc,
            &Patch::from_value(
                "user",
                json!({"working_memory": {"risk_report": {"blocking_issues": ["over budget"]}}}),
            ),
        )
        .unwrap();
        assert!(doc.working_memory.risk_report.as_ref().unwrap().is_blocking());
        assert_eq!(outcome.changed_paths, vec!["working_memory.risk_report".to_string()]);
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        let mut doc = doc_with_quotes();
        let snapshot = doc.clone();
        let outcome = apply(&mut doc, &Patch::from_value("noop", json!({}))).unwrap();
        assert!(outcome.changed_paths.is_empty());
        assert!(outcome.invalidations.is_empty());
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_ranker_suggested_when_everything_quoted() {
        let mut doc = doc_with_quotes();
        doc.itinerary.lodging.needed = false;
        let outcome = apply(
            &mut doc,
            &Patch::from_value("user", json!({"request": {"locale": "en-GB"}})),
        )
        .unwrap();
        assert_eq!(outcome.suggested_next, vec![OperationKind::TripOptionRanker]);
    }
}
