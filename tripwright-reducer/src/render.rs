//! User-facing message rendering. Pure reads of the document.

use serde_json::Value;
use tripwright_core::{Bundle, Hold, RiskReport, TripIntent};

pub const CONFIRMATION_PROMPT: &str = "If this looks correct, reply **Yes** or **Looks good** to search for flights and hotels. If something needs to change, tell us what to update.";

pub const RECONFIRMATION_PROMPT: &str =
    "Reply **Yes** or **Looks good** when you're ready to search, or tell us what to change.";

pub const SEARCHING: &str = "Searching for flights and hotels…";

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

fn plural(count: u32, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}

/// The requirements summary shown before quoting.
pub fn trip_summary(doc: &TripIntent) -> String {
    let mut lines = vec!["I have everything I need. Here's your trip summary:".to_string()];

    let t = &doc.party.travelers;
    let mut travelers = Vec::new();
    if t.adults > 0 {
        travelers.push(plural(t.adults, "adult", "adults"));
    }
    if t.children > 0 {
        travelers.push(plural(t.children, "child", "children"));
    }
    if t.infants > 0 {
        travelers.push(plural(t.infants, "infant", "infants"));
    }
    if !travelers.is_empty() {
        lines.push(format!("- **Travelers:** {}", travelers.join(", ")));
    }

    if !doc.itinerary.segments.is_empty() {
        lines.push("- **Flights:**".to_string());
        for (i, s) in doc.itinerary.segments.iter().enumerate() {
            lines.push(format!(
                "  - Leg {}: {} → {} on {}",
                i + 1,
                or_unknown(s.origin.code.as_deref()),
                or_unknown(s.destination.code.as_deref()),
                or_unknown(s.depart_date),
            ));
        }
    }

    let stays = doc.stays_to_quote();
    if !stays.is_empty() {
        lines.push("- **Hotel stays:**".to_string());
        for (j, st) in stays.iter().enumerate() {
            lines.push(format!(
                "  - Stay {}: {}, check-in {}, check-out {}",
                j + 1,
                or_unknown(st.location_code.as_deref()),
                or_unknown(st.check_in),
                or_unknown(st.check_out),
            ));
        }
    }

    lines.join("\n")
}

pub fn confirmation_request(doc: &TripIntent) -> String {
    format!("{}\n\n{}", trip_summary(doc), CONFIRMATION_PROMPT)
}

pub fn reconfirmation_request(doc: &TripIntent) -> String {
    format!("{}\n\n{}", trip_summary(doc), RECONFIRMATION_PROMPT)
}

fn bundle_line(bundle: &Bundle) -> String {
    let total = match &bundle.estimated_total {
        Some(money) => format!("{:.2} {}", money.amount, money.currency),
        None => "n/a".to_string(),
    };
    let line = format!(
        "- {}: total {} - {}",
        bundle.bundle_id,
        total,
        bundle.why_this_bundle.as_deref().unwrap_or_default()
    );
    line.trim_end_matches([' ', '-']).to_string()
}

/// The top `limit` ranked bundles with up to two tradeoffs each.
pub fn bundles(bundles: &[Bundle], limit: usize) -> String {
    let mut lines = vec!["Here are the top options:".to_string()];
    for bundle in bundles.iter().take(limit) {
        lines.push(bundle_line(bundle));
        for tradeoff in bundle.tradeoffs.iter().take(2) {
            lines.push(format!("  - tradeoff: {}", tradeoff));
        }
    }
    lines.push("Reply with a bundle_id to risk-check it, or tell me what to change.".to_string());
    lines.join("\n")
}

pub fn unknown_bundle(bundle_id: &str, bundles: &[Bundle]) -> String {
    if bundles.is_empty() {
        return format!(
            "I couldn't find bundle {}. There are no ranked options yet.",
            bundle_id
        );
    }
    let ids: Vec<&str> = bundles.iter().map(|b| b.bundle_id.as_str()).collect();
    format!(
        "I couldn't find bundle {}. Reply with one of: {}.",
        bundle_id,
        ids.join(", ")
    )
}

/// Risk check outcome, one message per line.
pub fn risk_report(report: &RiskReport) -> Vec<String> {
    let mut out = Vec::new();
    if report.is_blocking() {
        out.push("Selected bundle has blocking issues:".to_string());
        out.extend(report.blocking_issues.iter().map(|b| format!("- {}", b)));
        out.push("Pick a different bundle_id, or tell me what to change.".to_string());
        return out;
    }
    if !report.risks.is_empty() {
        out.push("Risks to note:".to_string());
        out.extend(report.risks.iter().map(|r| format!("- {}", r)));
    }
    out.push("Say 'hold' to place holds, or pick a different bundle_id.".to_string());
    out
}

pub fn holds_placed(holds: &[Hold]) -> String {
    let active: Vec<&Hold> = holds.iter().filter(|h| h.is_active()).collect();
    if active.is_empty() {
        return "No holds could be placed. Pick a different bundle_id or say 'hold' to try again."
            .to_string();
    }
    let mut lines = vec!["Holds placed:".to_string()];
    for h in active {
        let item = h.item_type.as_deref().unwrap_or("item");
        let option = h.option_id.as_deref().unwrap_or("?");
        match h.expires_at.as_deref() {
            Some(expiry) => lines.push(format!("- {} ({} {}), expires {}", h.hold_id, item, option, expiry)),
            None => lines.push(format!("- {} ({} {})", h.hold_id, item, option)),
        }
    }
    lines.push(
        "To book, reply 'approve purchase approval_token=<token> payment_method_id=<id>'.".to_string(),
    );
    lines.join("\n")
}

pub fn booking_confirmed(confirmation: Option<&Value>) -> String {
    let reference = confirmation.and_then(|c| {
        c.get("confirmation_id")
            .or_else(|| c.get("booking_reference"))
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| c.as_str().map(String::from))
    });
    match reference {
        Some(r) => format!("Booking confirmed. Confirmation: {}", r),
        None => "Booking confirmed.".to_string(),
    }
}

pub fn tool_error(operation: &str, error: &str) -> String {
    format!("Tool error: {} - {}", operation, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripwright_core::{HoldStatus, Money};
    use tripwright_test_utils::fixtures::{multi_city_trip, simple_round_trip};
    use tripwright_test_utils::{bundle, hold};

    #[test]
    fn test_trip_summary_lists_legs_and_stays() {
        let summary = trip_summary(&multi_city_trip());
        assert!(summary.starts_with("I have everything I need."));
        assert!(summary.contains("- **Travelers:** 2 adults"));
        assert!(summary.contains("  - Leg 2: LIS → OPO on 2026-06-04"));
        assert!(summary.contains("  - Stay 2: OPO, check-in 2026-06-04, check-out 2026-06-07"));
    }

    #[test]
    fn test_summary_marks_unknowns() {
        let mut doc = simple_round_trip();
        doc.itinerary.segments[1].depart_date = None;
        doc.party.travelers.children = 1;
        let summary = trip_summary(&doc);
        assert!(summary.contains("2 adults, 1 child"));
        assert!(summary.contains("Leg 2: DEN → EWR on ?"));
    }

    #[test]
    fn test_bundles_respect_limit() {
        let list: Vec<Bundle> = (1..=5)
            .map(|i| bundle(&format!("bndl_{}", i), &[], &[], 1000.0 + i as f64))
            .collect();
        let text = bundles(&list, 3);
        assert!(text.contains("- bndl_1: total 1001.00 USD - Best balance"));
        assert!(text.contains("bndl_3"));
        assert!(!text.contains("bndl_4"));
        assert_eq!(text.matches("tradeoff:").count(), 3);
    }

    #[test]
    fn test_bundle_without_total_or_reason() {
        let mut b = bundle("bndl_x", &[], &[], 0.0);
        b.estimated_total = None;
        b.why_this_bundle = None;
        assert_eq!(bundle_line(&b), "- bndl_x: total n/a");
        b.estimated_total = Some(Money {
            amount: 99.5,
            currency: "EUR".to_string(),
        });
        assert_eq!(bundle_line(&b), "- bndl_x: total 99.50 EUR");
    }

    #[test]
    fn test_blocking_risk_report() {
        let report = RiskReport {
            blocking_issues: vec!["Over budget".to_string()],
            risks: vec!["Tight connection".to_string()],
            ..RiskReport::default()
        };
        let lines = risk_report(&report);
        assert_eq!(lines[0], "Selected bundle has blocking issues:");
        assert_eq!(lines[1], "- Over budget");
        assert!(!lines.iter().any(|l| l.contains("Tight connection")));
    }

    #[test]
    fn test_holds_placed_lists_only_active() {
        let text = holds_placed(&[hold("h1", HoldStatus::Held), hold("h2", HoldStatus::Expired)]);
        assert!(text.contains("- h1 (flight flt_seg0_0)"));
        assert!(!text.contains("h2"));
        assert!(text.contains("approval_token="));
    }
}
