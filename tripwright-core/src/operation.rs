//! Operation identity and operation calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Known external operations. Folding and decision rules are total over
/// this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    #[serde(rename = "trip_requirements_extract")]
    RequirementsExtract,
    #[serde(rename = "generate_followup_questions")]
    FollowupQuestions,
    FlightQuoteSearch,
    HotelQuoteSearch,
    TripOptionRanker,
    PolicyAndRiskCheck,
    ReservationHoldCreate,
    BookingConfirmAndPurchase,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::RequirementsExtract,
        OperationKind::FollowupQuestions,
        OperationKind::FlightQuoteSearch,
        OperationKind::HotelQuoteSearch,
        OperationKind::TripOptionRanker,
        OperationKind::PolicyAndRiskCheck,
        OperationKind::ReservationHoldCreate,
        OperationKind::BookingConfirmAndPurchase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::RequirementsExtract => "trip_requirements_extract",
            OperationKind::FollowupQuestions => "generate_followup_questions",
            OperationKind::FlightQuoteSearch => "flight_quote_search",
            OperationKind::HotelQuoteSearch => "hotel_quote_search",
            OperationKind::TripOptionRanker => "trip_option_ranker",
            OperationKind::PolicyAndRiskCheck => "policy_and_risk_check",
            OperationKind::ReservationHoldCreate => "reservation_hold_create",
            OperationKind::BookingConfirmAndPurchase => "booking_confirm_and_purchase",
        }
    }

    /// Resolve a possibly namespaced name (`ns/flight_quote_search`).
    pub fn from_name(name: &str) -> Option<Self> {
        let canonical = canonical_name(name);
        OperationKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == canonical)
    }

    /// The dispatchable name under `namespace`; an empty namespace yields
    /// the bare name.
    pub fn qualified(&self, namespace: &str) -> String {
        if namespace.is_empty() {
            self.as_str().to_string()
        } else {
            format!("{}/{}", namespace.trim_end_matches('/'), self.as_str())
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip a leading `namespace/` from an operation name.
pub fn canonical_name(name: &str) -> &str {
    match name.split_once('/') {
        Some((_, rest)) => rest,
        None => name,
    }
}

/// An instruction to invoke one named external operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl OperationCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    pub fn kind(&self) -> Option<OperationKind> {
        OperationKind::from_name(&self.name)
    }
}
