//! The folding convention table.
//!
//! Total over [`OperationKind`]: every known operation has exactly one
//! destination in the document.

use tripwright_core::OperationKind;

/// Argument that selects the slot of a position-indexed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKey {
    Segment,
    Stay,
}

impl IndexKey {
    /// Name of the call argument carrying the index.
    pub fn argument(&self) -> &'static str {
        match self {
            IndexKey::Segment => "segment_index",
            IndexKey::Stay => "stay_index",
        }
    }
}

/// Where a result lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldTarget {
    /// Translated into a patch and merged through the patch engine.
    RequirementsPatch,
    /// Written into `working_memory`.
    Cache {
        path: &'static str,
        indexed_by: Option<IndexKey>,
    },
}

/// Option-id prefix for synthesized ids, per indexed quoting operation.
pub fn option_id_prefix(key: IndexKey) -> &'static str {
    match key {
        IndexKey::Segment => "flt_seg",
        IndexKey::Stay => "htl_stay",
    }
}

pub fn convention(kind: OperationKind) -> FoldTarget {
    match kind {
        OperationKind::RequirementsExtract => FoldTarget::RequirementsPatch,
        OperationKind::FollowupQuestions => FoldTarget::Cache {
            path: "working_memory.followup_questions",
            indexed_by: None,
        },
        OperationKind::FlightQuoteSearch => FoldTarget::Cache {
            path: "working_memory.flight_quotes_by_segment",
            indexed_by: Some(IndexKey::Segment),
        },
        OperationKind::HotelQuoteSearch => FoldTarget::Cache {
            path: "working_memory.hotel_quotes_by_stay",
            indexed_by: Some(IndexKey::Stay),
        },
        OperationKind::TripOptionRanker => FoldTarget::Cache {
            path: "working_memory.ranked_bundles",
            indexed_by: None,
        },
        OperationKind::PolicyAndRiskCheck => FoldTarget::Cache {
            path: "working_memory.risk_report",
            indexed_by: None,
        },
        OperationKind::ReservationHoldCreate => FoldTarget::Cache {
            path: "working_memory.holds",
            indexed_by: None,
        },
        OperationKind::BookingConfirmAndPurchase => FoldTarget::Cache {
            path: "working_memory.bookings",
            indexed_by: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_total() {
        let patches = OperationKind::ALL
            .iter()
            .filter(|k| convention(**k) == FoldTarget::RequirementsPatch)
            .count();
        assert_eq!(patches, 1);
    }

    #[test]
    fn test_quote_operations_are_indexed() {
        assert_eq!(
            convention(OperationKind::FlightQuoteSearch),
            FoldTarget::Cache {
                path: "working_memory.flight_quotes_by_segment",
                indexed_by: Some(IndexKey::Segment),
            }
        );
        assert!(matches!(
            convention(OperationKind::HotelQuoteSearch),
            FoldTarget::Cache {
                indexed_by: Some(IndexKey::Stay),
                ..
            }
        ));
    }
}
