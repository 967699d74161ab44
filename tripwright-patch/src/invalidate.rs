//! Declarative cache invalidation.
//!
//! Rules fire on changed-path prefixes. They look only at what changed
//! upstream, never at timing or at who changed it.

use crate::diff::path_has_prefix;
use serde::Serialize;
use tripwright_core::WorkingMemory;

/// A clearable entry of the derived cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEntry {
    FlightQuotes,
    HotelQuotes,
    RankedBundles,
    RiskReport,
    Holds,
    Selected,
}

impl CacheEntry {
    pub fn path(&self) -> &'static str {
        match self {
            CacheEntry::FlightQuotes => "working_memory.flight_quotes_by_segment",
            CacheEntry::HotelQuotes => "working_memory.hotel_quotes_by_stay",
            CacheEntry::RankedBundles => "working_memory.ranked_bundles",
            CacheEntry::RiskReport => "working_memory.risk_report",
            CacheEntry::Holds => "working_memory.holds",
            CacheEntry::Selected => "working_memory.selected",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CacheEntry::FlightQuotes => "flight quotes by segment",
            CacheEntry::HotelQuotes => "hotel quotes by stay",
            CacheEntry::RankedBundles => "ranked bundles",
            CacheEntry::RiskReport => "risk report",
            CacheEntry::Holds => "holds",
            CacheEntry::Selected => "selection",
        }
    }

    /// Clear the entry; returns whether anything was present.
    pub fn clear(&self, wm: &mut WorkingMemory) -> bool {
        match self {
            CacheEntry::FlightQuotes => wm.flight_quotes_by_segment.take().is_some(),
            CacheEntry::HotelQuotes => wm.hotel_quotes_by_stay.take().is_some(),
            CacheEntry::RankedBundles => wm.ranked_bundles.take().is_some(),
            CacheEntry::RiskReport => wm.risk_report.take().is_some(),
            CacheEntry::Holds => wm.holds.take().is_some(),
            CacheEntry::Selected => wm.selected.take().is_some(),
        }
    }
}

/// One static invalidation rule.
#[derive(Debug, Clone, Copy)]
pub struct InvalidationRule {
    pub triggers: &'static [&'static str],
    pub clears: &'static [CacheEntry],
    pub cause: &'static str,
}

impl InvalidationRule {
    pub fn fires(&self, changed_paths: &[String]) -> bool {
        changed_paths
            .iter()
            .any(|path| self.triggers.iter().any(|prefix| path_has_prefix(path, prefix)))
    }
}

/// The rule table, applied in order.
pub const RULES: &[InvalidationRule] = &[
    InvalidationRule {
        triggers: &["itinerary.segments", "preferences.flight", "party.travelers"],
        clears: &[
            CacheEntry::FlightQuotes,
            CacheEntry::RankedBundles,
            CacheEntry::RiskReport,
            CacheEntry::Holds,
            CacheEntry::Selected,
        ],
        cause: "Flight inputs changed",
    },
    InvalidationRule {
        triggers: &["itinerary.lodging", "preferences.hotel"],
        clears: &[
            CacheEntry::HotelQuotes,
            CacheEntry::RankedBundles,
            CacheEntry::RiskReport,
            CacheEntry::Holds,
            CacheEntry::Selected,
        ],
        cause: "Hotel inputs changed",
    },
    InvalidationRule {
        triggers: &["policy", "constraints"],
        clears: &[CacheEntry::RiskReport],
        cause: "Policy/constraints changed",
    },
    InvalidationRule {
        triggers: &["constraints.budget_total", "constraints.refundable_preference"],
        clears: &[CacheEntry::Holds],
        cause: "Budget/refundability changed",
    },
];

/// What invalidation cleared, with one reason per cleared path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Invalidations {
    pub cleared: Vec<String>,
    pub reasons: Vec<String>,
}

impl Invalidations {
    pub fn is_empty(&self) -> bool {
        self.cleared.is_empty()
    }

    pub fn contains(&self, entry: CacheEntry) -> bool {
        self.cleared.iter().any(|p| p == entry.path())
    }
}

/// Apply [`RULES`] to `wm` for the given changed paths.
///
/// An entry is reported only when it held a value.
pub fn invalidate(wm: &mut WorkingMemory, changed_paths: &[String]) -> Invalidations {
    let mut out = Invalidations::default();
    for rule in RULES {
        if !rule.fires(changed_paths) {
            continue;
        }
        for entry in rule.clears {
            if entry.clear(wm) {
                out.cleared.push(entry.path().to_string());
                out.reasons
                    .push(format!("{}: cleared {}.", rule.cause, entry.label()));
            }
        }
    }
    out
}
