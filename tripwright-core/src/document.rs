//! The Trip Intent document and its sub-structures.
//!
//! Pure data shape. Everything under [`WorkingMemory`] is derived from the
//! rest of the document and may be cleared at any time; every field there is
//! an `Option` so "absent or stale" is visible in the type.

use crate::status::Status;
use crate::{Date, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema tag written on every new document.
pub const TRIP_INTENT_SCHEMA: &str = "tripwright.trip_intent.v1";

fn default_schema() -> String {
    TRIP_INTENT_SCHEMA.to_string()
}

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_refundable_preference() -> String {
    "either".to_string()
}

fn default_rooms() -> u32 {
    1
}

fn default_guests_per_room() -> u32 {
    2
}

// ============================================================================
// TRIP INTENT
// ============================================================================

/// The single unit of state for one trip-planning conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripIntent {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub trip_id: String,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub request: Request,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub party: Party,
    #[serde(default)]
    pub itinerary: Itinerary,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub working_memory: WorkingMemory,
    #[serde(default)]
    pub audit: Audit,
}

impl TripIntent {
    /// Create the document for a conversation's first turn.
    pub fn new(trip_id: impl Into<String>, user_message: impl Into<String>, now: Timestamp) -> Self {
        Self {
            schema: default_schema(),
            trip_id: trip_id.into(),
            created_at: Some(now),
            updated_at: Some(now),
            request: Request {
                user_message: user_message.into(),
                ..Request::default()
            },
            status: Status::default(),
            party: Party::default(),
            itinerary: Itinerary::default(),
            preferences: Preferences::default(),
            constraints: Constraints::default(),
            policy: Policy::default(),
            working_memory: WorkingMemory::default(),
            audit: Audit::default(),
        }
    }

    /// Serialize to a plain JSON tree.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Rebuild from a plain JSON tree.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Stays that need hotel quotes; empty when lodging is not needed.
    pub fn stays_to_quote(&self) -> Vec<Stay> {
        if !self.itinerary.lodging.needed {
            return Vec::new();
        }
        self.itinerary.effective_stays()
    }

    /// Segment index of the first flight leg without quotes, in document order.
    pub fn first_unquoted_flight_leg(&self) -> Option<usize> {
        self.itinerary
            .flight_segment_indices()
            .into_iter()
            .find(|&i| self.working_memory.flight_quotes(i).is_none())
    }

    /// Index of the first stay without quotes, in document order.
    pub fn first_unquoted_stay(&self) -> Option<usize> {
        (0..self.stays_to_quote().len()).find(|&j| self.working_memory.hotel_quotes(j).is_none())
    }

    /// Every flight leg and every required stay has been quoted.
    pub fn all_quoted(&self) -> bool {
        self.first_unquoted_flight_leg().is_none() && self.first_unquoted_stay().is_none()
    }
}

impl Default for TripIntent {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            trip_id: String::new(),
            created_at: None,
            updated_at: None,
            request: Request::default(),
            status: Status::default(),
            party: Party::default(),
            itinerary: Itinerary::default(),
            preferences: Preferences::default(),
            constraints: Constraints::default(),
            policy: Policy::default(),
            working_memory: WorkingMemory::default(),
            audit: Audit::default(),
        }
    }
}

/// The latest user request and its reference frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub user_message: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Reference "today"; extracted dates before it are ignored
    #[serde(default)]
    pub now_date: Option<Date>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            user_message: String::new(),
            locale: default_locale(),
            timezone: default_timezone(),
            now_date: None,
        }
    }
}

// ============================================================================
// PARTY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default)]
    pub travelers: Travelers,
    #[serde(default)]
    pub traveler_profile_ids: Vec<String>,
    #[serde(default)]
    pub contact: Contact,
}

/// Traveler counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Travelers {
    #[serde(default)]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
}

impl Travelers {
    /// Travelers that need a bed (infants share).
    pub fn guests(&self) -> u32 {
        self.adults + self.children
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

// ============================================================================
// ITINERARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    OneWay,
    RoundTrip,
    MultiCity,
}

impl TripType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "one_way" | "oneway" => Some(TripType::OneWay),
            "round_trip" | "roundtrip" | "return" => Some(TripType::RoundTrip),
            "multi_city" | "multicity" => Some(TripType::MultiCity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    #[serde(default)]
    pub trip_type: Option<TripType>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub lodging: Lodging,
}

impl Itinerary {
    /// Indices of segments travelled by air, in document order.
    pub fn flight_segment_indices(&self) -> Vec<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.transport_mode == TransportMode::Flight)
            .map(|(i, _)| i)
            .collect()
    }

    /// Stays that need hotel quotes.
    ///
    /// Explicit `lodging.stays` win. Otherwise, when lodging is needed, the
    /// single-stay fields (`check_in`/`check_out`) form one stay at the first
    /// segment's destination.
    pub fn effective_stays(&self) -> Vec<Stay> {
        if !self.lodging.stays.is_empty() {
            return self.lodging.stays.clone();
        }
        if !self.lodging.needed {
            return Vec::new();
        }
        vec![self.single_stay()]
    }

    /// The legacy single-stay view of `lodging`.
    pub fn single_stay(&self) -> Stay {
        Stay {
            location_code: self
                .segments
                .first()
                .and_then(|s| s.destination.code.clone()),
            check_in: self.lodging.check_in,
            check_out: self.lodging.check_out,
            location_hint: self.lodging.location_hint.clone(),
        }
    }
}

/// A place referenced by a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl Place {
    pub fn airport(code: impl Into<String>) -> Self {
        Self {
            kind: Some("airport".to_string()),
            code: Some(code.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    #[default]
    Flight,
    Train,
    Bus,
    Car,
    Ferry,
    #[serde(other)]
    Other,
}

impl TransportMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "flight" | "air" | "plane" => TransportMode::Flight,
            "train" | "rail" => TransportMode::Train,
            "bus" | "coach" => TransportMode::Bus,
            "car" | "drive" => TransportMode::Car,
            "ferry" | "boat" => TransportMode::Ferry,
            _ => TransportMode::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// One leg of the itinerary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub segment_id: Option<String>,
    #[serde(default)]
    pub origin: Place,
    #[serde(default)]
    pub destination: Place,
    #[serde(default)]
    pub depart_date: Option<Date>,
    #[serde(default)]
    pub transport_mode: TransportMode,
    #[serde(default)]
    pub depart_time_window: TimeWindow,
}

impl Segment {
    /// A flight leg between two airports.
    pub fn flight(
        segment_id: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        depart_date: Option<Date>,
    ) -> Self {
        Self {
            segment_id: Some(segment_id.into()),
            origin: Place::airport(origin),
            destination: Place::airport(destination),
            depart_date,
            transport_mode: TransportMode::Flight,
            depart_time_window: TimeWindow::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lodging {
    #[serde(default = "default_true")]
    pub needed: bool,
    #[serde(default)]
    pub stays: Vec<Stay>,
    #[serde(default)]
    pub check_in: Option<Date>,
    #[serde(default)]
    pub check_out: Option<Date>,
    #[serde(default)]
    pub location_hint: Option<String>,
    #[serde(default = "default_rooms")]
    pub rooms: u32,
    #[serde(default = "default_guests_per_room")]
    pub guests_per_room: u32,
}

impl Default for Lodging {
    fn default() -> Self {
        Self {
            needed: true,
            stays: Vec::new(),
            check_in: None,
            check_out: None,
            location_hint: None,
            rooms: default_rooms(),
            guests_per_room: default_guests_per_room(),
        }
    }
}

/// A hotel stay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stay {
    #[serde(default)]
    pub location_code: Option<String>,
    #[serde(default)]
    pub check_in: Option<Date>,
    #[serde(default)]
    pub check_out: Option<Date>,
    #[serde(default)]
    pub location_hint: Option<String>,
}

// ============================================================================
// PREFERENCES, CONSTRAINTS, POLICY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub flight: FlightPreferences,
    #[serde(default)]
    pub hotel: HotelPreferences,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightPreferences {
    #[serde(default)]
    pub cabin: Option<String>,
    #[serde(default)]
    pub max_stops: Option<u32>,
    #[serde(default)]
    pub avoid_red_eye: Option<bool>,
    #[serde(default)]
    pub preferred_airlines: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotelPreferences {
    #[serde(default)]
    pub star_min: Option<u32>,
    #[serde(default)]
    pub refundable_only: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub budget_total: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_refundable_preference")]
    pub refundable_preference: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            budget_total: None,
            currency: default_currency(),
            refundable_preference: default_refundable_preference(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub rules: PolicyRules,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRules {
    #[serde(default = "default_true")]
    pub require_user_approval_to_purchase: bool,
    #[serde(default = "default_true")]
    pub holds_allowed_without_approval: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PolicyRules {
    fn default() -> Self {
        Self {
            require_user_approval_to_purchase: true,
            holds_allowed_without_approval: true,
            extra: Map::new(),
        }
    }
}

// ============================================================================
// WORKING MEMORY (derived cache)
// ============================================================================

/// A quoted flight or hotel option. Only `option_id` is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteOption {
    pub option_id: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Per-room option lists for one stay.
pub type StayQuotes = Vec<Vec<QuoteOption>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// A ranked flight+hotel combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub bundle_id: String,
    #[serde(default)]
    pub flight_option_ids: Vec<String>,
    #[serde(default)]
    pub hotel_option_ids: Vec<String>,
    #[serde(default)]
    pub estimated_total: Option<Money>,
    #[serde(default)]
    pub why_this_bundle: Option<String>,
    #[serde(default)]
    pub tradeoffs: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    #[serde(default)]
    pub blocking_issues: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub flight_option_ids: Vec<String>,
    #[serde(default)]
    pub hotel_option_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RiskReport {
    pub fn is_blocking(&self) -> bool {
        !self.blocking_issues.is_empty()
    }
}

/// The user's current bundle choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub flight_option_ids: Vec<String>,
    #[serde(default)]
    pub hotel_option_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Held,
    Expired,
    Cancelled,
    Released,
    Failed,
    #[serde(other)]
    Unknown,
}

/// A temporary reservation on one bundle component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hold {
    pub hold_id: String,
    pub status: HoldStatus,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub option_id: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Hold {
    pub fn is_active(&self) -> bool {
        self.status == HoldStatus::Held
    }
}

/// Derived cache. Safe to clear any entry and recompute it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemory {
    /// Position-indexed by segment; `None` marks a leg not yet quoted
    #[serde(default)]
    pub flight_quotes_by_segment: Option<Vec<Option<Vec<QuoteOption>>>>,
    /// Position-indexed by effective stay
    #[serde(default)]
    pub hotel_quotes_by_stay: Option<Vec<Option<StayQuotes>>>,
    #[serde(default)]
    pub ranked_bundles: Option<Vec<Bundle>>,
    #[serde(default)]
    pub risk_report: Option<RiskReport>,
    #[serde(default)]
    pub selected: Option<Selection>,
    #[serde(default)]
    pub holds: Option<Vec<Hold>>,
    #[serde(default)]
    pub bookings: Option<Vec<Value>>,
    #[serde(default)]
    pub followup_questions: Option<Vec<String>>,
}

impl WorkingMemory {
    /// Quotes for the leg at `index`, if it was quoted.
    pub fn flight_quotes(&self, index: usize) -> Option<&[QuoteOption]> {
        self.flight_quotes_by_segment
            .as_ref()
            .and_then(|by_seg| by_seg.get(index))
            .and_then(|slot| slot.as_deref())
    }

    /// Per-room quotes for the stay at `index`, if it was quoted.
    pub fn hotel_quotes(&self, index: usize) -> Option<&StayQuotes> {
        self.hotel_quotes_by_stay
            .as_ref()
            .and_then(|by_stay| by_stay.get(index))
            .and_then(|slot| slot.as_ref())
    }

    pub fn bundles(&self) -> &[Bundle] {
        self.ranked_bundles.as_deref().unwrap_or(&[])
    }

    pub fn has_ranked_bundles(&self) -> bool {
        !self.bundles().is_empty()
    }

    pub fn find_bundle(&self, bundle_id: &str) -> Option<&Bundle> {
        self.bundles().iter().find(|b| b.bundle_id == bundle_id)
    }

    /// Ids of holds still in the `held` status.
    pub fn active_hold_ids(&self) -> Vec<String> {
        self.holds
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .filter(|h| h.is_active())
            .map(|h| h.hold_id.clone())
            .collect()
    }
}

// ============================================================================
// AUDIT
// ============================================================================

/// One routed event, as recorded by the dispatch loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: Timestamp,
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    #[serde(default)]
    pub events: Vec<AuditEntry>,
}

// =============================================================================
// TESTS
// =============================================================================
