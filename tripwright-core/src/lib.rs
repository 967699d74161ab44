//! Tripwright Core - Document Model
//!
//! Pure data structures shared by the engines: the Trip Intent document,
//! events, operation calls, patches, configuration and errors.
//! This crate contains ONLY data types - no engine logic.

use chrono::{DateTime, NaiveDate, Utc};

pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod operation;
pub mod patch;
pub mod status;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// ISO calendar date (`YYYY-MM-DD`).
pub type Date = NaiveDate;

/// Trip identifier as issued by the caller.
pub type TripId = String;

pub use config::{EngineConfig, RankingWeights};
pub use document::{
    Audit, AuditEntry, Bundle, Constraints, Contact, FlightPreferences, Hold, HoldStatus,
    HotelPreferences, Itinerary, Lodging, Money, Party, Place, Policy, PolicyRules, Preferences,
    QuoteOption, Request, RiskReport, Segment, Selection, Stay, StayQuotes, TimeWindow,
    TransportMode, Travelers, TripIntent, TripType, WorkingMemory, TRIP_INTENT_SCHEMA,
};
pub use error::{
    ConfigError, DispatchError, StorageError, TripwrightError, TripwrightResult, ValidationError,
};
pub use event::{ChatMessage, Event, ToolFailure, ToolResult};
pub use operation::{canonical_name, OperationCall, OperationKind};
pub use patch::Patch;
pub use status::{LastError, Phase, RawStatus, Status, WorkflowState};
