//! Workflow status: the `(phase, state)` table and the status record.
//!
//! A `WorkflowState` determines its `Phase`, so a `Status` can only ever hold
//! one of the enumerated combinations. Deserialization goes through
//! [`RawStatus`] and rejects any pair outside the table.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// PHASE
// ============================================================================

/// Coarse workflow stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intake,
    Quote,
    Book,
    Completed,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Intake => "intake",
            Phase::Quote => "quote",
            Phase::Book => "book",
            Phase::Completed => "completed",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intake" => Ok(Phase::Intake),
            "quote" => Ok(Phase::Quote),
            "book" => Ok(Phase::Book),
            "completed" => Ok(Phase::Completed),
            "error" => Ok(Phase::Error),
            other => Err(ValidationError::InvalidValue {
                field: "status.phase".to_string(),
                reason: format!("unknown phase '{}'", other),
            }),
        }
    }
}

// ============================================================================
// WORKFLOW STATE
// ============================================================================

/// Fine-grained workflow position. Each state belongs to exactly one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    CollectingRequirements,
    AwaitingConfirmation,
    ReadyToQuote,
    QuotingFlights,
    QuotingHotels,
    RankingBundles,
    PresentingOptions,
    RiskChecking,
    PlacingHolds,
    Purchasing,
    Completed,
    Retryable,
}

impl WorkflowState {
    /// Every state, in workflow order.
    pub const ALL: [WorkflowState; 12] = [
        WorkflowState::CollectingRequirements,
        WorkflowState::AwaitingConfirmation,
        WorkflowState::ReadyToQuote,
        WorkflowState::QuotingFlights,
        WorkflowState::QuotingHotels,
        WorkflowState::RankingBundles,
        WorkflowState::PresentingOptions,
        WorkflowState::RiskChecking,
        WorkflowState::PlacingHolds,
        WorkflowState::Purchasing,
        WorkflowState::Completed,
        WorkflowState::Retryable,
    ];

    /// The phase this state belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            WorkflowState::CollectingRequirements
            | WorkflowState::AwaitingConfirmation
            | WorkflowState::ReadyToQuote => Phase::Intake,
            WorkflowState::QuotingFlights
            | WorkflowState::QuotingHotels
            | WorkflowState::RankingBundles
            | WorkflowState::PresentingOptions
            | WorkflowState::RiskChecking => Phase::Quote,
            WorkflowState::PlacingHolds | WorkflowState::Purchasing => Phase::Book,
            WorkflowState::Completed => Phase::Completed,
            WorkflowState::Retryable => Phase::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::CollectingRequirements => "collecting_requirements",
            WorkflowState::AwaitingConfirmation => "awaiting_confirmation",
            WorkflowState::ReadyToQuote => "ready_to_quote",
            WorkflowState::QuotingFlights => "quoting_flights",
            WorkflowState::QuotingHotels => "quoting_hotels",
            WorkflowState::RankingBundles => "ranking_bundles",
            WorkflowState::PresentingOptions => "presenting_options",
            WorkflowState::RiskChecking => "risk_checking",
            WorkflowState::PlacingHolds => "placing_holds",
            WorkflowState::Purchasing => "purchasing",
            WorkflowState::Completed => "completed",
            WorkflowState::Retryable => "retryable",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "status.state".to_string(),
                reason: format!("unknown state '{}'", s),
            })
    }
}

// ============================================================================
// STATUS
// ============================================================================

/// The failed operation recorded by the last `TOOL_ERROR`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    /// Operation name as dispatched (namespace included)
    pub operation: String,
    /// Error text reported by the dispatcher
    pub error: String,
    /// Arguments of the failed call, kept so the user can ask for a retry
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Workflow status of a trip intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStatus", into = "RawStatus")]
pub struct Status {
    state: WorkflowState,
    /// Required-field paths still missing, recomputed every decision
    pub missing_required: Vec<String>,
    /// Append-only notes from engines and patches
    pub notes: Vec<String>,
    pub last_error: Option<LastError>,
}

impl Default for Status {
    fn default() -> Self {
        Self::new(WorkflowState::CollectingRequirements)
    }
}

impl Status {
    pub fn new(state: WorkflowState) -> Self {
        Self {
            state,
            missing_required: Vec::new(),
            notes: Vec::new(),
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Move to `state`; the phase follows.
    pub fn set_state(&mut self, state: WorkflowState) {
        self.state = state;
    }

    /// Whether the user confirmed the requirements summary.
    ///
    /// Intake states other than `ready_to_quote` are pre-confirmation.
    pub fn is_confirmed(&self) -> bool {
        !matches!(
            self.state,
            WorkflowState::CollectingRequirements | WorkflowState::AwaitingConfirmation
        )
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Wire shape of [`Status`], with `phase` spelled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatus {
    pub phase: Phase,
    pub state: WorkflowState,
    #[serde(default)]
    pub missing_required: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
}

impl TryFrom<RawStatus> for Status {
    type Error = ValidationError;

    fn try_from(raw: RawStatus) -> Result<Self, Self::Error> {
        if raw.state.phase() != raw.phase {
            return Err(ValidationError::InvalidStatus {
                phase: raw.phase.to_string(),
                state: raw.state.to_string(),
            });
        }
        Ok(Status {
            state: raw.state,
            missing_required: raw.missing_required,
            notes: raw.notes,
            last_error: raw.last_error,
        })
    }
}

impl From<Status> for RawStatus {
    fn from(status: Status) -> Self {
        RawStatus {
            phase: status.state.phase(),
            state: status.state,
            missing_required: status.missing_required,
            notes: status.notes,
            last_error: status.last_error,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
